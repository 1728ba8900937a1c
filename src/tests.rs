use super::*;
use crate::db::{style_string, FontDatabase, FontDescription, FontSource, SMOOTH_SCALABLE};
use std::path::PathBuf;

fn latin() -> WritingSystems {
    WritingSystems::empty().with(WritingSystem::Latin)
}

#[test]
fn test_style_distance() {
    let bold_italic = StyleKey::new(Slant::Italic, weight::BOLD, 0);
    let bold_oblique = StyleKey::new(Slant::Oblique, weight::BOLD, 0);
    let bold = StyleKey::new(Slant::Normal, weight::BOLD, 0);
    let light_italic = StyleKey::new(Slant::Italic, weight::LIGHT, 0);

    // matching a key against itself is always an exact match
    assert_eq!(bold_italic.distance(&bold_italic), 0);
    assert_eq!(bold_italic.distance(&bold_oblique), SLANT_VARIANT_DISTANCE);
    assert_eq!(bold_italic.distance(&bold), SLANT_MISMATCH_DISTANCE);
    assert_eq!(bold.distance(&bold_italic), SLANT_MISMATCH_DISTANCE);
    assert_eq!(bold_italic.distance(&light_italic), 50);

    // stretch only counts if both sides specify one
    let condensed = StyleKey::new(Slant::Normal, weight::BOLD, 75);
    let expanded = StyleKey::new(Slant::Normal, weight::BOLD, 125);
    assert_eq!(condensed.distance(&bold), 0);
    assert_eq!(condensed.distance(&expanded), 50);
    assert!(condensed.matches(&bold));
    assert!(!condensed.matches(&expanded));
}

#[test]
fn test_style_from_name() {
    assert_eq!(
        StyleKey::from_style_name("Bold Italic"),
        StyleKey::new(Slant::Italic, weight::BOLD, 0)
    );
    assert_eq!(
        StyleKey::from_style_name("Demi Bold Oblique"),
        StyleKey::new(Slant::Oblique, weight::DEMI_BOLD, 0)
    );
    assert_eq!(StyleKey::from_style_name("Regular").weight, weight::NORMAL);
    assert_eq!(StyleKey::from_style_name("ExtraBold").weight, weight::EXTRA_BOLD);
    assert_eq!(StyleKey::from_style_name("Light").weight, weight::LIGHT);
    assert_eq!(StyleKey::from_style_name("Heavy").weight, weight::BLACK);
    assert_eq!(StyleKey::from_style_name("Italic").slant, Slant::Italic);
}

#[test]
fn test_style_string() {
    assert_eq!(style_string(&StyleKey::default()), "Normal");
    assert_eq!(
        style_string(&StyleKey::new(Slant::Italic, weight::BOLD, 0)),
        "Bold Italic"
    );
    assert_eq!(
        style_string(&StyleKey::new(Slant::Oblique, weight::NORMAL, 0)),
        "Oblique"
    );
    assert_eq!(
        style_string(&StyleKey::new(Slant::Normal, weight::LIGHT, 0)),
        "Light"
    );
}

#[test]
fn test_opentype_conversions() {
    assert_eq!(weight::from_opentype(100), weight::LIGHT);
    assert_eq!(weight::from_opentype(400), weight::NORMAL);
    assert_eq!(weight::from_opentype(600), weight::DEMI_BOLD);
    assert_eq!(weight::from_opentype(700), weight::BOLD);
    assert_eq!(weight::from_opentype(900), weight::BLACK);

    assert_eq!(stretch_from_width_class(1), 50);
    assert_eq!(stretch_from_width_class(5), 100);
    assert_eq!(stretch_from_width_class(9), 200);
}

#[test]
fn test_font_size_to_pixels() {
    assert_eq!(FontSize::Pixel(12).to_pixels(96.0), 12);
    assert_eq!(FontSize::Point(12.0).to_pixels(96.0), 16);
    assert_eq!(FontSize::Point(9.0).to_pixels(72.0), 9);
    // never below one pixel
    assert_eq!(FontSize::Pixel(0).to_pixels(96.0), 1);
    assert_eq!(FontSize::Point(0.1).to_pixels(96.0), 1);
}

#[test]
fn test_indexed_enum_defaults() {
    assert_eq!(Script::default(), Script::Common);
    assert_eq!(FontRequest::default().script, Script::Common);
    assert_eq!(Script::from_index(Script::default().index()), Some(Script::Common));
    assert_eq!(Script::ALL.len(), Script::COUNT);
}

#[test]
fn test_style_strategy_flags() {
    let strategy = StyleStrategy::PREFER_BITMAP | StyleStrategy::NO_FONT_MERGING;
    assert!(strategy.contains(StyleStrategy::PREFER_BITMAP));
    assert!(strategy.contains(StyleStrategy::NO_FONT_MERGING));
    assert!(!strategy.contains(StyleStrategy::FORCE_OUTLINE));
    assert!(!StyleStrategy::empty().contains(StyleStrategy::empty()));

    let mut s = StyleStrategy::empty();
    s |= StyleStrategy::PREFER_MATCH;
    assert_eq!(s.0, 0x20);
}

#[test]
fn test_writing_systems() {
    let set = WritingSystems::empty()
        .with(WritingSystem::Latin)
        .with(WritingSystem::Japanese);

    assert!(set.contains(WritingSystem::Latin));
    assert!(!set.contains(WritingSystem::Greek));
    assert!(set.supports_script(Script::Latin));
    assert!(set.supports_script(Script::Han));
    assert!(!set.supports_script(Script::Arabic));
    // common text can be drawn by anything
    assert!(WritingSystems::empty().supports_script(Script::Common));

    let all = WritingSystems::all();
    assert!(!all.contains(WritingSystem::Any));
    assert_eq!(all.iter().count(), WritingSystem::COUNT - 1);
}

#[test]
fn test_writing_systems_from_os2() {
    // Basic Latin (bit 0), Greek (bit 7), Cyrillic (bit 9)
    let ws = WritingSystems::from_os2_bits([(1 << 0) | (1 << 7) | (1 << 9), 0, 0, 0], [0, 0]);
    assert!(ws.contains(WritingSystem::Latin));
    assert!(ws.contains(WritingSystem::Greek));
    assert!(ws.contains(WritingSystem::Cyrillic));
    assert!(!ws.contains(WritingSystem::Symbol));

    // Tibetan lives in the third range word (bit 70)
    let ws = WritingSystems::from_os2_bits([0, 0, 1 << (70 - 64), 0], [0, 0]);
    assert!(ws.contains(WritingSystem::Tibetan));

    // Japanese comes from the code page bits
    let ws = WritingSystems::from_os2_bits([0, 0, 0, 0], [1 << 17, 0]);
    assert!(ws.contains(WritingSystem::Japanese));

    // no recognised bit at all
    let ws = WritingSystems::from_os2_bits([0, 0, 0, 0], [0, 0]);
    assert_eq!(ws.iter().collect::<Vec<_>>(), vec![WritingSystem::Symbol]);
}

#[test]
fn test_parse_families_and_foundry() {
    assert_eq!(
        FontRequest::parse_families("'Helvetica', \"Times New Roman\" , Arial,"),
        vec!["Helvetica", "Times New Roman", "Arial"]
    );
    assert_eq!(
        parse_font_name("Arial [Monotype]"),
        ("Arial".to_string(), Some("Monotype".to_string()))
    );
    assert_eq!(parse_font_name("  Arial "), ("Arial".to_string(), None));
    assert_eq!(parse_font_name("Arial []"), ("Arial".to_string(), None));
}

#[test]
fn test_expand_generic_families() {
    let families = vec!["Arial".to_string(), "sans-serif".to_string()];
    let expanded = expand_font_families(&families, OperatingSystem::MacOS);
    assert_eq!(
        expanded,
        vec!["Arial", "San Francisco", "Helvetica Neue", "Lucida Grande"]
    );

    let mono = expand_font_families(&["monospace".to_string()], OperatingSystem::Windows);
    assert_eq!(mono[0], "Segoe UI Mono");

    assert_eq!(
        OperatingSystem::Linux.fallback_families(StyleHint::Serif)[0],
        "Times"
    );
    assert!(OperatingSystem::Linux
        .fallback_families(StyleHint::AnyStyle)
        .is_empty());
}

#[test]
fn test_database_sorted_case_insensitive() {
    let mut db = FontDatabase::new();
    for name in ["helvetica", "Arial", "Zapf Dingbats", "courier"] {
        db.insert(name);
    }
    // idempotent, whatever the case
    db.insert("ARIAL");

    let names: Vec<_> = db.families().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Arial", "courier", "helvetica", "Zapf Dingbats"]);

    assert_eq!(db.lookup("HELVETICA").map(|f| f.name.as_str()), Some("helvetica"));
    assert_eq!(db.lookup_index("Courier"), Some(1));
    assert!(db.lookup("Times").is_none());
}

#[test]
fn test_add_font_merges_records() {
    let bold = StyleKey::new(Slant::Normal, weight::BOLD, 0);
    let mut db = FontDatabase::new();

    db.add_font(&FontDescription::bitmap("Fixed", bold, 12).with_writing_systems(latin()));
    db.add_font(&FontDescription::bitmap("Fixed", bold, 14).with_fixed_pitch(true));
    db.add_font(
        &FontDescription::scalable("Fixed", bold).with_source(FontSource::File {
            path: PathBuf::from("/fonts/fixed-bold.ttf"),
            font_index: 0,
        }),
    );

    assert_eq!(db.len(), 1);
    let family = db.lookup("fixed").unwrap();
    assert!(family.fixed_pitch);
    // a face without writing-system info claims everything
    assert!(family.bogus_writing_systems);
    assert!(family.writing_systems.contains(WritingSystem::Arabic));

    assert_eq!(family.foundries.len(), 1);
    let style = &family.foundries[0].styles[0];
    assert_eq!(family.foundries[0].styles.len(), 1);
    assert!(style.smooth_scalable);
    assert_eq!(
        style.pixel_size(SMOOTH_SCALABLE).map(|s| &s.source),
        Some(&FontSource::File {
            path: PathBuf::from("/fonts/fixed-bold.ttf"),
            font_index: 0,
        })
    );

    assert_eq!(db.pixel_sizes("Fixed", "Bold"), vec![12, 14]);
    assert_eq!(db.point_sizes("Fixed", "Bold", 96.0), vec![9, 11]);
    assert!(db.is_smoothly_scalable("Fixed", "Bold"));
    assert!(!db.is_bitmap_scalable("Fixed", "Bold"));
    assert!(db.is_fixed_pitch("FIXED"));
}

#[test]
fn test_style_names_are_authoritative() {
    let mut db = FontDatabase::new();
    let key = StyleKey::new(Slant::Normal, weight::NORMAL, 0);

    db.add_font(&FontDescription::scalable("Sans", key).with_style_name("Book"));
    db.add_font(&FontDescription::scalable("Sans", key).with_style_name("Text"));
    db.add_font(&FontDescription::scalable(
        "Sans",
        StyleKey::new(Slant::Italic, weight::BOLD, 0),
    ));

    // same key, different names: two styles
    assert_eq!(db.styles("Sans"), vec!["Book", "Text", "Bold Italic"]);
    assert!(db.styles("Serif").is_empty());
}

#[test]
fn test_family_names_by_writing_system() {
    let mut db = FontDatabase::new();
    let key = StyleKey::default();
    db.add_font(&FontDescription::scalable("Latin Sans", key).with_writing_systems(latin()));
    db.add_font(
        &FontDescription::scalable("Mincho", key)
            .with_writing_systems(WritingSystems::empty().with(WritingSystem::Japanese)),
    );

    assert_eq!(db.family_names(None), vec!["Latin Sans", "Mincho"]);
    assert_eq!(db.family_names(Some(WritingSystem::Japanese)), vec!["Mincho"]);
    assert_eq!(db.family_names(Some(WritingSystem::Any)).len(), 2);
    assert!(db.writing_systems("Mincho").contains(WritingSystem::Japanese));
}

#[test]
fn test_foundry_lookup() {
    let key = StyleKey::default();
    let mut db = FontDatabase::new();
    db.add_font(&FontDescription::scalable("Arial", key).with_foundry("Monotype"));

    let family = db.lookup("Arial").unwrap();
    assert!(family.foundry("monotype").is_some());
    // an empty name picks the only foundry
    assert_eq!(family.foundry("").map(|f| f.name.as_str()), Some("Monotype"));

    db.add_font(&FontDescription::scalable("Arial", key).with_foundry("Agfa"));
    let family = db.lookup("Arial").unwrap();
    assert!(family.foundry("").is_none());
    assert_eq!(family.foundries.len(), 2);
}

#[test]
fn test_invalidate_keeps_application_fonts() {
    let key = StyleKey::default();
    let mut db = FontDatabase::new();
    db.add_font(&FontDescription::scalable("System Sans", key));
    let id = db.add_application_font(vec![
        FontDescription::scalable("App Sans", key),
        FontDescription::scalable("App Sans", StyleKey::new(Slant::Italic, weight::NORMAL, 0)),
    ]);
    db.register_application_fonts();
    db.mark_populated();

    assert_eq!(db.application_font_families(id), vec!["App Sans"]);
    let generation = db.generation();

    db.invalidate_all();
    assert!(db.is_empty());
    assert!(!db.is_populated());
    assert_eq!(db.generation(), generation + 1);

    db.register_application_fonts();
    assert_eq!(db.family_names(None), vec!["App Sans"]);

    db.remove_application_font(id).unwrap();
    assert!(matches!(
        db.remove_application_font(id),
        Err(FontError::UnknownApplicationFont(_))
    ));
    assert!(!db.remove_all_application_fonts());

    // ids start over once every font is gone
    let again = db.add_application_font(vec![FontDescription::scalable("Other", key)]);
    assert_eq!(again, id);
}
