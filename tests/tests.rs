use rust_fontresolve::*;
use std::sync::Arc;

fn bold_italic() -> StyleKey {
    StyleKey::new(Slant::Italic, weight::BOLD, 0)
}

fn latin() -> WritingSystems {
    WritingSystems::empty().with(WritingSystem::Latin)
}

fn config() -> ResolverConfig {
    ResolverConfig {
        os: OperatingSystem::Linux,
        ..Default::default()
    }
}

fn resolver(backend: &Arc<MemoryBackend>) -> FontResolver {
    FontResolver::with_config(Box::new(backend.clone()), config())
}

fn request(families: &[&str]) -> FontRequest {
    FontRequest {
        families: families.iter().map(|s| s.to_string()).collect(),
        style: bold_italic(),
        size: FontSize::Pixel(12),
        script: Script::Latin,
        ..Default::default()
    }
}

#[test]
fn test_exact_bitmap_size_beats_smooth_scalable() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(
        FontDescription::bitmap("Helvetica", bold_italic(), 12)
            .with_writing_systems(latin())
            .with_source(FontSource::Handle(1)),
    );
    backend.add_font(
        FontDescription::scalable("Helvetica", bold_italic())
            .with_writing_systems(latin())
            .with_source(FontSource::Handle(2)),
    );
    backend.add_font(
        FontDescription::bitmap("Helvetica", StyleKey::default(), 12)
            .with_writing_systems(latin())
            .with_source(FontSource::Handle(3)),
    );

    let resolver = resolver(&backend);
    let mut trace = Vec::new();
    let font = resolver
        .resolve_with_trace(&request(&["Helvetica", "Arial"]), &mut trace)
        .unwrap();

    assert_eq!(font.family, "Helvetica");
    assert_eq!(font.style, bold_italic());
    assert_eq!(font.pixel_size, 12);
    assert_eq!(font.source, FontSource::Handle(1));
    assert_eq!(font.score, 0);
    assert!(!font.bitmap_scaled);
    assert!(trace
        .iter()
        .any(|m| m.reason == MatchReason::Success { score: 0 }));
}

#[test]
fn test_missing_family_falls_back_to_next() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(
        FontDescription::scalable("Arial", bold_italic())
            .with_writing_systems(latin())
            .with_source(FontSource::Handle(7)),
    );

    let resolver = resolver(&backend);
    let mut trace = Vec::new();
    let font = resolver
        .resolve_with_trace(&request(&["Helvetica", "Arial"]), &mut trace)
        .unwrap();

    assert_eq!(font.family, "Arial");
    assert!(font.smooth_scalable);
    assert_eq!(font.pixel_size, 12);
    assert_eq!(font.source, FontSource::Handle(7));
    assert!(trace.iter().any(|m| matches!(
        &m.reason,
        MatchReason::FamilyNotFound { requested } if requested == "Helvetica"
    )));
}

#[test]
fn test_acquire_twice_counts_two_entries_one_cost() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let font = resolver.resolve(&request(&["Arial"])).unwrap();

    let first = resolver.acquire_engine(&font).unwrap();
    let second = resolver.acquire_engine(&font).unwrap();

    assert!(first.same_engine(&second));
    assert_eq!(first.ref_count(), 2);
    assert_eq!(backend.engines_created(), 1);

    let expected_kb = (MemoryBackend::DEFAULT_ENGINE_COST / 1024) as u32;
    resolver.with_cache(|cache| {
        assert_eq!(cache.cache_count(first.id()), 2);
        assert_eq!(cache.engine_count(), 1);
        assert_eq!(cache.total_cost_kb(), expected_kb);
    });
}

#[test]
fn test_foundry_in_family_name() {
    let backend = Arc::new(MemoryBackend::new());
    for (foundry, handle) in [("Agfa", 1), ("Monotype", 2)] {
        backend.add_font(
            FontDescription::scalable("Arial", bold_italic())
                .with_foundry(foundry)
                .with_writing_systems(latin())
                .with_source(FontSource::Handle(handle)),
        );
    }

    let resolver = resolver(&backend);
    let font = resolver.resolve(&request(&["Arial [Monotype]"])).unwrap();
    assert_eq!(font.foundry, "Monotype");
    assert_eq!(font.source, FontSource::Handle(2));
    assert_eq!(font.display_name(), "Arial [Monotype]");

    // unknown foundry: any foundry will do
    let font = resolver.resolve(&request(&["Arial [Bitstream]"])).unwrap();
    assert_eq!(font.family, "Arial");
}

#[test]
fn test_script_only_search() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(
        FontDescription::scalable("Mincho", StyleKey::default())
            .with_writing_systems(WritingSystems::empty().with(WritingSystem::Japanese)),
    );
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let mut req = request(&["Nonexistent"]);
    req.script = Script::Han;

    let font = resolver.resolve(&req).unwrap();
    assert_eq!(font.family, "Mincho");
    // style differs, but the script wins
    assert!(font.score >= matcher::STYLE_MISMATCH);

    req.script = Script::Arabic;
    assert!(resolver.resolve(&req).is_none());
}

#[test]
fn test_default_family_before_script_search() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Alpha", bold_italic()).with_writing_systems(latin()));
    backend.add_font(FontDescription::scalable("Omega", bold_italic()).with_writing_systems(latin()));

    let mut config = config();
    config.matching.default_family = Some("Omega".to_string());
    let resolver = FontResolver::with_config(Box::new(backend.clone()), config);

    let font = resolver.resolve(&request(&["Missing"])).unwrap();
    assert_eq!(font.family, "Omega");

    // without a default the first family supporting the script wins
    let resolver = self::resolver(&backend);
    let font = resolver.resolve(&request(&["Missing"])).unwrap();
    assert_eq!(font.family, "Alpha");
}

#[test]
fn test_style_hint_fallback() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Aardvark", bold_italic()).with_writing_systems(latin()));
    backend.add_font(FontDescription::scalable("DejaVu Serif", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let mut req = request(&["Missing"]);
    req.style_hint = StyleHint::Serif;

    let font = resolver.resolve(&req).unwrap();
    assert_eq!(font.family, "DejaVu Serif");
}

#[test]
fn test_invalidate_picks_up_new_fonts() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Old Sans", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let req = request(&["New Sans"]);
    assert_eq!(resolver.resolve(&req).unwrap().family, "Old Sans");

    drop(resolver.load(&req));
    assert_eq!(resolver.with_cache(|c| c.engine_count()), 1);

    backend.add_font(FontDescription::scalable("New Sans", bold_italic()).with_writing_systems(latin()));
    // not visible until invalidated
    assert_eq!(resolver.resolve(&req).unwrap().family, "Old Sans");

    resolver.invalidate();
    assert_eq!(resolver.with_cache(|c| c.engine_count()), 0);
    assert_eq!(resolver.resolve(&req).unwrap().family, "New Sans");
    assert_eq!(resolver.families(None), vec!["New Sans", "Old Sans"]);
}

#[test]
fn test_invalidate_keeps_referenced_engines() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let held = resolver.load(&request(&["Arial"]));
    resolver.invalidate();

    resolver.with_cache(|cache| assert!(cache.contains_engine(held.id())));
    assert_eq!(held.engine().family_name(), "Arial");
}

#[test]
fn test_failing_family_is_blacklisted() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Helvetica", bold_italic()).with_writing_systems(latin()));
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));
    backend.fail_family("Helvetica");

    let resolver = resolver(&backend);
    let engine = resolver.load(&request(&["Helvetica"]));
    assert_eq!(engine.engine().family_name(), "Arial");
    assert_eq!(engine.engine().kind(), EngineKind::Outline);

    // resolving alone does not build anything, so it still picks the broken family
    assert_eq!(
        resolver.resolve(&request(&["Helvetica"])).unwrap().family,
        "Helvetica"
    );
}

/// Registers one extra family the first time it is asked for by name.
#[derive(Debug)]
struct LazyBackend {
    inner: MemoryBackend,
    lazy: FontDescription,
}

impl FontBackend for LazyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn populate(&self, db: &mut FontDatabase, script: Script) -> Result<(), FontError> {
        self.inner.populate(db, script)
    }

    fn load_family(&self, db: &mut FontDatabase, family: &str, _script: Script) -> Result<(), FontError> {
        if family.eq_ignore_ascii_case(&self.lazy.family) && db.lookup(family).is_none() {
            db.add_font(&self.lazy);
        }
        Ok(())
    }

    fn create_engine(&self, font: &ResolvedFont) -> Option<Arc<dyn FontEngine>> {
        self.inner.create_engine(font)
    }
}

#[test]
fn test_blacklist_survives_lazily_registered_family() {
    let inner = MemoryBackend::new();
    inner.add_font(FontDescription::scalable("Alpha", bold_italic()).with_writing_systems(latin()));
    inner.add_font(FontDescription::scalable("Charlie", bold_italic()).with_writing_systems(latin()));
    inner.fail_family("Alpha");
    let backend = LazyBackend {
        inner,
        lazy: FontDescription::scalable("Aardvark", bold_italic()).with_writing_systems(latin()),
    };

    let resolver = FontResolver::with_config(Box::new(backend), config());
    // "Aardvark" sorts before "Alpha", so it is inserted at the front
    let engine = resolver.load(&request(&["Alpha", "Aardvark"]));
    assert_eq!(engine.engine().family_name(), "Aardvark");
    assert!(resolver.with_database(|db| db.lookup("aardvark").is_some()));
}

#[test]
fn test_bundles_are_keyed_by_foundry_and_style_name() {
    let backend = Arc::new(MemoryBackend::new());
    for (foundry, handle) in [("Agfa", 1), ("Monotype", 2)] {
        backend.add_font(
            FontDescription::scalable("Arial", bold_italic())
                .with_foundry(foundry)
                .with_writing_systems(latin())
                .with_source(FontSource::Handle(handle)),
        );
    }
    backend.add_font(
        FontDescription::scalable("Arial", StyleKey::new(Slant::Normal, weight::LIGHT, 75))
            .with_foundry("Agfa")
            .with_style_name("Light Condensed")
            .with_writing_systems(latin()),
    );
    let resolver = resolver(&backend);

    let mut agfa = request(&["Arial"]);
    agfa.foundry = Some("Agfa".to_string());
    let mut monotype = agfa.clone();
    monotype.foundry = Some("Monotype".to_string());
    assert_eq!(resolver.resolve(&monotype).unwrap().foundry, "Monotype");

    let agfa_engine = resolver.load(&agfa);
    let monotype_engine = resolver.load(&monotype);
    assert!(!agfa_engine.same_engine(&monotype_engine));
    assert_eq!(backend.engines_created(), 2);

    let mut condensed = agfa.clone();
    condensed.style_name = Some("Light Condensed".to_string());
    let condensed_engine = resolver.load(&condensed);
    assert!(!condensed_engine.same_engine(&agfa_engine));
    assert_eq!(backend.engines_created(), 3);
    resolver.with_cache(|cache| assert_eq!(cache.engine_data_count(), 3));

    // an identical request is served from its own bundle
    let again = resolver.load(&monotype);
    assert!(again.same_engine(&monotype_engine));
    assert_eq!(backend.engines_created(), 3);
}

#[test]
fn test_total_failure_returns_shared_box_engine() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Helvetica", bold_italic()).with_writing_systems(latin()));
    backend.fail_family("Helvetica");

    let resolver = resolver(&backend);
    let first = resolver.load(&request(&["Helvetica"]));
    assert_eq!(first.engine().kind(), EngineKind::Box);
    assert_eq!(first.engine().pixel_size(), 12);

    let mut other = request(&["Something Else"]);
    other.style = StyleKey::default();
    let second = resolver.load(&other);
    assert!(first.same_engine(&second));
    assert_eq!(backend.engines_created(), 0);
}

#[test]
fn test_symbol_engine_fills_every_script() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(
        FontDescription::scalable("Wingdings", StyleKey::default())
            .with_writing_systems(WritingSystems::empty().with(WritingSystem::Symbol)),
    );

    let resolver = resolver(&backend);
    let mut req = request(&["Wingdings"]);
    req.script = Script::Common;
    req.style = StyleKey::default();

    let data = resolver.engine_data(&req);
    let engine = resolver.load_into(&data, &req);
    assert!(engine.engine().is_symbol());
    assert_eq!(data.engine_count(), Script::COUNT);
    assert!(data.engine(Script::Han).unwrap().same_engine(&engine));
}

#[test]
fn test_unknown_coverage_is_not_symbol() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(
        FontDescription::scalable("Wingdings", bold_italic())
            .with_writing_systems(WritingSystems::empty().with(WritingSystem::Symbol)),
    );
    // no writing systems: the family claims all of them
    backend.add_font(FontDescription::scalable("Mystery", bold_italic()));

    let resolver = resolver(&backend);
    let mut symbol_req = request(&["Wingdings"]);
    symbol_req.script = Script::Common;
    assert!(resolver.resolve(&symbol_req).unwrap().is_symbol());

    let req = request(&["Mystery"]);
    let font = resolver.resolve(&req).unwrap();
    assert!(font.writing_systems.contains(WritingSystem::Symbol));
    assert!(!font.is_symbol());

    let data = resolver.engine_data(&req);
    let engine = resolver.load_into(&data, &req);
    assert!(!engine.engine().is_symbol());
    assert_eq!(data.engine_count(), 1);
}

#[test]
fn test_no_font_merging_fills_every_script() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let req = request(&["Arial"]);
    let data = resolver.engine_data(&req);
    resolver.load_into(&data, &req);
    assert_eq!(data.engine_count(), 1);

    let mut req = request(&["Arial"]);
    req.style_strategy = StyleStrategy::NO_FONT_MERGING;
    let data = resolver.engine_data(&req);
    let engine = resolver.load_into(&data, &req);
    assert_eq!(data.engine_count(), Script::COUNT);
    assert!(data.engine(Script::Arabic).unwrap().same_engine(&engine));
}

#[test]
fn test_load_reuses_bundle_slot() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let req = request(&["Arial"]);
    let first = resolver.load(&req);
    let second = resolver.load(&req);
    assert!(first.same_engine(&second));

    resolver.with_cache(|cache| {
        assert_eq!(cache.engine_data_count(), 1);
        // served from the bundle, no second key entry
        assert_eq!(cache.cache_count(first.id()), 1);
    });
}

#[test]
fn test_shared_database_across_resolvers() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let db = FontDatabase::shared();
    let first = FontResolver::with_shared_database(Box::new(backend.clone()), db.clone(), config());
    let second = FontResolver::with_shared_database(Box::new(backend.clone()), db.clone(), config());

    let req = request(&["Arial"]);
    drop(first.load(&req));
    drop(second.load(&req));

    // one engine per resolver, the registry is only populated once
    assert_eq!(backend.engines_created(), 2);
    assert_eq!(first.with_cache(|c| c.engine_count()), 1);
    assert_eq!(second.with_cache(|c| c.engine_count()), 1);

    first.invalidate();
    assert_eq!(db.lock().unwrap().generation(), 1);

    // the second resolver notices the new generation on its next lookup
    assert!(second.resolve(&req).is_some());
    assert_eq!(second.with_cache(|c| c.engine_count()), 0);
}

#[test]
fn test_application_fonts() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);
    let req = request(&["Brand Sans"]);
    assert_eq!(resolver.resolve(&req).unwrap().family, "Arial");

    let id = resolver.register_application_font(vec![FontDescription::scalable(
        "Brand Sans",
        bold_italic(),
    )
    .with_writing_systems(latin())]);
    assert_eq!(resolver.resolve(&req).unwrap().family, "Brand Sans");

    // survives a registry rebuild
    resolver.invalidate();
    assert_eq!(resolver.resolve(&req).unwrap().family, "Brand Sans");

    resolver.remove_application_font(id).unwrap();
    assert_eq!(resolver.resolve(&req).unwrap().family, "Arial");
    assert!(matches!(
        resolver.remove_application_font(id),
        Err(FontError::UnknownApplicationFont(_))
    ));
    assert!(!resolver.remove_all_application_fonts());
}

#[test]
fn test_exact_match() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));

    let resolver = resolver(&backend);

    let req = request(&["Arial"]);
    assert!(resolver.resolve(&req).unwrap().exact_match(&req));

    // 9pt at 96 dpi is 12px
    let mut points = request(&["arial"]);
    points.size = FontSize::Point(9.0);
    assert!(resolver.resolve(&points).unwrap().exact_match(&points));

    let substituted = request(&["Helvetica", "Arial"]);
    assert!(!resolver.resolve(&substituted).unwrap().exact_match(&substituted));

    let mut fixed = request(&["Arial"]);
    fixed.pitch = Pitch::Fixed;
    let font = resolver.resolve(&fixed).unwrap();
    assert_eq!(font.score, matcher::PITCH_MISMATCH);
    assert!(!font.exact_match(&fixed));
}

#[test]
fn test_registry_queries() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_font(FontDescription::scalable("Arial", bold_italic()).with_writing_systems(latin()));
    backend.add_font(FontDescription::scalable("Arial", StyleKey::default()).with_writing_systems(latin()));
    backend.add_font(
        FontDescription::bitmap("Terminus", StyleKey::default(), 16)
            .with_fixed_pitch(true)
            .with_writing_systems(latin()),
    );

    let resolver = resolver(&backend);
    assert_eq!(resolver.families(None), vec!["Arial", "Terminus"]);
    assert_eq!(resolver.styles("arial"), vec!["Normal", "Bold Italic"]);

    resolver.with_database(|db| {
        assert!(db.is_smoothly_scalable("Arial", "Bold Italic"));
        assert!(!db.is_smoothly_scalable("Terminus", "Normal"));
        assert_eq!(db.pixel_sizes("Terminus", "Normal"), vec![16]);
        assert!(db.is_fixed_pitch("Terminus"));
    });
}

#[test]
fn test_operating_system_font_expansion() {
    let windows_os = OperatingSystem::Windows;
    assert_eq!(windows_os.get_serif_fonts(), vec!["Times New Roman".to_string()]);
    assert_eq!(
        windows_os.get_sans_serif_fonts(),
        vec!["Segoe UI", "Tahoma", "Microsoft Sans Serif", "MS Sans Serif", "Helv"]
    );

    let macos_os = OperatingSystem::MacOS;
    assert_eq!(macos_os.get_serif_fonts(), vec!["Times", "New York", "Palatino"]);
    assert_eq!(macos_os.last_resort_family().as_deref(), Some("San Francisco"));

    let linux_os = OperatingSystem::Linux;
    assert_eq!(linux_os.get_serif_fonts().len(), 8, "Linux should have 8 serif fonts");
    assert_eq!(
        linux_os.fallback_families(StyleHint::TypeWriter),
        linux_os.get_monospace_fonts()
    );

    // non-generic families pass through unchanged
    let specific = vec!["MyCustomFont".to_string()];
    assert_eq!(expand_font_families(&specific, linux_os), specific);

    assert!(OperatingSystem::Wasm.last_resort_family().is_none());
}
