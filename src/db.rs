//! The family / foundry / style / size registry.
//!
//! Families are kept sorted by case-insensitive name so lookups are a binary
//! search. The registry does no I/O of its own: a `FontBackend` populates it
//! through [`FontDatabase::add_font`], and it stays read-only until
//! [`FontDatabase::invalidate_all`] drops every record.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::FontError;
use crate::{weight, Slant, StyleKey, WritingSystem, WritingSystems};

/// Pixel size sentinel meaning "any size, scaled on demand".
pub const SMOOTH_SCALABLE: u16 = 0xffff;

/// Registry shared between several resolvers (for example one per thread).
pub type SharedDatabase = Arc<Mutex<FontDatabase>>;

/// Opaque backing reference, only interpreted by the engine factory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum FontSource {
    None,
    File {
        path: PathBuf,
        font_index: usize,
    },
    #[cfg_attr(feature = "cache", serde(skip))]
    Memory {
        bytes: Arc<Vec<u8>>,
        font_index: usize,
    },
    Handle(u64),
}

impl Default for FontSource {
    fn default() -> Self {
        FontSource::None
    }
}

impl FontSource {
    pub fn is_memory(&self) -> bool {
        matches!(self, FontSource::Memory { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeRecord {
    /// Pixel size, `SMOOTH_SCALABLE` for outlines and `0` for the
    /// bitmap-scalable entry
    pub pixel_size: u16,
    pub source: FontSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleRecord {
    pub key: StyleKey,
    /// Authoritative when non-empty
    pub style_name: String,
    pub bitmap_scalable: bool,
    pub smooth_scalable: bool,
    pub antialiased: bool,
    pub sizes: Vec<SizeRecord>,
}

impl StyleRecord {
    pub fn new(key: StyleKey) -> Self {
        StyleRecord {
            key,
            style_name: String::new(),
            bitmap_scalable: false,
            smooth_scalable: false,
            antialiased: true,
            sizes: Vec::new(),
        }
    }

    pub fn pixel_size(&self, size: u16) -> Option<&SizeRecord> {
        self.sizes.iter().find(|s| s.pixel_size == size)
    }

    pub fn pixel_size_or_insert(&mut self, size: u16) -> &mut SizeRecord {
        let pos = match self.sizes.iter().position(|s| s.pixel_size == size) {
            Some(pos) => pos,
            None => {
                self.sizes.push(SizeRecord {
                    pixel_size: size,
                    source: FontSource::None,
                });
                self.sizes.len() - 1
            }
        };
        &mut self.sizes[pos]
    }

    /// Display name: the style name if set, otherwise derived from the key.
    pub fn display_name(&self) -> String {
        if self.style_name.is_empty() {
            style_string(&self.key)
        } else {
            self.style_name.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FoundryRecord {
    /// Empty = default foundry
    pub name: String,
    pub styles: Vec<StyleRecord>,
}

impl FoundryRecord {
    pub fn new(name: &str) -> Self {
        FoundryRecord {
            name: name.to_string(),
            styles: Vec::new(),
        }
    }

    fn style_position(&self, key: &StyleKey, style_name: &str) -> Option<usize> {
        // search by style name first if both sides have one
        self.styles.iter().position(|s| {
            if !style_name.is_empty() && !s.style_name.is_empty() {
                s.style_name == style_name
            } else {
                s.key.matches(key)
            }
        })
    }

    pub fn style(&self, key: &StyleKey, style_name: &str) -> Option<&StyleRecord> {
        self.style_position(key, style_name).map(|i| &self.styles[i])
    }

    pub fn style_or_insert(&mut self, key: StyleKey, style_name: &str) -> &mut StyleRecord {
        let pos = match self.style_position(&key, style_name) {
            Some(pos) => pos,
            None => {
                let mut style = StyleRecord::new(key);
                style.style_name = style_name.to_string();
                self.styles.push(style);
                self.styles.len() - 1
            }
        };
        &mut self.styles[pos]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FamilyRecord {
    pub name: String,
    pub writing_systems: WritingSystems,
    pub fixed_pitch: bool,
    /// Set when the family was registered without writing-system
    /// information and claims support for everything
    pub bogus_writing_systems: bool,
    pub foundries: Vec<FoundryRecord>,
}

impl FamilyRecord {
    pub fn new(name: &str) -> Self {
        FamilyRecord {
            name: name.to_string(),
            writing_systems: WritingSystems::empty(),
            fixed_pitch: false,
            bogus_writing_systems: false,
            foundries: Vec::new(),
        }
    }

    /// Case-insensitive foundry lookup. An empty name returns the only
    /// foundry if there is exactly one.
    pub fn foundry(&self, name: &str) -> Option<&FoundryRecord> {
        if name.is_empty() && self.foundries.len() == 1 {
            return self.foundries.first();
        }
        self.foundries
            .iter()
            .find(|f| compare_names(&f.name, name) == Ordering::Equal)
    }

    pub fn foundry_or_insert(&mut self, name: &str) -> &mut FoundryRecord {
        let pos = match self
            .foundries
            .iter()
            .position(|f| compare_names(&f.name, name) == Ordering::Equal)
        {
            Some(pos) => pos,
            None => {
                self.foundries.push(FoundryRecord::new(name));
                self.foundries.len() - 1
            }
        };
        &mut self.foundries[pos]
    }

    pub fn styles(&self) -> impl Iterator<Item = &StyleRecord> {
        self.foundries.iter().flat_map(|f| f.styles.iter())
    }
}

/// One installed face, as handed to the registry by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDescription {
    pub family: String,
    pub foundry: String,
    pub style_name: String,
    pub style: StyleKey,
    /// `0` = smooth scalable (outline) face
    pub pixel_size: u16,
    pub bitmap_scalable: bool,
    pub fixed_pitch: bool,
    pub antialiased: bool,
    /// Empty = unknown, treated as "supports everything"
    pub writing_systems: WritingSystems,
    pub source: FontSource,
}

impl FontDescription {
    /// An outline face usable at any pixel size.
    pub fn scalable(family: &str, style: StyleKey) -> Self {
        FontDescription {
            family: family.to_string(),
            foundry: String::new(),
            style_name: String::new(),
            style,
            pixel_size: 0,
            bitmap_scalable: false,
            fixed_pitch: false,
            antialiased: true,
            writing_systems: WritingSystems::empty(),
            source: FontSource::None,
        }
    }

    /// A bitmap face with a single fixed pixel size.
    pub fn bitmap(family: &str, style: StyleKey, pixel_size: u16) -> Self {
        FontDescription {
            pixel_size: pixel_size.max(1),
            antialiased: false,
            ..FontDescription::scalable(family, style)
        }
    }

    pub fn with_foundry(mut self, foundry: &str) -> Self {
        self.foundry = foundry.to_string();
        self
    }

    pub fn with_style_name(mut self, style_name: &str) -> Self {
        self.style_name = style_name.to_string();
        self
    }

    pub fn with_writing_systems(mut self, writing_systems: WritingSystems) -> Self {
        self.writing_systems = writing_systems;
        self
    }

    pub fn with_fixed_pitch(mut self, fixed_pitch: bool) -> Self {
        self.fixed_pitch = fixed_pitch;
        self
    }

    pub fn with_bitmap_scalable(mut self, bitmap_scalable: bool) -> Self {
        self.bitmap_scalable = bitmap_scalable;
        self
    }

    pub fn with_source(mut self, source: FontSource) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ApplicationFont {
    descriptions: Vec<FontDescription>,
    families: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FontDatabase {
    families: Vec<FamilyRecord>,
    generation: u64,
    populated: bool,
    // survives invalidate_all(), re-registered on the next population
    application_fonts: Vec<Option<ApplicationFont>>,
}

impl FontDatabase {
    pub fn new() -> Self {
        FontDatabase::default()
    }

    pub fn shared() -> SharedDatabase {
        Arc::new(Mutex::new(FontDatabase::new()))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// All families in sorted order; the position is the family index used
    /// for blacklisting.
    pub fn families(&self) -> &[FamilyRecord] {
        &self.families
    }

    pub fn family_at(&self, index: usize) -> Option<&FamilyRecord> {
        self.families.get(index)
    }

    /// Bumped on every `invalidate_all`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn mark_populated(&mut self) {
        self.populated = true;
    }

    pub fn lookup_index(&self, name: &str) -> Option<usize> {
        self.families
            .binary_search_by(|f| compare_names(&f.name, name))
            .ok()
    }

    pub fn lookup(&self, name: &str) -> Option<&FamilyRecord> {
        self.lookup_index(name).map(|i| &self.families[i])
    }

    /// Returns the existing family record or inserts a new one at its sorted
    /// position.
    pub fn insert(&mut self, name: &str) -> &mut FamilyRecord {
        let pos = match self
            .families
            .binary_search_by(|f| compare_names(&f.name, name))
        {
            Ok(pos) => pos,
            Err(pos) => {
                self.families.insert(pos, FamilyRecord::new(name));
                pos
            }
        };
        &mut self.families[pos]
    }

    /// Registers one face, merging it into existing family / foundry / style
    /// records where the keys agree.
    pub fn add_font(&mut self, desc: &FontDescription) {
        if desc.family.is_empty() {
            return;
        }

        let family = self.insert(&desc.family);

        if desc.writing_systems.is_empty() {
            family.writing_systems = WritingSystems::all();
            family.bogus_writing_systems = true;
        } else {
            for ws in desc.writing_systems.iter() {
                family.writing_systems.insert(ws);
            }
        }
        family.fixed_pitch |= desc.fixed_pitch;

        let foundry = family.foundry_or_insert(&desc.foundry);
        let style = foundry.style_or_insert(desc.style, &desc.style_name);
        style.antialiased = desc.antialiased;
        style.bitmap_scalable |= desc.bitmap_scalable;

        let size = if desc.pixel_size == 0 {
            style.smooth_scalable = true;
            style.pixel_size_or_insert(SMOOTH_SCALABLE)
        } else {
            style.pixel_size_or_insert(desc.pixel_size)
        };
        size.source = desc.source.clone();

        if desc.bitmap_scalable {
            let scaled = style.pixel_size_or_insert(0);
            if scaled.source == FontSource::None {
                scaled.source = desc.source.clone();
            }
        }
    }

    /// Drops every family record. Application fonts are kept and come back
    /// with the next population.
    pub fn invalidate_all(&mut self) {
        log::debug!(
            "font database: invalidating {} families (generation {})",
            self.families.len(),
            self.generation
        );
        self.families.clear();
        self.populated = false;
        self.generation += 1;
    }

    /// Returns the id of the new application font.
    pub fn add_application_font(&mut self, descriptions: Vec<FontDescription>) -> usize {
        let mut families: Vec<String> = Vec::new();
        for d in &descriptions {
            if !families.iter().any(|f| compare_names(f, &d.family) == Ordering::Equal) {
                families.push(d.family.clone());
            }
        }

        let font = ApplicationFont {
            descriptions,
            families,
        };

        match self.application_fonts.iter().position(Option::is_none) {
            Some(slot) => {
                self.application_fonts[slot] = Some(font);
                slot
            }
            None => {
                self.application_fonts.push(Some(font));
                self.application_fonts.len() - 1
            }
        }
    }

    pub fn remove_application_font(&mut self, id: usize) -> Result<(), FontError> {
        match self.application_fonts.get_mut(id) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(FontError::UnknownApplicationFont(id)),
        }
    }

    /// Returns false if there were none.
    pub fn remove_all_application_fonts(&mut self) -> bool {
        let had_any = self.application_fonts.iter().any(Option::is_some);
        self.application_fonts.clear();
        had_any
    }

    pub fn application_font_families(&self, id: usize) -> Vec<String> {
        self.application_fonts
            .get(id)
            .and_then(|f| f.as_ref())
            .map(|f| f.families.clone())
            .unwrap_or_default()
    }

    /// Adds every registered application font to the family records.
    pub fn register_application_fonts(&mut self) {
        let descriptions: Vec<FontDescription> = self
            .application_fonts
            .iter()
            .flatten()
            .flat_map(|f| f.descriptions.iter().cloned())
            .collect();
        for desc in &descriptions {
            self.add_font(desc);
        }
    }

    /// Family names, optionally restricted to a writing system.
    pub fn family_names(&self, writing_system: Option<WritingSystem>) -> Vec<String> {
        self.families
            .iter()
            .filter(|f| match writing_system {
                None | Some(WritingSystem::Any) => true,
                Some(ws) => f.writing_systems.contains(ws),
            })
            .map(|f| f.name.clone())
            .collect()
    }

    /// Style names of a family, sorted by style key.
    pub fn styles(&self, family: &str) -> Vec<String> {
        let mut styles: Vec<&StyleRecord> = match self.lookup(family) {
            Some(f) => f.styles().collect(),
            None => return Vec::new(),
        };
        styles.sort_by_key(|s| (s.key.weight, s.key.slant, s.key.stretch));

        let mut names: Vec<String> = Vec::new();
        for s in styles {
            let name = s.display_name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn find_style(&self, family: &str, style: &str) -> Option<&StyleRecord> {
        let key = StyleKey::from_style_name(style);
        let family = self.lookup(family)?;
        family
            .styles()
            .find(|s| !s.style_name.is_empty() && s.style_name == style)
            .or_else(|| family.styles().find(|s| s.key.matches(&key)))
    }

    /// Fixed pixel sizes of a style, smooth and bitmap-scalable entries excluded.
    pub fn pixel_sizes(&self, family: &str, style: &str) -> Vec<u16> {
        let mut sizes: Vec<u16> = self
            .find_style(family, style)
            .map(|s| {
                s.sizes
                    .iter()
                    .map(|sz| sz.pixel_size)
                    .filter(|px| *px != 0 && *px != SMOOTH_SCALABLE)
                    .collect()
            })
            .unwrap_or_default();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// Point sizes of a style at the given resolution.
    pub fn point_sizes(&self, family: &str, style: &str, dpi: f32) -> Vec<u16> {
        let mut sizes: Vec<u16> = self
            .pixel_sizes(family, style)
            .into_iter()
            .map(|px| (px as f32 * 72.0 / dpi).round() as u16)
            .collect();
        sizes.dedup();
        sizes
    }

    pub fn is_smoothly_scalable(&self, family: &str, style: &str) -> bool {
        self.find_style(family, style)
            .map(|s| s.smooth_scalable)
            .unwrap_or(false)
    }

    pub fn is_bitmap_scalable(&self, family: &str, style: &str) -> bool {
        self.find_style(family, style)
            .map(|s| s.bitmap_scalable)
            .unwrap_or(false)
    }

    pub fn is_fixed_pitch(&self, family: &str) -> bool {
        self.lookup(family).map(|f| f.fixed_pitch).unwrap_or(false)
    }

    pub fn writing_systems(&self, family: &str) -> WritingSystems {
        self.lookup(family)
            .map(|f| f.writing_systems)
            .unwrap_or_default()
    }

    #[cfg(feature = "cache")]
    pub(crate) fn families_mut(&mut self) -> &mut Vec<FamilyRecord> {
        &mut self.families
    }
}

/// Case-insensitive name ordering used for families and foundries.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Human-readable style string for a key, e.g. `"Bold Italic"`.
pub fn style_string(key: &StyleKey) -> String {
    let mut result = String::new();
    if key.weight >= weight::BLACK {
        result.push_str("Black");
    } else if key.weight >= weight::BOLD {
        result.push_str("Bold");
    } else if key.weight >= weight::DEMI_BOLD {
        result.push_str("Demi Bold");
    } else if key.weight < weight::NORMAL {
        result.push_str("Light");
    }

    match key.slant {
        Slant::Italic => result.push_str(" Italic"),
        Slant::Oblique => result.push_str(" Oblique"),
        Slant::Normal => {}
    }

    let result = result.trim().to_string();
    if result.is_empty() {
        "Normal".to_string()
    } else {
        result
    }
}
