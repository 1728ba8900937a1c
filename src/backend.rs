//! Platform boundary: registry population and engine construction.
//!
//! The matcher and the cache never talk to the host directly. A resolver is
//! handed one [`FontBackend`] at construction, which fills the registry on
//! first use and builds [`FontEngine`]s for matched fonts.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::db::{FontDatabase, FontDescription};
use crate::error::FontError;
use crate::resolver::ResolvedFont;
use crate::{OperatingSystem, Script, StyleHint, StyleKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Draws an empty box for every glyph
    Box,
    Outline,
    Bitmap,
    /// Font file memory-mapped from disk
    Mapped,
}

/// A rendering engine for one resolved font. Shaping and rasterization are
/// up to the implementation; the cache only needs its cost.
pub trait FontEngine: Send + Sync + fmt::Debug {
    fn kind(&self) -> EngineKind;

    /// Bytes charged against the cache budget while the engine is cached.
    fn cache_cost(&self) -> usize;

    fn family_name(&self) -> &str;

    fn pixel_size(&self) -> u16;

    /// Symbol engines are stored for every script of a bundle.
    fn is_symbol(&self) -> bool {
        false
    }
}

/// Fallback engine used when nothing matched, so text is never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxEngine {
    pub pixel_size: u16,
}

impl BoxEngine {
    pub fn new(pixel_size: u16) -> Self {
        BoxEngine { pixel_size }
    }
}

impl FontEngine for BoxEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Box
    }

    fn cache_cost(&self) -> usize {
        0
    }

    fn family_name(&self) -> &str {
        ""
    }

    fn pixel_size(&self) -> u16 {
        self.pixel_size
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Windows,
    MacOS,
    Fontconfig,
    Framebuffer,
    Symbian,
    /// Fonts registered programmatically
    Memory,
    /// Font files scanned from disk
    Directory,
}

/// Everything the resolver needs from the host platform.
pub trait FontBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Registers every installed font. Called once per registry generation,
    /// before the first match.
    fn populate(&self, db: &mut FontDatabase, script: Script) -> Result<(), FontError>;

    /// Gives the backend a chance to register a family lazily, right before
    /// it is matched.
    fn load_family(
        &self,
        _db: &mut FontDatabase,
        _family: &str,
        _script: Script,
    ) -> Result<(), FontError> {
        Ok(())
    }

    /// Builds an engine for a matched font. `None` blacklists the family for
    /// the current request and matching continues with the next candidate.
    fn create_engine(&self, font: &ResolvedFont) -> Option<Arc<dyn FontEngine>>;

    /// Families to try once the requested ones failed.
    fn fallback_families(
        &self,
        _family: &str,
        hint: StyleHint,
        _script: Script,
        os: OperatingSystem,
    ) -> Vec<String> {
        os.fallback_families(hint)
    }
}

impl<B: FontBackend + ?Sized> FontBackend for Arc<B> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn populate(&self, db: &mut FontDatabase, script: Script) -> Result<(), FontError> {
        (**self).populate(db, script)
    }

    fn load_family(
        &self,
        db: &mut FontDatabase,
        family: &str,
        script: Script,
    ) -> Result<(), FontError> {
        (**self).load_family(db, family, script)
    }

    fn create_engine(&self, font: &ResolvedFont) -> Option<Arc<dyn FontEngine>> {
        (**self).create_engine(font)
    }

    fn fallback_families(
        &self,
        family: &str,
        hint: StyleHint,
        script: Script,
        os: OperatingSystem,
    ) -> Vec<String> {
        (**self).fallback_families(family, hint, script, os)
    }
}

/// Engine produced by [`MemoryBackend`]. Holds no glyph data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEngine {
    pub family: String,
    pub style: StyleKey,
    pub pixel_size: u16,
    pub cost: usize,
    pub outline: bool,
    pub symbol: bool,
}

impl FontEngine for MemoryEngine {
    fn kind(&self) -> EngineKind {
        if self.outline {
            EngineKind::Outline
        } else {
            EngineKind::Bitmap
        }
    }

    fn cache_cost(&self) -> usize {
        self.cost
    }

    fn family_name(&self) -> &str {
        &self.family
    }

    fn pixel_size(&self) -> u16 {
        self.pixel_size
    }

    fn is_symbol(&self) -> bool {
        self.symbol
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    fonts: Vec<FontDescription>,
    // lowercase family names whose engines fail to load
    failing: BTreeSet<String>,
    engine_cost: usize,
    engines_created: usize,
}

/// Backend over an in-memory font list, for embedders that ship their own
/// fonts and for tests.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

impl MemoryBackend {
    /// Engines cost this many bytes unless changed.
    pub const DEFAULT_ENGINE_COST: usize = 64 * 1024;

    pub fn new() -> Self {
        MemoryBackend {
            state: Mutex::new(MemoryState {
                engine_cost: Self::DEFAULT_ENGINE_COST,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes effect on the next population.
    pub fn add_font(&self, font: FontDescription) {
        self.state().fonts.push(font);
    }

    pub fn set_engine_cost(&self, bytes: usize) {
        self.state().engine_cost = bytes;
    }

    /// Engines for `family` will fail to load.
    pub fn fail_family(&self, family: &str) {
        self.state().failing.insert(family.to_lowercase());
    }

    /// Number of engines built so far.
    pub fn engines_created(&self) -> usize {
        self.state().engines_created
    }
}

impl FontBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn populate(&self, db: &mut FontDatabase, _script: Script) -> Result<(), FontError> {
        let state = self.state();
        for font in &state.fonts {
            db.add_font(font);
        }
        log::debug!("memory backend: registered {} fonts", state.fonts.len());
        Ok(())
    }

    fn create_engine(&self, font: &ResolvedFont) -> Option<Arc<dyn FontEngine>> {
        let mut state = self.state();
        if state.failing.contains(&font.family.to_lowercase()) {
            return None;
        }
        state.engines_created += 1;

        Some(Arc::new(MemoryEngine {
            family: font.family.clone(),
            style: font.style,
            pixel_size: font.pixel_size,
            cost: state.engine_cost,
            outline: font.smooth_scalable,
            symbol: font.is_symbol(),
        }))
    }
}
