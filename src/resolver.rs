//! Request resolution on top of the registry, the matcher and the cache.
//!
//! A [`FontResolver`] owns one engine cache and a handle to a (possibly
//! shared) font database. Lookups go through the family list of a request
//! in order: the requested families, the configured default family, the
//! backend's fallbacks for the style hint, any family supporting the script,
//! and finally a last-resort family. If no engine can be built for any of
//! them, a box engine is returned.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::backend::{BackendKind, BoxEngine, FontBackend};
use crate::cache::{EngineCache, EngineCacheKey, EngineDataHandle, EngineDataKey, EngineHandle};
use crate::config::ResolverConfig;
use crate::db::{compare_names, FontDatabase, FontDescription, FontSource, SharedDatabase};
use crate::error::FontError;
use crate::matcher::{match_family, Blacklist, FontDesc};
use crate::sweep::SweepReport;
use crate::{
    expand_font_families, parse_font_name, FontRequest, Pitch, Script, Slant, StyleKey,
    StyleStrategy, TraceMsg, WritingSystem, WritingSystems,
};

/// Upper bound for one sleep of the background sweeper, so it notices a
/// dropped resolver in time.
const SWEEPER_TICK: Duration = Duration::from_secs(1);

/// An owned snapshot of a match, handed to the engine factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFont {
    pub family: String,
    pub foundry: String,
    pub style_name: String,
    pub style: StyleKey,
    /// Pixel size the engine is created at
    pub pixel_size: u16,
    pub smooth_scalable: bool,
    /// A fixed-size face scaled to `pixel_size`
    pub bitmap_scaled: bool,
    pub fixed_pitch: bool,
    pub writing_systems: WritingSystems,
    pub source: FontSource,
    pub score: u32,
    pub script: Script,
    pub screen: u32,
    dpi: f32,
}

impl ResolvedFont {
    fn from_desc(desc: &FontDesc<'_>, script: Script, screen: u32, dpi: f32) -> Self {
        ResolvedFont {
            family: desc.family.name.clone(),
            foundry: desc.foundry.name.clone(),
            style_name: desc.style.display_name(),
            style: desc.style.key,
            pixel_size: desc.pixel_size,
            smooth_scalable: desc.style.smooth_scalable,
            bitmap_scaled: desc.is_bitmap_scaled(),
            fixed_pitch: desc.family.fixed_pitch,
            writing_systems: desc.family.writing_systems,
            source: desc.size.source.clone(),
            score: desc.score,
            script,
            screen,
            dpi,
        }
    }

    /// `"Family [Foundry]"` if a foundry is known, otherwise the family.
    pub fn display_name(&self) -> String {
        if self.foundry.is_empty() {
            self.family.clone()
        } else {
            format!("{} [{}]", self.family, self.foundry)
        }
    }

    pub fn cache_key(&self) -> EngineCacheKey {
        EngineCacheKey {
            family: self.display_name(),
            pixel_size: self.pixel_size,
            weight: self.style.weight,
            slant: self.style.slant,
            stretch: self.style.stretch,
            script: self.script,
            screen: self.screen,
        }
    }

    /// Whether the family covers symbols and nothing else. Families
    /// registered without writing-system information claim every system and
    /// are not symbol fonts.
    pub fn is_symbol(&self) -> bool {
        self.writing_systems.contains(WritingSystem::Symbol)
            && self.writing_systems.iter().count() == 1
    }

    /// Whether this font satisfies `request` without substitution: same
    /// (first) family, style, pixel size and pitch.
    pub fn exact_match(&self, request: &FontRequest) -> bool {
        let family_matches = match request.families.first() {
            None => true,
            Some(first) => {
                let (family, _) = parse_font_name(first);
                compare_names(&family, &self.family).is_eq()
            }
        };
        let pitch_matches = match request.pitch {
            Pitch::Any => true,
            Pitch::Fixed => self.fixed_pitch,
            Pitch::Proportional => !self.fixed_pitch,
        };
        family_matches
            && pitch_matches
            && request.style.matches(&self.style)
            && request.size.to_pixels(self.dpi) == self.pixel_size
    }
}

struct ResolverState {
    cache: EngineCache,
    // database generation the cache was filled against
    generation: u64,
}

pub struct FontResolver {
    backend: Box<dyn FontBackend>,
    db: SharedDatabase,
    config: ResolverConfig,
    screen: u32,
    // locked before `db`
    state: Mutex<ResolverState>,
}

impl std::fmt::Debug for FontResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResolver")
            .field("backend", &self.backend.kind())
            .field("config", &self.config)
            .field("screen", &self.screen)
            .finish()
    }
}

impl FontResolver {
    pub fn new(backend: Box<dyn FontBackend>) -> Self {
        FontResolver::with_config(backend, ResolverConfig::default())
    }

    pub fn with_config(backend: Box<dyn FontBackend>, config: ResolverConfig) -> Self {
        FontResolver::with_shared_database(backend, FontDatabase::shared(), config)
    }

    /// A resolver with its own engine cache on a database shared with other
    /// resolvers.
    pub fn with_shared_database(
        backend: Box<dyn FontBackend>,
        db: SharedDatabase,
        config: ResolverConfig,
    ) -> Self {
        let generation = lock(&db).generation();
        FontResolver {
            backend,
            state: Mutex::new(ResolverState {
                cache: EngineCache::new(config.cache.clone()),
                generation,
            }),
            db,
            config,
            screen: 0,
        }
    }

    /// Target screen / surface id, part of every cache key.
    pub fn with_screen(mut self, screen: u32) -> Self {
        self.screen = screen;
        self
    }

    /// The process-wide default resolver.
    pub fn global() -> &'static FontResolver {
        static GLOBAL: OnceLock<FontResolver> = OnceLock::new();
        GLOBAL.get_or_init(|| FontResolver::new(default_backend()))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn database(&self) -> SharedDatabase {
        self.db.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ResolverState> {
        lock(&self.state)
    }

    /// Populates the database if needed and drops cache contents built
    /// against an older database generation.
    fn prepare(&self, state: &mut ResolverState, db: &mut FontDatabase, script: Script) {
        if !db.is_populated() {
            if let Err(e) = self.backend.populate(db, script) {
                log::warn!("font backend {:?} failed to populate: {}", self.backend.kind(), e);
            }
            db.register_application_fonts();
            db.mark_populated();
            log::debug!(
                "font database populated with {} families (generation {})",
                db.len(),
                db.generation()
            );
        }

        if state.generation != db.generation() {
            log::debug!(
                "font database changed (generation {} -> {}), clearing engine cache",
                state.generation,
                db.generation()
            );
            state.cache.clear();
            state.generation = db.generation();
        }
    }

    /// Ordered (family, foundry) pairs to try for `request`. The empty
    /// family means "any family supporting the script".
    fn family_list(&self, request: &FontRequest) -> Vec<(String, String)> {
        let mut list: Vec<(String, String)> = Vec::new();
        let push = |list: &mut Vec<(String, String)>, family: String, foundry: String| {
            if !list
                .iter()
                .any(|(f, fo)| compare_names(f, &family).is_eq() && compare_names(fo, &foundry).is_eq())
            {
                list.push((family, foundry));
            }
        };

        let requested = expand_font_families(&request.families, self.config.os);
        for name in &requested {
            let (family, foundry) = parse_font_name(name);
            let foundry = foundry
                .or_else(|| request.foundry.clone())
                .unwrap_or_default();
            if !family.is_empty() {
                push(&mut list, family, foundry);
            }
        }

        if let Some(first) = list.first().map(|(f, _)| f.clone()) {
            if let Some(default) = self.config.matching.default_family.clone() {
                push(&mut list, default, String::new());
            }
            for fallback in self.backend.fallback_families(
                &first,
                request.style_hint,
                request.script,
                self.config.os,
            ) {
                push(&mut list, fallback, String::new());
            }
        }

        push(&mut list, String::new(), String::new());

        if let Some(last_resort) = self.config.last_resort_family() {
            push(&mut list, last_resort, String::new());
        }

        list
    }

    fn resolve_locked(
        &self,
        db: &mut FontDatabase,
        request: &FontRequest,
        trace: &mut Vec<TraceMsg>,
    ) -> Option<ResolvedFont> {
        let blacklist = Blacklist::new();
        for (family, foundry) in self.family_list(request) {
            if !family.is_empty() {
                self.load_family(db, &family, request.script);
            }
            let desc = match_family(
                db,
                request,
                &family,
                &foundry,
                &blacklist,
                &self.config.matching,
                trace,
            );
            if let Some(desc) = desc {
                return Some(ResolvedFont::from_desc(
                    &desc,
                    request.script,
                    self.screen,
                    self.config.matching.dpi,
                ));
            }
        }
        None
    }

    fn load_family(&self, db: &mut FontDatabase, family: &str, script: Script) {
        if let Err(e) = self.backend.load_family(db, family, script) {
            log::warn!("font backend failed to load family '{}': {}", family, e);
        }
    }

    /// Finds the closest installed font for `request`, without creating an
    /// engine. `None` only if nothing supports the requested script.
    pub fn resolve(&self, request: &FontRequest) -> Option<ResolvedFont> {
        let mut trace = Vec::new();
        self.resolve_with_trace(request, &mut trace)
    }

    pub fn resolve_with_trace(
        &self,
        request: &FontRequest,
        trace: &mut Vec<TraceMsg>,
    ) -> Option<ResolvedFont> {
        let mut state = self.lock_state();
        let mut db = lock(&self.db);
        self.prepare(&mut state, &mut db, request.script);
        self.resolve_locked(&mut db, request, trace)
    }

    /// Returns the cached engine for `font`, building it on a miss. Every
    /// call adds a key entry, so the engine's cache-count grows by one while
    /// its cost is charged only once. `None` if the backend cannot build it.
    pub fn acquire_engine(&self, font: &ResolvedFont) -> Option<EngineHandle> {
        let mut state = self.lock_state();
        {
            let mut db = lock(&self.db);
            self.prepare(&mut state, &mut db, font.script);
        }
        self.acquire_locked(&mut state.cache, font)
    }

    fn acquire_locked(&self, cache: &mut EngineCache, font: &ResolvedFont) -> Option<EngineHandle> {
        let key = font.cache_key();

        if let Some(handle) = cache.find_engine(&key) {
            cache.insert_engine_alias(key, handle.id());
            return Some(handle);
        }

        match self.backend.create_engine(font) {
            Some(engine) => Some(cache.insert_engine(key, engine)),
            None => {
                log::warn!(
                    "font backend could not create an engine for '{}' {}px",
                    font.display_name(),
                    font.pixel_size
                );
                None
            }
        }
    }

    fn box_engine(&self, cache: &mut EngineCache, pixel_size: u16, script: Script) -> EngineHandle {
        let key = EngineCacheKey {
            family: String::new(),
            pixel_size,
            weight: 0,
            slant: Slant::Normal,
            stretch: 0,
            script,
            screen: self.screen,
        };
        match cache.find_engine(&key) {
            Some(handle) => handle,
            None => cache.insert_engine(key, Arc::new(BoxEngine::new(pixel_size))),
        }
    }

    fn data_key(&self, request: &FontRequest) -> EngineDataKey {
        EngineDataKey {
            families: request
                .families
                .iter()
                .map(|f| f.trim().to_lowercase())
                .collect::<Vec<_>>()
                .join(","),
            foundry: request.foundry.as_deref().map(|f| f.trim().to_lowercase()),
            style_name: request.style_name.clone(),
            pixel_size: request.size.to_pixels(self.config.matching.dpi),
            style: request.style,
            style_strategy: request.style_strategy,
            style_hint: request.style_hint,
            pitch: request.pitch,
            screen: self.screen,
        }
    }

    /// Returns the engine-data bundle for `request`, creating an empty one on
    /// a miss. Holding the handle keeps the bundle (and the engines in its
    /// slots) alive across sweeps.
    pub fn engine_data(&self, request: &FontRequest) -> EngineDataHandle {
        let mut state = self.lock_state();
        let mut db = lock(&self.db);
        self.prepare(&mut state, &mut db, request.script);
        self.engine_data_locked(&mut state.cache, request)
    }

    fn engine_data_locked(&self, cache: &mut EngineCache, request: &FontRequest) -> EngineDataHandle {
        let key = self.data_key(request);
        match cache.find_engine_data(&key) {
            Some(data) => data,
            None => cache.insert_engine_data(key),
        }
    }

    /// Returns an engine for `request` in its script. Never fails: if nothing
    /// can be loaded, the engine draws boxes.
    pub fn load(&self, request: &FontRequest) -> EngineHandle {
        let mut trace = Vec::new();
        self.load_with_trace(request, &mut trace)
    }

    pub fn load_with_trace(&self, request: &FontRequest, trace: &mut Vec<TraceMsg>) -> EngineHandle {
        let mut state = self.lock_state();
        let mut db = lock(&self.db);
        self.prepare(&mut state, &mut db, request.script);
        let data = self.engine_data_locked(&mut state.cache, request);
        self.load_into_locked(&mut state.cache, &mut db, &data, request, trace)
    }

    /// Fills the slot of `request.script` in `data` (every empty slot for
    /// symbol fonts and `NO_FONT_MERGING`) and returns its engine.
    pub fn load_into(&self, data: &EngineDataHandle, request: &FontRequest) -> EngineHandle {
        let mut state = self.lock_state();
        let mut db = lock(&self.db);
        self.prepare(&mut state, &mut db, request.script);
        let mut trace = Vec::new();
        self.load_into_locked(&mut state.cache, &mut db, data, request, &mut trace)
    }

    fn load_into_locked(
        &self,
        cache: &mut EngineCache,
        db: &mut FontDatabase,
        data: &EngineDataHandle,
        request: &FontRequest,
        trace: &mut Vec<TraceMsg>,
    ) -> EngineHandle {
        if let Some(engine) = data.engine(request.script) {
            return engine;
        }

        let engine = self.find_engine(cache, db, request, trace);

        if engine.engine().is_symbol()
            || request.style_strategy.contains(StyleStrategy::NO_FONT_MERGING)
        {
            data.fill_empty(&engine);
        } else {
            data.set_engine(request.script, &engine);
        }
        engine
    }

    fn find_engine(
        &self,
        cache: &mut EngineCache,
        db: &mut FontDatabase,
        request: &FontRequest,
        trace: &mut Vec<TraceMsg>,
    ) -> EngineHandle {
        let mut blacklist = Blacklist::new();

        for (family, foundry) in self.family_list(request) {
            if !family.is_empty() {
                self.load_family(db, &family, request.script);
            }

            loop {
                let font = match match_family(
                    db,
                    request,
                    &family,
                    &foundry,
                    &blacklist,
                    &self.config.matching,
                    trace,
                ) {
                    Some(desc) => ResolvedFont::from_desc(
                        &desc,
                        request.script,
                        self.screen,
                        self.config.matching.dpi,
                    ),
                    None => break,
                };

                match self.acquire_locked(cache, &font) {
                    Some(engine) => return engine,
                    None => {
                        blacklist.insert(&font.family);
                    }
                }
            }
        }

        let pixel_size = request.size.to_pixels(self.config.matching.dpi);
        log::debug!("no font found for {:?}, returning box engine", request.families);
        self.box_engine(cache, pixel_size, request.script)
    }

    /// Drops the registry and every unreferenced cache entry. The next lookup
    /// repopulates from the backend.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        let mut db = lock(&self.db);
        db.invalidate_all();
        state.cache.clear();
        state.generation = db.generation();
    }

    /// Registers fonts owned by the application. Returns an id for
    /// [`FontResolver::remove_application_font`].
    pub fn register_application_font(&self, fonts: Vec<FontDescription>) -> usize {
        let id = lock(&self.db).add_application_font(fonts);
        self.invalidate();
        id
    }

    /// Registers every face of a font file as an application font.
    #[cfg(feature = "parsing")]
    pub fn register_application_font_file(
        &self,
        path: &std::path::Path,
    ) -> Result<usize, FontError> {
        let fonts = crate::scan::parse_font_file(path)?;
        Ok(self.register_application_font(fonts))
    }

    /// Registers every face of an in-memory font file as an application font.
    #[cfg(feature = "parsing")]
    pub fn register_application_font_data(&self, bytes: Vec<u8>) -> Result<usize, FontError> {
        let fonts = crate::scan::parse_font_data(Arc::new(bytes))?;
        Ok(self.register_application_font(fonts))
    }

    pub fn remove_application_font(&self, id: usize) -> Result<(), FontError> {
        lock(&self.db).remove_application_font(id)?;
        self.invalidate();
        Ok(())
    }

    /// Returns false if there were none.
    pub fn remove_all_application_fonts(&self) -> bool {
        let removed = lock(&self.db).remove_all_application_fonts();
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Runs `f` on the populated database.
    pub fn with_database<R>(&self, f: impl FnOnce(&FontDatabase) -> R) -> R {
        let mut state = self.lock_state();
        let mut db = lock(&self.db);
        self.prepare(&mut state, &mut db, Script::Common);
        f(&db)
    }

    pub fn families(&self, writing_system: Option<WritingSystem>) -> Vec<String> {
        self.with_database(|db| db.family_names(writing_system))
    }

    pub fn styles(&self, family: &str) -> Vec<String> {
        self.with_database(|db| db.styles(family))
    }

    /// Runs `f` on the engine cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&EngineCache) -> R) -> R {
        f(&self.lock_state().cache)
    }

    /// Runs a sweep if one is due at `now`.
    pub fn poll_sweep(&self, now: Instant) -> Option<SweepReport> {
        self.lock_state().cache.poll_sweep(now)
    }

    /// Runs a sweep immediately.
    pub fn sweep(&self) -> SweepReport {
        self.lock_state().cache.sweep()
    }

    /// Starts a thread that polls the sweep timer until the resolver is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let weak: Weak<FontResolver> = Arc::downgrade(self);
        thread::Builder::new()
            .name("font-cache-sweeper".to_string())
            .spawn(move || loop {
                let resolver = match weak.upgrade() {
                    Some(r) => r,
                    None => break,
                };
                let now = Instant::now();
                if let Some(report) = resolver.poll_sweep(now) {
                    log::debug!("font cache sweep: {:?}", report);
                }
                let wait = resolver
                    .with_cache(|c| c.next_sweep_due())
                    .map(|due| due.saturating_duration_since(now))
                    .unwrap_or(SWEEPER_TICK)
                    .clamp(Duration::from_millis(10), SWEEPER_TICK);
                drop(resolver);
                thread::sleep(wait);
            })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(feature = "parsing")]
fn default_backend() -> Box<dyn FontBackend> {
    Box::new(crate::scan::DirectoryBackend::system())
}

#[cfg(not(feature = "parsing"))]
fn default_backend() -> Box<dyn FontBackend> {
    Box::new(crate::backend::MemoryBackend::new())
}
