//! Registry population from font files on disk.
//!
//! [`DirectoryBackend`] walks the system font directories (the `<dir>`
//! entries of `/etc/fonts/fonts.conf` on Linux, well-known locations
//! elsewhere), parses every font file and registers one [`FontDescription`]
//! per face. Engines memory-map the font file; their cost is the mapped size.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use allsorts::binary::read::ReadScope;
use allsorts::font_data::FontData;
use allsorts::get_name::fontcode_get_name;
use allsorts::tables::os2::Os2;
use allsorts::tables::{FontTableProvider, HeadTable, NameTable, OpenTypeData, OpenTypeFont};
use allsorts::tag;
use mmapio::{Mmap, MmapOptions};

use crate::backend::{BackendKind, EngineKind, FontBackend, FontEngine};
use crate::db::{FontDatabase, FontDescription, FontSource};
use crate::error::FontError;
use crate::resolver::ResolvedFont;
use crate::{stretch_from_width_class, weight, Script, Slant, StyleKey, WritingSystems};

const FONT_SPECIFIER_FAMILY_ID: u16 = 1;
const FONT_SPECIFIER_SUBFAMILY_ID: u16 = 2;

// PANOSE bProportion value for monospaced faces
const PANOSE_MONOSPACED: u8 = 9;

/// Backend over the font files in a list of directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryBackend {
    dirs: Vec<PathBuf>,
    #[cfg(feature = "cache")]
    snapshot: Option<PathBuf>,
}

impl DirectoryBackend {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        DirectoryBackend {
            dirs,
            #[cfg(feature = "cache")]
            snapshot: None,
        }
    }

    /// Backend over the system font directories. With the `cache` feature
    /// the registry is read from (and written to) the default snapshot.
    pub fn system() -> Self {
        let dirs = font_directories().unwrap_or_else(|e| {
            log::warn!("{}", e);
            Vec::new()
        });
        let backend = DirectoryBackend::new(dirs);
        #[cfg(feature = "cache")]
        let backend = backend.with_snapshot(crate::snapshot::default_snapshot_path());
        backend
    }

    #[cfg(feature = "cache")]
    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot = path;
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Parses every font file below the configured directories.
    pub fn scan(&self) -> Vec<FontDescription> {
        scan_directories(&self.dirs)
    }
}

impl FontBackend for DirectoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Directory
    }

    fn populate(&self, db: &mut FontDatabase, _script: Script) -> Result<(), FontError> {
        // the snapshot only stands in for the first scan; after an
        // invalidation the installed set may have changed
        #[cfg(feature = "cache")]
        {
            let first_population = db.generation() == 0;
            if let Some(path) = self.snapshot.as_ref().filter(|p| first_population && p.exists()) {
                match db.load_snapshot(path) {
                    Ok(()) => return Ok(()),
                    Err(e) => log::warn!("ignoring font registry snapshot {:?}: {}", path, e),
                }
            }
        }

        if self.dirs.is_empty() {
            return Err(FontError::NoFontDirectories);
        }

        let fonts = self.scan();
        log::debug!(
            "scanned {} faces in {} directories",
            fonts.len(),
            self.dirs.len()
        );
        for font in &fonts {
            db.add_font(font);
        }

        #[cfg(feature = "cache")]
        {
            if let Some(path) = self.snapshot.as_ref() {
                if let Err(e) = db.save_snapshot(path) {
                    log::warn!("could not write font registry snapshot {:?}: {}", path, e);
                }
            }
        }

        Ok(())
    }

    fn create_engine(&self, font: &ResolvedFont) -> Option<Arc<dyn FontEngine>> {
        let (bytes, font_index) = match &font.source {
            FontSource::File { path, font_index } => {
                let file = File::open(path).ok()?;
                let map = unsafe { MmapOptions::new().map(&file).ok()? };
                (FontBytes::Mapped(map), *font_index)
            }
            FontSource::Memory { bytes, font_index } => {
                (FontBytes::Memory(bytes.clone()), *font_index)
            }
            _ => return None,
        };

        // refuse files that stopped being fonts since the scan
        let scope = ReadScope::new(bytes.as_slice());
        let font_file = scope.read::<FontData<'_>>().ok()?;
        font_file.table_provider(font_index).ok()?;

        Some(Arc::new(MappedEngine {
            family: font.family.clone(),
            style: font.style,
            pixel_size: font.pixel_size,
            font_index,
            bytes,
        }))
    }
}

enum FontBytes {
    Mapped(Mmap),
    Memory(Arc<Vec<u8>>),
}

impl FontBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            FontBytes::Mapped(map) => &map[..],
            FontBytes::Memory(bytes) => &bytes[..],
        }
    }
}

/// Engine over the raw bytes of one face.
pub struct MappedEngine {
    pub family: String,
    pub style: StyleKey,
    pub pixel_size: u16,
    pub font_index: usize,
    bytes: FontBytes,
}

impl MappedEngine {
    pub fn font_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

impl fmt::Debug for MappedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedEngine")
            .field("family", &self.family)
            .field("style", &self.style)
            .field("pixel_size", &self.pixel_size)
            .field("font_index", &self.font_index)
            .field("len", &self.bytes.as_slice().len())
            .finish()
    }
}

impl FontEngine for MappedEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Mapped
    }

    fn cache_cost(&self) -> usize {
        self.bytes.as_slice().len()
    }

    fn family_name(&self) -> &str {
        &self.family
    }

    fn pixel_size(&self) -> u16 {
        self.pixel_size
    }
}

/// Directories to scan on this system.
pub fn font_directories() -> Result<Vec<PathBuf>, FontError> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "linux")]
    {
        let conf = Path::new("/etc/fonts/fonts.conf");
        if let Ok(xml) = std::fs::read_to_string(conf) {
            match parse_fonts_conf(&xml) {
                Some(entries) => {
                    for (prefix, dir) in entries {
                        dirs.push(resolve_conf_dir(prefix, dir));
                    }
                }
                None => log::warn!("could not parse {:?}", conf),
            }
        }
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(format!("{}/.fonts", home)));
            dirs.push(PathBuf::from(format!("{}/.local/share/fonts", home)));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(format!("{}/Library/Fonts", home)));
        }
    }

    #[cfg(target_os = "windows")]
    {
        let system_root = std::env::var("SystemRoot")
            .or_else(|_| std::env::var("WINDIR"))
            .unwrap_or_else(|_| "C:\\Windows".to_string());
        dirs.push(PathBuf::from(format!("{}\\Fonts", system_root)));
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            dirs.push(PathBuf::from(format!("{}\\Microsoft\\Windows\\Fonts", local)));
        }
    }

    dirs.sort();
    dirs.dedup();
    dirs.retain(|d| d.is_dir());

    if dirs.is_empty() {
        Err(FontError::NoFontDirectories)
    } else {
        Ok(dirs)
    }
}

#[cfg(target_os = "linux")]
fn resolve_conf_dir(prefix: Option<&str>, dir: &str) -> PathBuf {
    let expanded = match dir.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(rest),
            Err(_) => PathBuf::from(dir),
        },
        None => PathBuf::from(dir),
    };

    match prefix {
        Some("xdg") => {
            let base = std::env::var("XDG_DATA_HOME").map(PathBuf::from).or_else(|_| {
                std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
            });
            match base {
                Ok(base) => base.join(expanded),
                Err(_) => expanded,
            }
        }
        _ => expanded,
    }
}

/// Extracts the `<dir prefix="...">path</dir>` entries of a fonts.conf file.
/// Returns `None` on malformed XML or nested `<dir>` tags.
#[cfg(target_os = "linux")]
pub fn parse_fonts_conf(input: &str) -> Option<Vec<(Option<&str>, &str)>> {
    use xmlparser::Token::*;
    use xmlparser::Tokenizer;

    let mut font_paths = Vec::new();
    let mut current_prefix: Option<&str> = None;
    let mut current_dir: Option<&str> = None;
    let mut is_in_dir = false;

    for token in Tokenizer::from(input) {
        match token.ok()? {
            ElementStart { local, .. } => {
                if local.as_str() != "dir" {
                    continue;
                }
                if is_in_dir {
                    return None;
                }
                is_in_dir = true;
                current_dir = None;
            }
            Text { text, .. } => {
                let text = text.as_str().trim();
                if is_in_dir && !text.is_empty() {
                    current_dir = Some(text);
                }
            }
            Attribute { local, value, .. } => {
                if is_in_dir && local.as_str() == "prefix" {
                    current_prefix = Some(value.as_str());
                }
            }
            ElementEnd { end, .. } => {
                let end_tag = match end {
                    xmlparser::ElementEnd::Close(_, a) => a,
                    _ => continue,
                };
                if end_tag.as_str() != "dir" || !is_in_dir {
                    continue;
                }
                if let Some(d) = current_dir.take() {
                    font_paths.push((current_prefix.take(), d));
                }
                is_in_dir = false;
                current_prefix = None;
            }
            _ => {}
        }
    }

    Some(font_paths)
}

/// Parses every font file below `dirs`.
pub fn scan_directories(dirs: &[PathBuf]) -> Vec<FontDescription> {
    let files: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|d| collect_font_files(d.clone()))
        .collect();
    parse_font_files(&files)
}

fn collect_font_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut dirs_to_parse = vec![dir];

    while let Some(dir) = dirs_to_parse.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs_to_parse.push(path);
            } else if is_font_file(&path) {
                files.push(path);
            }
        }
    }

    files
}

fn is_font_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "ttf" | "otf" | "ttc"),
        None => false,
    }
}

#[cfg(feature = "multithreading")]
fn parse_font_files(files: &[PathBuf]) -> Vec<FontDescription> {
    use rayon::prelude::*;

    files
        .par_iter()
        .filter_map(|file| parse_logged(file))
        .collect::<Vec<Vec<_>>>()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(not(feature = "multithreading"))]
fn parse_font_files(files: &[PathBuf]) -> Vec<FontDescription> {
    files.iter().filter_map(|f| parse_logged(f)).flatten().collect()
}

fn parse_logged(file: &Path) -> Option<Vec<FontDescription>> {
    match parse_font_file(file) {
        Ok(fonts) => Some(fonts),
        Err(e) => {
            log::trace!("skipping {:?}: {}", file, e);
            None
        }
    }
}

/// Describes every face of the font file at `path`.
pub fn parse_font_file(path: &Path) -> Result<Vec<FontDescription>, FontError> {
    let file = File::open(path)?;
    let map = unsafe { MmapOptions::new().map(&file)? };
    parse_faces(&map[..], path, |font_index| FontSource::File {
        path: path.to_path_buf(),
        font_index,
    })
}

/// Describes every face of an in-memory font file.
pub fn parse_font_data(bytes: Arc<Vec<u8>>) -> Result<Vec<FontDescription>, FontError> {
    parse_faces(&bytes[..], Path::new("<memory>"), |font_index| {
        FontSource::Memory {
            bytes: bytes.clone(),
            font_index,
        }
    })
}

fn parse_error(path: &Path, reason: impl fmt::Display) -> FontError {
    FontError::Parse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn parse_faces(
    bytes: &[u8],
    path: &Path,
    source: impl Fn(usize) -> FontSource,
) -> Result<Vec<FontDescription>, FontError> {
    let scope = ReadScope::new(bytes);
    let font_file = scope
        .read::<FontData<'_>>()
        .map_err(|e| parse_error(path, format!("{:?}", e)))?;

    let mut fonts = Vec::new();
    for font_index in 0..face_count(&font_file) {
        match parse_face(&font_file, font_index) {
            Some(desc) => fonts.push(desc.with_source(source(font_index))),
            None => log::trace!("{:?}: face {} has no usable name table", path, font_index),
        }
    }

    if fonts.is_empty() {
        return Err(parse_error(path, "no usable faces"));
    }
    Ok(fonts)
}

fn face_count(font_file: &FontData<'_>) -> usize {
    match font_file {
        FontData::OpenType(OpenTypeFont {
            data: OpenTypeData::Collection(ttc),
            ..
        }) => ttc.offset_tables.len(),
        _ => 1,
    }
}

fn parse_face(font_file: &FontData<'_>, font_index: usize) -> Option<FontDescription> {
    let provider = font_file.table_provider(font_index).ok()?;

    let head_data = provider.table_data(tag::HEAD).ok()??.into_owned();
    let head_table = ReadScope::new(&head_data).read::<HeadTable>().ok()?;

    let name_data = provider.table_data(tag::NAME).ok()??.into_owned();
    // validates the table before the raw name lookups below
    ReadScope::new(&name_data).read::<NameTable>().ok()?;

    let family = fontcode_get_name(&name_data, FONT_SPECIFIER_FAMILY_ID).ok()??;
    let family = String::from_utf8_lossy(family.as_bytes()).trim().to_string();
    if family.is_empty() {
        return None;
    }
    let subfamily = fontcode_get_name(&name_data, FONT_SPECIFIER_SUBFAMILY_ID)
        .ok()
        .flatten()
        .map(|s| String::from_utf8_lossy(s.as_bytes()).trim().to_string())
        .unwrap_or_default();

    let mut style = StyleKey::from_style_name(&subfamily);
    if head_table.is_italic() && style.slant == Slant::Normal {
        style.slant = Slant::Italic;
    }
    if head_table.is_bold() && style.weight < weight::BOLD {
        style.weight = weight::BOLD;
    }

    let mut writing_systems = WritingSystems::empty();
    let mut fixed_pitch = false;

    if let Some(os2_data) = provider.table_data(tag::OS_2).ok().flatten() {
        let os2_data = os2_data.into_owned();
        if let Ok(os2) = ReadScope::new(&os2_data).read_dep::<Os2>(os2_data.len()) {
            style.weight = weight::from_opentype(os2.us_weight_class);
            style.stretch = stretch_from_width_class(os2.us_width_class);
            fixed_pitch = os2.panose[3] == PANOSE_MONOSPACED;
            writing_systems = WritingSystems::from_os2_bits(
                [
                    os2.ul_unicode_range1,
                    os2.ul_unicode_range2,
                    os2.ul_unicode_range3,
                    os2.ul_unicode_range4,
                ],
                [0, 0],
            );
        }
    }

    Some(
        FontDescription::scalable(&family, style)
            .with_style_name(&subfamily)
            .with_writing_systems(writing_systems)
            .with_fixed_pitch(fixed_pitch),
    )
}
