//! Font request resolution and rendering-engine caching
//!
//! Takes an abstract, possibly under-specified font request (family list,
//! weight, slant, stretch, size, script and strategy flags), finds the closest
//! installed font in a registry of families / foundries / styles / sizes, and
//! caches the (expensive, platform-specific) engine objects created for the
//! result under a cost budget.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rust_fontresolve::backend::MemoryBackend;
//! use rust_fontresolve::db::FontDescription;
//! use rust_fontresolve::resolver::FontResolver;
//! use rust_fontresolve::{weight, FontRequest, FontSize, Script, Slant, StyleKey};
//!
//! let backend = MemoryBackend::new();
//! backend.add_font(FontDescription::scalable(
//!     "Helvetica",
//!     StyleKey::new(Slant::Italic, weight::BOLD, 100),
//! ));
//!
//! let resolver = FontResolver::new(Box::new(backend));
//! let request = FontRequest {
//!     families: vec!["Helvetica".to_string(), "Arial".to_string()],
//!     style: StyleKey::new(Slant::Italic, weight::BOLD, 0),
//!     size: FontSize::Pixel(12),
//!     script: Script::Latin,
//!     ..Default::default()
//! };
//!
//! let engine = resolver.load(&request);
//! println!("resolved engine: {:?}", engine.engine().kind());
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

pub mod backend;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod matcher;
pub mod resolver;
#[cfg(feature = "parsing")]
pub mod scan;
#[cfg(feature = "cache")]
pub mod snapshot;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use backend::{BackendKind, BoxEngine, EngineKind, FontBackend, FontEngine, MemoryBackend};
pub use cache::{EngineCache, EngineCacheKey, EngineDataHandle, EngineHandle, EngineId};
pub use config::{CacheConfig, MatchConfig, ResolverConfig};
pub use db::{FontDatabase, FontDescription, FontSource, SharedDatabase, SMOOTH_SCALABLE};
pub use error::FontError;
pub use matcher::{Blacklist, FontDesc};
pub use resolver::{FontResolver, ResolvedFont};
pub use sweep::{SweepPeriod, SweepReport};

/// Font weights on the 0..=99 scale used throughout the crate.
pub mod weight {
    pub const THIN: u8 = 0;
    pub const EXTRA_LIGHT: u8 = 12;
    pub const LIGHT: u8 = 25;
    pub const NORMAL: u8 = 50;
    pub const MEDIUM: u8 = 57;
    pub const DEMI_BOLD: u8 = 63;
    pub const BOLD: u8 = 75;
    pub const EXTRA_BOLD: u8 = 81;
    pub const BLACK: u8 = 87;
    pub const MAX: u8 = 99;

    /// Converts an OpenType `usWeightClass` (100..=900) into one of the
    /// coarse weights above.
    pub fn from_opentype(weight_class: u16) -> u8 {
        match weight_class {
            0..=399 => LIGHT,
            400..=599 => NORMAL,
            600..=699 => DEMI_BOLD,
            700..=799 => BOLD,
            _ => BLACK,
        }
    }
}

/// Converts an OpenType `usWidthClass` (1..=9) into a stretch percentage.
pub fn stretch_from_width_class(width_class: u16) -> u16 {
    match width_class {
        1 => 50,
        2 => 62,
        3 => 75,
        4 => 87,
        6 => 112,
        7 => 125,
        8 => 150,
        9 => 200,
        _ => 100,
    }
}

#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub enum Slant {
    #[default]
    Normal,
    Italic,
    Oblique,
}

/// Distance added when one slant is upright and the other is not.
pub const SLANT_MISMATCH_DISTANCE: u32 = 0x1000;
/// Distance added for italic vs. oblique.
pub const SLANT_VARIANT_DISTANCE: u32 = 0x0001;

/// The (slant, weight, stretch) triple identifying a variant within a family.
///
/// A stretch of `0` means "unspecified" and matches any stretch.
#[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleKey {
    pub slant: Slant,
    pub weight: u8,
    pub stretch: u16,
}

impl Default for StyleKey {
    fn default() -> Self {
        StyleKey {
            slant: Slant::Normal,
            weight: weight::NORMAL,
            stretch: 0,
        }
    }
}

impl StyleKey {
    pub const fn new(slant: Slant, weight: u8, stretch: u16) -> Self {
        StyleKey {
            slant,
            weight,
            stretch,
        }
    }

    /// Equality with the unspecified-stretch wildcard applied.
    pub fn matches(&self, other: &StyleKey) -> bool {
        self.slant == other.slant
            && self.weight == other.weight
            && (self.stretch == 0 || other.stretch == 0 || self.stretch == other.stretch)
    }

    /// Distance between two style keys, `0` if they match exactly.
    pub fn distance(&self, other: &StyleKey) -> u32 {
        let mut d = (self.weight as i32 - other.weight as i32).unsigned_abs();

        if self.stretch != 0 && other.stretch != 0 {
            d += (self.stretch as i32 - other.stretch as i32).unsigned_abs();
        }

        if self.slant != other.slant {
            if self.slant != Slant::Normal && other.slant != Slant::Normal {
                d += SLANT_VARIANT_DISTANCE;
            } else {
                d += SLANT_MISMATCH_DISTANCE;
            }
        }

        d
    }

    /// Infers a style key from a human style name such as `"Demi Bold Italic"`.
    pub fn from_style_name(style_name: &str) -> Self {
        let s = style_name.to_lowercase();

        let slant = if s.contains("italic") {
            Slant::Italic
        } else if s.contains("oblique") {
            Slant::Oblique
        } else {
            Slant::Normal
        };

        StyleKey {
            slant,
            weight: weight_from_style_name(&s),
            stretch: 0,
        }
    }
}

fn weight_from_style_name(s: &str) -> u8 {
    // Test in decreasing order of commonness
    match s.trim() {
        "medium" | "normal" | "regular" | "italic" | "oblique" | "" => return weight::NORMAL,
        "bold" => return weight::BOLD,
        "demibold" | "demi bold" | "semibold" | "semi bold" => return weight::DEMI_BOLD,
        "black" => return weight::BLACK,
        "light" => return weight::LIGHT,
        _ => {}
    }

    if s.contains("bold") {
        if s.contains("demi") || s.contains("semi") {
            return weight::DEMI_BOLD;
        }
        if s.contains("extra") || s.contains("ultra") {
            return weight::EXTRA_BOLD;
        }
        return weight::BOLD;
    }

    if s.contains("light") {
        return weight::LIGHT;
    }

    if s.contains("black") || s.contains("heavy") {
        return weight::BLACK;
    }

    weight::NORMAL
}

/// Requested size, pixel and point sizes are mutually exclusive.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum FontSize {
    Pixel(u16),
    Point(f32),
}

impl Default for FontSize {
    fn default() -> Self {
        FontSize::Point(12.0)
    }
}

impl FontSize {
    /// Normalized pixel size, never below 1.
    pub fn to_pixels(&self, dpi: f32) -> u16 {
        let px = match *self {
            FontSize::Pixel(px) => px,
            FontSize::Point(pt) => {
                let px = (pt * dpi / 72.0 * 100.0).round() / 100.0;
                px.round() as u16
            }
        };
        px.max(1)
    }
}

/// Style strategy flags, values compatible with the classic toolkit flags.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleStrategy(pub u16);

impl StyleStrategy {
    pub const PREFER_DEFAULT: StyleStrategy = StyleStrategy(0x0001);
    pub const PREFER_BITMAP: StyleStrategy = StyleStrategy(0x0002);
    pub const PREFER_DEVICE: StyleStrategy = StyleStrategy(0x0004);
    pub const PREFER_OUTLINE: StyleStrategy = StyleStrategy(0x0008);
    pub const FORCE_OUTLINE: StyleStrategy = StyleStrategy(0x0010);
    pub const PREFER_MATCH: StyleStrategy = StyleStrategy(0x0020);
    pub const PREFER_QUALITY: StyleStrategy = StyleStrategy(0x0040);
    pub const PREFER_ANTIALIAS: StyleStrategy = StyleStrategy(0x0080);
    pub const NO_ANTIALIAS: StyleStrategy = StyleStrategy(0x0100);
    pub const NO_FONT_MERGING: StyleStrategy = StyleStrategy(0x8000);

    pub const fn empty() -> Self {
        StyleStrategy(0)
    }

    pub const fn contains(&self, other: StyleStrategy) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for StyleStrategy {
    type Output = StyleStrategy;
    fn bitor(self, rhs: StyleStrategy) -> StyleStrategy {
        StyleStrategy(self.0 | rhs.0)
    }
}

impl BitOrAssign for StyleStrategy {
    fn bitor_assign(&mut self, rhs: StyleStrategy) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub enum StyleHint {
    #[default]
    AnyStyle,
    SansSerif,
    Serif,
    TypeWriter,
    Decorative,
    Monospace,
    Fantasy,
    Cursive,
    System,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub enum Pitch {
    #[default]
    Any,
    Fixed,
    Proportional,
}

macro_rules! indexed_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const COUNT: usize = $name::ALL.len();

            pub fn index(self) -> usize {
                self as usize
            }

            pub fn from_index(index: usize) -> Option<Self> {
                $name::ALL.get(index).copied()
            }
        }
    };
}

indexed_enum! {
    /// Unicode script a piece of text is rendered in. `Common` matches every family.
    #[derive(Default)]
    Script {
        #[default]
        Common,
        Latin,
        Greek,
        Cyrillic,
        Armenian,
        Hebrew,
        Arabic,
        Syriac,
        Thaana,
        Devanagari,
        Bengali,
        Gurmukhi,
        Gujarati,
        Oriya,
        Tamil,
        Telugu,
        Kannada,
        Malayalam,
        Sinhala,
        Thai,
        Lao,
        Tibetan,
        Myanmar,
        Georgian,
        Hangul,
        Ogham,
        Runic,
        Khmer,
        Nko,
        Han,
    }
}

indexed_enum! {
    /// Writing systems a family can declare support for.
    WritingSystem {
        Any,
        Latin,
        Greek,
        Cyrillic,
        Armenian,
        Hebrew,
        Arabic,
        Syriac,
        Thaana,
        Devanagari,
        Bengali,
        Gurmukhi,
        Gujarati,
        Oriya,
        Tamil,
        Telugu,
        Kannada,
        Malayalam,
        Sinhala,
        Thai,
        Lao,
        Tibetan,
        Myanmar,
        Georgian,
        Khmer,
        SimplifiedChinese,
        TraditionalChinese,
        Japanese,
        Korean,
        Vietnamese,
        Symbol,
        Ogham,
        Runic,
        Nko,
    }
}

impl WritingSystem {
    /// The script text in this writing system is itemized as.
    pub fn script(self) -> Script {
        use WritingSystem::*;
        match self {
            Any | Symbol => Script::Common,
            Latin | Vietnamese => Script::Latin,
            Greek => Script::Greek,
            Cyrillic => Script::Cyrillic,
            Armenian => Script::Armenian,
            Hebrew => Script::Hebrew,
            Arabic => Script::Arabic,
            Syriac => Script::Syriac,
            Thaana => Script::Thaana,
            Devanagari => Script::Devanagari,
            Bengali => Script::Bengali,
            Gurmukhi => Script::Gurmukhi,
            Gujarati => Script::Gujarati,
            Oriya => Script::Oriya,
            Tamil => Script::Tamil,
            Telugu => Script::Telugu,
            Kannada => Script::Kannada,
            Malayalam => Script::Malayalam,
            Sinhala => Script::Sinhala,
            Thai => Script::Thai,
            Lao => Script::Lao,
            Tibetan => Script::Tibetan,
            Myanmar => Script::Myanmar,
            Georgian => Script::Georgian,
            Khmer => Script::Khmer,
            SimplifiedChinese | TraditionalChinese | Japanese => Script::Han,
            Korean => Script::Hangul,
            Ogham => Script::Ogham,
            Runic => Script::Runic,
            Nko => Script::Nko,
        }
    }

    /// OS/2 `ulUnicodeRange` bits a face must set to support this writing
    /// system. `126` means "decided by code page bits instead", `127` means
    /// "no second bit required".
    fn required_unicode_bits(self) -> (u32, u32) {
        use WritingSystem::*;
        match self {
            Any => (127, 127),
            Latin | Vietnamese => (0, 127),
            Greek => (7, 127),
            Cyrillic => (9, 127),
            Armenian => (10, 127),
            Hebrew => (11, 127),
            Arabic => (13, 127),
            Syriac => (71, 127),
            Thaana => (72, 127),
            Devanagari => (15, 127),
            Bengali => (16, 127),
            Gurmukhi => (17, 127),
            Gujarati => (18, 127),
            Oriya => (19, 127),
            Tamil => (20, 127),
            Telugu => (21, 127),
            Kannada => (22, 127),
            Malayalam => (23, 127),
            Sinhala => (73, 127),
            Thai => (24, 127),
            Lao => (25, 127),
            Tibetan => (70, 127),
            Myanmar => (74, 127),
            Georgian => (26, 127),
            Khmer => (80, 127),
            SimplifiedChinese | TraditionalChinese | Japanese | Symbol => (126, 127),
            Korean => (56, 127),
            Ogham => (78, 127),
            Runic => (79, 127),
            Nko => (14, 127),
        }
    }
}

/// Set of supported writing systems.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct WritingSystems(u64);

const SIMPLIFIED_CHINESE_CSB_BIT: u32 = 18;
const TRADITIONAL_CHINESE_CSB_BIT: u32 = 20;
const JAPANESE_CSB_BIT: u32 = 17;
const KOREAN_CSB_BIT: u32 = 21;

impl WritingSystems {
    pub const fn empty() -> Self {
        WritingSystems(0)
    }

    /// Every writing system except `Any`.
    pub fn all() -> Self {
        WritingSystem::ALL[1..].iter().copied().collect()
    }

    pub fn insert(&mut self, ws: WritingSystem) {
        self.0 |= 1u64 << ws.index();
    }

    pub fn with(mut self, ws: WritingSystem) -> Self {
        self.insert(ws);
        self
    }

    pub fn contains(&self, ws: WritingSystem) -> bool {
        self.0 & (1u64 << ws.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = WritingSystem> + '_ {
        WritingSystem::ALL
            .iter()
            .copied()
            .filter(move |ws| self.contains(*ws))
    }

    /// Whether any contained writing system is itemized as `script`.
    /// `Script::Common` is supported by every family.
    pub fn supports_script(&self, script: Script) -> bool {
        if script == Script::Common {
            return true;
        }
        WritingSystem::ALL[1..]
            .iter()
            .any(|ws| ws.script() == script && self.contains(*ws))
    }

    /// Classifies a face from its OS/2 `ulUnicodeRange1..4` and
    /// `ulCodePageRange1..2` fields. Faces with no recognised bit are `Symbol`.
    pub fn from_os2_bits(unicode_range: [u32; 4], code_page_range: [u32; 2]) -> Self {
        let mut result = WritingSystems::empty();
        let bit_set = |bit: u32| unicode_range[(bit / 32) as usize] & (1u32 << (bit & 31)) != 0;

        for ws in WritingSystem::ALL.iter().copied() {
            let (first, second) = ws.required_unicode_bits();
            if first == 126 || first == 127 || !bit_set(first) {
                continue;
            }
            if second == 127 || bit_set(second) {
                result.insert(ws);
            }
        }

        let code_pages = [
            (SIMPLIFIED_CHINESE_CSB_BIT, WritingSystem::SimplifiedChinese),
            (TRADITIONAL_CHINESE_CSB_BIT, WritingSystem::TraditionalChinese),
            (JAPANESE_CSB_BIT, WritingSystem::Japanese),
            (KOREAN_CSB_BIT, WritingSystem::Korean),
        ];
        for (bit, ws) in code_pages {
            if code_page_range[0] & (1u32 << bit) != 0 {
                result.insert(ws);
            }
        }

        if result.is_empty() {
            result.insert(WritingSystem::Symbol);
        }
        result
    }
}

impl FromIterator<WritingSystem> for WritingSystems {
    fn from_iter<I: IntoIterator<Item = WritingSystem>>(iter: I) -> Self {
        let mut set = WritingSystems::empty();
        for ws in iter {
            set.insert(ws);
        }
        set
    }
}

/// An abstract, possibly under-specified font request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FontRequest {
    /// Ordered family names, first = preferred. An entry may carry a foundry
    /// in brackets: `"Arial [Monotype]"`.
    pub families: Vec<String>,
    pub foundry: Option<String>,
    /// Authoritative style name, if set an exact match wins over `style`.
    pub style_name: Option<String>,
    pub style: StyleKey,
    pub size: FontSize,
    pub script: Script,
    pub style_hint: StyleHint,
    pub style_strategy: StyleStrategy,
    pub pitch: Pitch,
}

impl FontRequest {
    /// Splits a comma-separated family string (`"'Helvetica', Arial"`) into
    /// an ordered family list, stripping matching quotes.
    pub fn parse_families(family: &str) -> Vec<String> {
        family
            .split(',')
            .map(|s| {
                let s = s.trim();
                let quoted = s.len() >= 2
                    && ((s.starts_with('"') && s.ends_with('"'))
                        || (s.starts_with('\'') && s.ends_with('\'')));
                if quoted {
                    s[1..s.len() - 1].to_string()
                } else {
                    s.to_string()
                }
            })
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Splits `"Arial [Monotype]"` into `("Arial", Some("Monotype"))`.
pub fn parse_font_name(name: &str) -> (String, Option<String>) {
    let name = name.trim();
    if let (Some(i), Some(li)) = (name.find('['), name.rfind(']')) {
        if i < li {
            let foundry = name[i + 1..li].trim().to_string();
            let family = name[..i].trim_end().to_string();
            let foundry = if foundry.is_empty() { None } else { Some(foundry) };
            return (family, foundry);
        }
    }
    (name.to_string(), None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Why a family or foundry was accepted or rejected during matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    FamilyNotFound {
        requested: String,
    },
    Blacklisted,
    ScriptUnsupported {
        script: Script,
    },
    FoundryMismatch {
        requested: String,
        found: String,
    },
    OutlineRequired,
    NoUsableSize {
        pixel_size: u16,
    },
    Candidate {
        foundry: String,
        score: u32,
        best: u32,
    },
    Success {
        score: u32,
    },
}

/// Trace message for debugging font matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceMsg {
    pub level: TraceLevel,
    /// Family the message is about (`"<any>"` for script-only searches)
    pub family: String,
    pub reason: MatchReason,
}

impl fmt::Display for TraceMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {:?}", self.level, self.family, self.reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingSystem {
    Windows,
    Linux,
    MacOS,
    Wasm,
}

impl Default for OperatingSystem {
    fn default() -> Self {
        OperatingSystem::current()
    }
}

impl OperatingSystem {
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return OperatingSystem::Windows;

        #[cfg(target_os = "linux")]
        return OperatingSystem::Linux;

        #[cfg(target_os = "macos")]
        return OperatingSystem::MacOS;

        #[cfg(target_family = "wasm")]
        return OperatingSystem::Wasm;

        #[cfg(not(any(
            target_os = "windows",
            target_os = "linux",
            target_os = "macos",
            target_family = "wasm"
        )))]
        return OperatingSystem::Linux;
    }

    pub fn get_serif_fonts(&self) -> Vec<String> {
        let fonts: &[&str] = match self {
            OperatingSystem::Windows => &["Times New Roman"],
            OperatingSystem::MacOS => &["Times", "New York", "Palatino"],
            OperatingSystem::Linux => &[
                "Times",
                "Times New Roman",
                "DejaVu Serif",
                "Free Serif",
                "Noto Serif",
                "Bitstream Vera Serif",
                "Roman",
                "Regular",
            ],
            OperatingSystem::Wasm => &[],
        };
        fonts.iter().map(|s| s.to_string()).collect()
    }

    pub fn get_sans_serif_fonts(&self) -> Vec<String> {
        let fonts: &[&str] = match self {
            OperatingSystem::Windows => &[
                "Segoe UI",
                "Tahoma",
                "Microsoft Sans Serif",
                "MS Sans Serif",
                "Helv",
            ],
            OperatingSystem::MacOS => &["San Francisco", "Helvetica Neue", "Lucida Grande"],
            OperatingSystem::Linux => &[
                "Ubuntu",
                "Arial",
                "DejaVu Sans",
                "Noto Sans",
                "Liberation Sans",
            ],
            OperatingSystem::Wasm => &[],
        };
        fonts.iter().map(|s| s.to_string()).collect()
    }

    pub fn get_monospace_fonts(&self) -> Vec<String> {
        let fonts: &[&str] = match self {
            OperatingSystem::Windows => &[
                "Segoe UI Mono",
                "Courier New",
                "Cascadia Code",
                "Cascadia Mono",
                "Consolas",
            ],
            OperatingSystem::MacOS => &[
                "SF Mono",
                "Menlo",
                "Monaco",
                "Courier",
                "Oxygen Mono",
                "Source Code Pro",
                "Fira Mono",
            ],
            OperatingSystem::Linux => &[
                "Source Code Pro",
                "Cantarell",
                "DejaVu Sans Mono",
                "Roboto Mono",
                "Ubuntu Monospace",
                "Droid Sans Mono",
            ],
            OperatingSystem::Wasm => &[],
        };
        fonts.iter().map(|s| s.to_string()).collect()
    }

    /// Families to try for a style hint once the requested families failed.
    pub fn fallback_families(&self, hint: StyleHint) -> Vec<String> {
        match hint {
            StyleHint::Serif => self.get_serif_fonts(),
            StyleHint::TypeWriter | StyleHint::Monospace => self.get_monospace_fonts(),
            StyleHint::AnyStyle => Vec::new(),
            _ => self.get_sans_serif_fonts(),
        }
    }

    /// The family used when every other candidate failed.
    pub fn last_resort_family(&self) -> Option<String> {
        self.get_sans_serif_fonts().into_iter().next()
    }
}

/// Replaces the generic CSS-style families (`serif`, `sans-serif`,
/// `monospace`) in `families` with concrete families for `os`.
pub fn expand_font_families(families: &[String], os: OperatingSystem) -> Vec<String> {
    let mut expanded = Vec::new();

    for family in families {
        match family.to_lowercase().as_str() {
            "serif" => expanded.extend(os.get_serif_fonts()),
            "sans-serif" | "system-ui" => expanded.extend(os.get_sans_serif_fonts()),
            "monospace" => expanded.extend(os.get_monospace_fonts()),
            _ => expanded.push(family.clone()),
        }
    }

    expanded
}
