//! Scores registry entries against a request.
//!
//! Matching is a three level search: the best style inside a foundry
//! ([`best_style`]), the best (style, size) across the foundries of a family
//! ([`best_foundry`]) and the best family for a family name or, if the name is
//! empty, for the requested script alone ([`match_family`]). Lower scores are
//! better, `0` is an exact match.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::config::MatchConfig;
use crate::db::{
    compare_names, FamilyRecord, FontDatabase, FoundryRecord, SizeRecord, StyleRecord,
    SMOOTH_SCALABLE,
};
use crate::{
    FontRequest, MatchReason, Pitch, Script, StyleKey, StyleStrategy, TraceLevel, TraceMsg,
};

/// Score added when the family's pitch contradicts the requested pitch.
pub const PITCH_MISMATCH: u32 = 0x4000;
/// Score added when the chosen style key is not the requested one.
pub const STYLE_MISMATCH: u32 = 0x2000;
/// Score added when a fixed-size face has to be scaled to the requested size.
pub const BITMAP_SCALED_PENALTY: u32 = 0x1000;

/// Families whose engine could not be created, skipped on retry.
///
/// Entries are lowercased family names, so families registered lazily while
/// a request is being matched leave existing entries valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    families: BTreeSet<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Blacklist::default()
    }

    /// Returns `false` if the family was already blacklisted.
    pub fn insert(&mut self, family: &str) -> bool {
        self.families.insert(fold_name(family))
    }

    pub fn contains(&self, family: &str) -> bool {
        self.families.contains(&fold_name(family))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

// same folding as `compare_names`
fn fold_name(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

/// A matched (family, foundry, style, size) combination.
#[derive(Debug, Clone, Copy)]
pub struct FontDesc<'a> {
    pub family: &'a FamilyRecord,
    pub foundry: &'a FoundryRecord,
    pub style: &'a StyleRecord,
    pub size: &'a SizeRecord,
    /// Pixel size the engine should be created at
    pub pixel_size: u16,
    pub score: u32,
}

impl<'a> FontDesc<'a> {
    /// Whether the face is drawn from a fixed size that does not equal the
    /// resolved pixel size.
    pub fn is_bitmap_scaled(&self) -> bool {
        !self.style.smooth_scalable && self.size.pixel_size != self.pixel_size
    }
}

/// The parts of a request that matching looks at, normalized once.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery<'r> {
    pub style: StyleKey,
    pub style_name: &'r str,
    pub pixel_size: u16,
    pub strategy: StyleStrategy,
    pub pitch: Pitch,
    pub script: Script,
}

impl<'r> MatchQuery<'r> {
    pub fn new(request: &'r FontRequest, config: &MatchConfig) -> Self {
        MatchQuery {
            style: request.style,
            style_name: request.style_name.as_deref().unwrap_or(""),
            pixel_size: request.size.to_pixels(config.dpi),
            strategy: request.style_strategy,
            pitch: request.pitch,
            script: request.script,
        }
    }
}

/// Picks the style of `foundry` closest to `key`, with its distance.
///
/// A style whose name equals `style_name` wins outright with distance `0`.
/// Ties keep the earlier style.
pub fn best_style<'a>(
    foundry: &'a FoundryRecord,
    key: &StyleKey,
    style_name: &str,
) -> Option<(&'a StyleRecord, u32)> {
    let mut best: Option<(&StyleRecord, u32)> = None;

    for style in &foundry.styles {
        if !style_name.is_empty() && style.style_name == style_name {
            return Some((style, 0));
        }

        let d = key.distance(&style.key);
        match best {
            Some((_, dist)) if dist <= d => {}
            _ => best = Some((style, d)),
        }
    }

    if let Some((style, dist)) = best {
        log::trace!(
            "best style in foundry '{}': {:?} (distance {:#x})",
            foundry.name,
            style.key,
            dist
        );
    }
    best
}

/// Picks the size record of `style` to use for `query`, with the pixel size
/// the engine will be created at.
pub fn select_size<'a>(
    style: &'a StyleRecord,
    query: &MatchQuery<'_>,
    config: &MatchConfig,
) -> Option<(&'a SizeRecord, u16)> {
    let px = query.pixel_size;

    // 1. exact size
    if !query.strategy.contains(StyleStrategy::FORCE_OUTLINE) {
        if let Some(size) = style.pixel_size(px) {
            return Some((size, px));
        }
    }

    // 2. smoothly scalable
    if style.smooth_scalable && !query.strategy.contains(StyleStrategy::PREFER_BITMAP) {
        if let Some(size) = style.pixel_size(SMOOTH_SCALABLE) {
            return Some((size, px));
        }
    }

    // 3. bitmap scalable, only if the caller wants the exact size
    if style.bitmap_scalable && query.strategy.contains(StyleStrategy::PREFER_MATCH) {
        if let Some(size) = style.pixel_size(0) {
            return Some((size, px));
        }
    }

    // 4. closest fixed size, undershoot costs one extra pixel
    let mut closest: Option<(&SizeRecord, u32)> = None;
    for size in &style.sizes {
        if size.pixel_size == 0 || size.pixel_size == SMOOTH_SCALABLE {
            continue;
        }
        let d = if size.pixel_size < px {
            (px - size.pixel_size) as u32 + 1
        } else {
            (size.pixel_size - px) as u32
        };
        match closest {
            Some((_, distance)) if distance <= d => {}
            _ => closest = Some((size, d)),
        }
    }

    match closest {
        Some((size, distance)) => {
            let too_far = distance * 100 >= config.bitmap_scale_tolerance_percent * px as u32;
            if style.bitmap_scalable
                && !query.strategy.contains(StyleStrategy::PREFER_QUALITY)
                && too_far
            {
                if let Some(scaled) = style.pixel_size(0) {
                    return Some((scaled, px));
                }
            }
            Some((size, size.pixel_size))
        }
        // only an outline entry is left (PREFER_BITMAP on an outline face)
        None => style.pixel_size(SMOOTH_SCALABLE).map(|size| (size, px)),
    }
}

/// A foundry-level candidate, see [`best_foundry`].
#[derive(Debug, Clone, Copy)]
pub struct FoundryMatch<'a> {
    pub foundry: &'a FoundryRecord,
    pub style: &'a StyleRecord,
    pub size: &'a SizeRecord,
    pub pixel_size: u16,
    pub score: u32,
}

/// Scores every foundry of `family` (only `foundry_name` if non-empty) and
/// returns the best candidate scoring below `best_score`.
pub fn best_foundry<'a>(
    family: &'a FamilyRecord,
    foundry_name: &str,
    query: &MatchQuery<'_>,
    best_score: u32,
    config: &MatchConfig,
    trace: &mut Vec<TraceMsg>,
) -> Option<FoundryMatch<'a>> {
    let mut score = best_score;
    let mut result = None;

    for foundry in &family.foundries {
        if !foundry_name.is_empty() && compare_names(&foundry.name, foundry_name) != Ordering::Equal
        {
            continue;
        }

        let (style, _) = match best_style(foundry, &query.style, query.style_name) {
            Some(s) => s,
            None => continue,
        };

        if !style.smooth_scalable && query.strategy.contains(StyleStrategy::FORCE_OUTLINE) {
            trace.push(TraceMsg {
                level: TraceLevel::Info,
                family: family.name.clone(),
                reason: MatchReason::OutlineRequired,
            });
            continue;
        }

        let (size, px) = match select_size(style, query, config) {
            Some(s) => s,
            None => {
                trace.push(TraceMsg {
                    level: TraceLevel::Info,
                    family: family.name.clone(),
                    reason: MatchReason::NoUsableSize {
                        pixel_size: query.pixel_size,
                    },
                });
                continue;
            }
        };

        let mut this_score = 0;
        match query.pitch {
            Pitch::Fixed if !family.fixed_pitch => this_score += PITCH_MISMATCH,
            Pitch::Proportional if family.fixed_pitch => this_score += PITCH_MISMATCH,
            _ => {}
        }
        let name_matches = !query.style_name.is_empty() && style.style_name == query.style_name;
        if !name_matches && !query.style.matches(&style.key) {
            this_score += STYLE_MISMATCH;
        }
        if !style.smooth_scalable && px != size.pixel_size {
            this_score += BITMAP_SCALED_PENALTY;
        }
        if px != query.pixel_size {
            this_score += (px as i32 - query.pixel_size as i32).unsigned_abs();
        }

        trace.push(TraceMsg {
            level: TraceLevel::Debug,
            family: family.name.clone(),
            reason: MatchReason::Candidate {
                foundry: foundry.name.clone(),
                score: this_score,
                best: score,
            },
        });

        if this_score < score {
            score = this_score;
            result = Some(FoundryMatch {
                foundry,
                style,
                size,
                pixel_size: px,
                score: this_score,
            });
        }
    }

    result
}

/// Finds the best match for `request` in the family named `family_name`, or
/// across every family supporting the requested script if the name is empty.
///
/// Blacklisted families are skipped. `foundry_name` is preferred, any
/// foundry is accepted if it yields nothing.
pub fn match_family<'a>(
    db: &'a FontDatabase,
    request: &FontRequest,
    family_name: &str,
    foundry_name: &str,
    blacklist: &Blacklist,
    config: &MatchConfig,
    trace: &mut Vec<TraceMsg>,
) -> Option<FontDesc<'a>> {
    let query = MatchQuery::new(request, config);
    let trace_family = if family_name.is_empty() {
        "<any>"
    } else {
        family_name
    };

    log::trace!(
        "match: family '{}' [{}], script {:?}, style {:?}, {}px, strategy {:#x}",
        trace_family,
        if foundry_name.is_empty() { "-- any --" } else { foundry_name },
        query.script,
        query.style,
        query.pixel_size,
        query.strategy.0
    );

    let candidates: Vec<usize> = if family_name.is_empty() {
        (0..db.len()).collect()
    } else {
        match db.lookup_index(family_name) {
            Some(index) => vec![index],
            None => {
                trace.push(TraceMsg {
                    level: TraceLevel::Info,
                    family: trace_family.to_string(),
                    reason: MatchReason::FamilyNotFound {
                        requested: family_name.to_string(),
                    },
                });
                return None;
            }
        }
    };

    let mut score = u32::MAX;
    let mut best: Option<FontDesc<'a>> = None;

    for index in candidates {
        let family = match db.family_at(index) {
            Some(f) => f,
            None => continue,
        };

        if blacklist.contains(&family.name) {
            trace.push(TraceMsg {
                level: TraceLevel::Info,
                family: family.name.clone(),
                reason: MatchReason::Blacklisted,
            });
            continue;
        }

        if !family.writing_systems.supports_script(query.script) {
            trace.push(TraceMsg {
                level: TraceLevel::Debug,
                family: family.name.clone(),
                reason: MatchReason::ScriptUnsupported {
                    script: query.script,
                },
            });
            continue;
        }

        let mut found = best_foundry(family, foundry_name, &query, score, config, trace);
        if found.is_none() && !foundry_name.is_empty() {
            if family.foundry(foundry_name).is_none() {
                trace.push(TraceMsg {
                    level: TraceLevel::Info,
                    family: family.name.clone(),
                    reason: MatchReason::FoundryMismatch {
                        requested: foundry_name.to_string(),
                        found: family
                            .foundries
                            .first()
                            .map(|f| f.name.clone())
                            .unwrap_or_default(),
                    },
                });
            }
            found = best_foundry(family, "", &query, score, config, trace);
        }

        let found = match found {
            Some(f) => f,
            None => continue,
        };

        score = found.score;
        best = Some(FontDesc {
            family,
            foundry: found.foundry,
            style: found.style,
            size: found.size,
            pixel_size: found.pixel_size,
            score: found.score,
        });

        if found.score < config.early_exit_score {
            break;
        }
    }

    if let Some(desc) = best.as_ref() {
        log::trace!(
            "match: '{}' -> '{}' {:?} {}px (score {:#x})",
            trace_family,
            desc.family.name,
            desc.style.key,
            desc.pixel_size,
            desc.score
        );
        trace.push(TraceMsg {
            level: TraceLevel::Info,
            family: desc.family.name.clone(),
            reason: MatchReason::Success { score: desc.score },
        });
    }

    best
}
