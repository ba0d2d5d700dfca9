/*!
 * Resume support.
 *
 * Ingests a previously written, partially translated track and reconciles
 * it against freshly segmented source text. Re-running transcription can
 * shift segment boundaries slightly, so matching is by timing proximity -
 * positional matching would silently misattribute translations after any
 * upstream change in segmentation.
 */

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::Segment;

// ASS dialogue line: Layer, Start, End, Style, Name, MarginL, MarginR,
// MarginV, Effect, Text
static ASS_DIALOGUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^Dialogue:\s*[^,]*,(\d+:\d{2}:\d{2}\.\d{2}),(\d+:\d{2}:\d{2}\.\d{2}),([^,]*),[^,]*,[^,]*,[^,]*,[^,]*,[^,]*,(.*)$",
    )
    .unwrap()
});

static OVERRIDE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\\[^}]*\}").unwrap());

/// One cue recovered from a prior run's output; its text is a translation
#[derive(Debug, Clone)]
pub struct PriorCue {
    /// Start time in ms
    pub start_ms: u64,

    /// End time in ms
    pub end_ms: u64,

    /// Translated text of the cue
    pub text: String,
}

impl PriorCue {
    /// View a parsed SRT track as prior cues
    pub fn from_segments(segments: &[Segment]) -> Vec<PriorCue> {
        segments
            .iter()
            .map(|s| PriorCue {
                start_ms: s.start_ms,
                end_ms: s.end_ms,
                text: s.source_text.clone(),
            })
            .collect()
    }
}

/// Parse an ASS timestamp (H:MM:SS.cc, centisecond precision) to ms
pub fn parse_ass_timestamp(timestamp: &str) -> Option<u64> {
    let mut parts = timestamp.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;

    let mut sec_parts = seconds_part.split('.');
    let seconds: u64 = sec_parts.next()?.parse().ok()?;
    let centis: u64 = sec_parts.next()?.parse().ok()?;

    Some((hours * 3600 + minutes * 60 + seconds) * 1000 + centis * 10)
}

/// Strip styling override tags, bidi isolation marks and hard line breaks
/// from ASS dialogue text
fn clean_ass_text(text: &str) -> String {
    let without_tags = OVERRIDE_TAG.replace_all(text, "");
    let without_breaks = without_tags.replace("\\N", " ").replace("\\n", " ");
    without_breaks
        .chars()
        .filter(|c| !matches!(c, '\u{2066}'..='\u{2069}' | '\u{200E}' | '\u{200F}'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read dialogue cues back out of a styled track.
///
/// `style_filter` restricts to one style name (bilingual tracks carry a
/// style per language); None takes every dialogue line.
pub fn parse_ass_track(content: &str, style_filter: Option<&str>) -> Vec<PriorCue> {
    let mut cues = Vec::new();

    for caps in ASS_DIALOGUE.captures_iter(content) {
        let style = caps.get(3).map_or("", |m| m.as_str()).trim();
        if let Some(wanted) = style_filter {
            if style != wanted {
                continue;
            }
        }

        let (Some(start), Some(end)) = (
            parse_ass_timestamp(caps.get(1).map_or("", |m| m.as_str())),
            parse_ass_timestamp(caps.get(2).map_or("", |m| m.as_str())),
        ) else {
            continue;
        };

        let text = clean_ass_text(caps.get(4).map_or("", |m| m.as_str()));
        if !text.is_empty() {
            cues.push(PriorCue { start_ms: start, end_ms: end, text });
        }
    }

    cues
}

/// Reconciles prior output with fresh segmentation by timing proximity
pub struct ResumeMerger {
    /// Maximum start-time distance for a match, in ms
    tolerance_ms: u64,
}

impl Default for ResumeMerger {
    fn default() -> Self {
        Self::new(500)
    }
}

impl ResumeMerger {
    /// Create a merger with the given tolerance window
    pub fn new(tolerance_ms: u64) -> Self {
        Self { tolerance_ms }
    }

    /// Carry prior translations over onto fresh segments.
    ///
    /// Each fresh segment takes the translation of the closest prior cue
    /// whose start lies within the tolerance window; every prior cue is
    /// consumed at most once. Segments with no close-enough neighbor stay
    /// untranslated and go through the normal translation path.
    pub fn merge(&self, existing: &[PriorCue], mut fresh: Vec<Segment>) -> Vec<Segment> {
        let mut consumed = vec![false; existing.len()];
        let mut carried = 0;

        for segment in fresh.iter_mut() {
            let mut best: Option<(usize, u64)> = None;

            for (i, cue) in existing.iter().enumerate() {
                if consumed[i] {
                    continue;
                }
                let distance = cue.start_ms.abs_diff(segment.start_ms);
                if distance > self.tolerance_ms {
                    continue;
                }
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((i, distance));
                }
            }

            match best {
                Some((i, distance)) => {
                    consumed[i] = true;
                    segment.translated_text = Some(existing[i].text.clone());
                    carried += 1;
                    debug!(
                        "Segment {} matched prior cue at {}ms distance",
                        segment.index, distance
                    );
                }
                None => {
                    // No mismatch error here: an unmatched segment simply
                    // goes back through translation
                    debug!("Segment {} has no prior neighbor", segment.index);
                }
            }
        }

        info!(
            "Resume carried {} of {} translations over ({} fresh segments left untranslated)",
            carried,
            existing.len(),
            fresh.len() - carried
        );
        fresh
    }
}
