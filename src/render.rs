/*!
 * Style rendering.
 *
 * Converts validated translated segments plus per-language style rules into
 * a renderer-consumable styled track (ASS). Font sizes are normalized to the
 * video's resolution against a 1080p baseline. Bilingual output stacks the
 * primary language bottom/emphasized and the secondary top/de-emphasized.
 *
 * RTL cue text is wrapped in directional isolates (RLI/FSI...PDI). Bidi
 * override characters are never emitted - overrides cause renderer-level
 * mirroring artifacts, and that is a hard constraint, not a preference.
 */

use std::fs;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use log::warn;

use crate::app_config::{Alignment, StyleConfig};
use crate::languages::{self, LanguageProfile};
use crate::subtitle_processor::Segment;
use crate::translation::validator::technical_terms;

/// Right-to-left isolate
const RLI: char = '\u{2067}';
/// First-strong isolate
const FSI: char = '\u{2068}';
/// Pop directional isolate
const PDI: char = '\u{2069}';

/// Style name of the primary (first-listed) language
pub const PRIMARY_STYLE: &str = "Primary";
/// Style name of the secondary language in bilingual mode
pub const SECONDARY_STYLE: &str = "Secondary";

// Secondary lines render at this share of their base size
const SECONDARY_SIZE_RATIO: f32 = 0.6;

// Start times this close count as the same cue when pairing languages
const PAIRING_SLACK_MS: u64 = 100;

/// One resolved ASS style
#[derive(Debug, Clone)]
pub struct TrackStyle {
    /// ASS style name
    pub name: String,
    /// Language code the style renders
    pub language: String,
    /// Font family
    pub font_name: String,
    /// Font size after resolution scaling
    pub font_size: u32,
    /// Primary colour in ASS &HAABBGGRR notation
    pub colour: String,
    /// Bold flag
    pub bold: bool,
    /// ASS border style: 3 boxes the cue, 1 is a classic outline
    pub border_style: u8,
    /// ASS numpad alignment code
    pub alignment_code: u8,
    /// ASS font encoding id
    pub encoding: u8,
}

/// One line of one cue, bound to a style
#[derive(Debug, Clone)]
pub struct CueLine {
    /// Style name the line renders with
    pub style: String,
    /// Display text, bidi-isolated where needed
    pub text: String,
}

/// One styled cue: a timeframe plus one line per language
#[derive(Debug, Clone)]
pub struct StyledCue {
    /// Start time in ms
    pub start_ms: u64,
    /// End time in ms
    pub end_ms: u64,
    /// Exactly one line per rendered language
    pub lines: Vec<CueLine>,
}

/// The final renderer-ready artifact
#[derive(Debug, Clone)]
pub struct StyledTrack {
    /// Vertical resolution the track was rendered for
    pub play_res_y: u32,
    /// Resolution-derived scale factor (video_height / 1080)
    pub scale: f64,
    /// Header styles, primary first
    pub styles: Vec<TrackStyle>,
    /// Ordered styled cues
    pub cues: Vec<StyledCue>,
}

/// Render validated segments into a styled track.
///
/// `segments_by_language` lists (language code, translated segments) in
/// target order; the first entry is the primary language. Deterministic:
/// the same inputs always produce the same track.
pub fn render(
    segments_by_language: &[(String, Vec<Segment>)],
    rules: &StyleConfig,
    video_height: u32,
) -> Result<StyledTrack> {
    let (primary_lang, primary_segments) = segments_by_language
        .first()
        .ok_or_else(|| anyhow!("Nothing to render: no languages supplied"))?;

    if video_height == 0 {
        return Err(anyhow!("Video height must be positive"));
    }

    let scale = video_height as f64 / 1080.0;
    let primary_profile = languages::resolve(primary_lang)?;

    let mut styles = vec![build_style(
        PRIMARY_STYLE,
        primary_lang,
        &primary_profile,
        rules,
        scale,
        1.0,
        true,
    )];

    let secondary = segments_by_language.get(1);
    let secondary_profile = match secondary {
        Some((lang, _)) => {
            let profile = languages::resolve(lang)?;
            styles.push(build_style(
                SECONDARY_STYLE,
                lang,
                &profile,
                rules,
                scale,
                SECONDARY_SIZE_RATIO,
                false,
            ));
            Some(profile)
        }
        None => None,
    };
    if segments_by_language.len() > 2 {
        warn!(
            "Rendering supports two stacked languages; ignoring {} extra",
            segments_by_language.len() - 2
        );
    }

    let mut cues = Vec::with_capacity(primary_segments.len());
    for segment in primary_segments {
        let Some(text) = segment.translated_text.as_deref() else {
            warn!("Segment {} has no translation, skipped in render", segment.index);
            continue;
        };

        let mut lines = vec![CueLine {
            style: PRIMARY_STYLE.to_string(),
            text: isolate_bidi(&single_line(text), &primary_profile),
        }];

        if let (Some((_, secondary_segments)), Some(profile)) = (secondary, secondary_profile.as_ref()) {
            if let Some(paired) = pair_by_start(segment.start_ms, secondary_segments) {
                lines.push(CueLine {
                    style: SECONDARY_STYLE.to_string(),
                    text: isolate_bidi(&single_line(paired), profile),
                });
            }
        }

        cues.push(StyledCue {
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
            lines,
        });
    }

    Ok(StyledTrack {
        play_res_y: video_height,
        scale,
        styles,
        cues,
    })
}

fn build_style(
    name: &str,
    language: &str,
    profile: &LanguageProfile,
    rules: &StyleConfig,
    scale: f64,
    size_ratio: f32,
    emphasized: bool,
) -> TrackStyle {
    let base = rules.font_size_override.unwrap_or(profile.base_font_size);
    let font_size = ((base * size_ratio) as f64 * scale).round().max(1.0) as u32;

    TrackStyle {
        name: name.to_string(),
        language: language.to_string(),
        font_name: profile.font_name.to_string(),
        font_size,
        colour: if emphasized { "&H00FFFFFF".to_string() } else { "&H00AAAAAA".to_string() },
        bold: emphasized,
        border_style: if rules.template == "outline" { 1 } else { 3 },
        alignment_code: alignment_code(rules.alignment, emphasized),
        encoding: if profile.is_rtl() { 178 } else { 1 },
    }
}

// ASS numpad alignment: primary sits at the bottom, secondary at the top
fn alignment_code(alignment: Alignment, bottom: bool) -> u8 {
    let column = match alignment {
        Alignment::Left => 1,
        Alignment::Center => 2,
        Alignment::Right => 3,
    };
    if bottom { column } else { column + 6 }
}

/// Find the secondary text sharing the cue's timeframe. Exact start match
/// first, then anything within the pairing slack.
fn pair_by_start(start_ms: u64, candidates: &[Segment]) -> Option<&str> {
    fn translated(s: &Segment) -> Option<&str> {
        s.translated_text.as_deref()
    }

    if let Some(found) = candidates.iter().find(|s| s.start_ms == start_ms) {
        return translated(found);
    }
    candidates
        .iter()
        .filter(|s| s.start_ms.abs_diff(start_ms) <= PAIRING_SLACK_MS)
        .min_by_key(|s| s.start_ms.abs_diff(start_ms))
        .and_then(translated)
}

// Exactly one rendered line per language per cue - wrapping happened
// upstream at resegmentation time
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap text in directional isolates as its script requires. Embedded
/// parenthesized Latin technical terms get their own first-strong isolate
/// so they read correctly inside RTL text.
pub fn isolate_bidi(text: &str, profile: &LanguageProfile) -> String {
    let mut result = text.to_string();

    if profile.is_rtl() {
        for term in technical_terms(text) {
            let plain = format!("({})", term);
            let isolated = format!("{}({}){}", FSI, term, PDI);
            result = result.replace(&plain, &isolated);
        }
        result = format!("{}{}{}", RLI, result, PDI);
    }

    result
}

/// Format a timestamp in ASS notation (H:MM:SS.cc, centiseconds)
pub fn format_ass_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let centis = (ms % 1_000) / 10;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centis)
}

impl StyledTrack {
    /// Serialize the track to an ASS document
    pub fn to_ass_string(&self) -> String {
        let mut out = String::new();

        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        out.push_str(&format!("PlayResX: {}\n", self.play_res_y * 16 / 9));
        out.push_str(&format!("PlayResY: {}\n", self.play_res_y));
        out.push_str("ScaledBorderAndShadow: yes\n");
        out.push_str("WrapStyle: 2\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
             BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
             BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
        );
        for style in &self.styles {
            // Default template boxes the cue on a semi-transparent
            // background; the outline template uses a thicker classic border
            let outline_width = if style.border_style == 3 { 1 } else { 2 };
            out.push_str(&format!(
                "Style: {},{},{},{},&H000000FF,&H00000000,&H80000000,{},0,0,0,100,100,0,0,{},{},0,{},10,10,22,{}\n",
                style.name,
                style.font_name,
                style.font_size,
                style.colour,
                if style.bold { 1 } else { 0 },
                style.border_style,
                outline_width,
                style.alignment_code,
                style.encoding,
            ));
        }
        out.push('\n');

        out.push_str("[Events]\n");
        out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
        for cue in &self.cues {
            for line in &cue.lines {
                out.push_str(&format!(
                    "Dialogue: 0,{},{},{},,0,0,0,,{}\n",
                    format_ass_timestamp(cue.start_ms),
                    format_ass_timestamp(cue.end_ms),
                    line.style,
                    line.text,
                ));
            }
        }

        out
    }

    /// Write the track to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, self.to_ass_string())
            .with_context(|| format!("Failed to write styled track: {}", path.display()))
    }
}
