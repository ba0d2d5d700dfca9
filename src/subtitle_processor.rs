use std::fmt;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// @module: Segment data model and timed-text file handling

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap()
});

// @const: Trailing punctuation stripped from cue lines
const TRAILING_PUNCTUATION: &[char] = &['.', '،', ',', '؟', '!', '?', '…'];

/// Which text field of a segment a written track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackText {
    /// The transcribed source-language text
    Source,
    /// The translated text, falling back to the source where missing
    Translation,
}

// @struct: One timestamped unit of subtitle text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    // @field: Stable zero-based identity, chronological
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Source-language text
    pub source_text: String,

    // @field: Translation, populated once per target language
    #[serde(default)]
    pub translated_text: Option<String>,
}

impl Segment {
    /// Creates a new untranslated segment
    pub fn new(index: usize, start_ms: u64, end_ms: u64, source_text: String) -> Self {
        Segment {
            index,
            start_ms,
            end_ms,
            source_text,
            translated_text: None,
        }
    }

    // @creates: Validated segment
    // @validates: Time range and non-empty text
    pub fn new_validated(index: usize, start_ms: u64, end_ms: u64, source_text: String) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_ms, start_ms
            ));
        }

        let trimmed = source_text.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Empty subtitle text for segment {}", index));
        }

        Ok(Segment::new(index, start_ms, end_ms, trimmed.to_string()))
    }

    /// Duration of the segment in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Text a track of the given kind carries for this segment
    pub fn text_for(&self, which: TrackText) -> &str {
        match which {
            TrackText::Source => &self.source_text,
            TrackText::Translation => self
                .translated_text
                .as_deref()
                .unwrap_or(&self.source_text),
        }
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        format_timestamp(self.start_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        format_timestamp(self.end_ms)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index + 1)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.source_text)?;
        writeln!(f)
    }
}

/// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
    let parts: Vec<&str> = timestamp.split(&[':', ',', '.'][..]).collect();

    if parts.len() != 4 {
        return Err(anyhow!("Invalid timestamp format: {}", timestamp));
    }

    let hours: u64 = parts[0].trim().parse().context("Failed to parse hours")?;
    let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
    let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
    let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
    }

    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Parse SRT format content into segments.
///
/// Tolerant of the usual drift in real-world files: blank-line separated
/// blocks, stray text, invalid entries (skipped with a warning). Entries are
/// sorted chronologically and reindexed 0-based; overlaps are reported, not
/// rejected.
pub fn parse_srt_string(content: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    // State for the block being assembled
    let mut current_seq: Option<usize> = None;
    let mut current_start: Option<u64> = None;
    let mut current_end: Option<u64> = None;
    let mut current_text = String::new();
    let mut line_count = 0;

    let mut push_current = |seq: usize, start: u64, end: u64, text: &str| {
        if text.trim().is_empty() {
            warn!("Skipping empty subtitle entry {}", seq);
            return;
        }
        match Segment::new_validated(seq, start, end, text.trim().to_string()) {
            Ok(segment) => segments.push(segment),
            Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq, e),
        }
    };

    for line in content.lines() {
        line_count += 1;
        let trimmed = line.trim_start_matches('\u{feff}').trim();

        if trimmed.is_empty() {
            if let (Some(seq), Some(start), Some(end)) = (current_seq, current_start, current_end) {
                if !current_text.is_empty() {
                    push_current(seq, start, end, &current_text);
                    current_seq = None;
                    current_start = None;
                    current_end = None;
                    current_text.clear();
                }
            }
            continue;
        }

        // Sequence number only opens a new block
        if current_seq.is_none() && current_text.is_empty() {
            if let Ok(num) = trimmed.parse::<usize>() {
                current_seq = Some(num);
                continue;
            }
        }

        if current_seq.is_some() && current_start.is_none() && current_end.is_none() {
            if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                match (capture_to_ms(&caps, 1), capture_to_ms(&caps, 5)) {
                    (Ok(start), Ok(end)) => {
                        current_start = Some(start);
                        current_end = Some(end);
                        continue;
                    }
                    _ => {
                        warn!("Invalid timestamp format at line {}: {}", line_count, trimmed);
                    }
                }
            }
        }

        if current_seq.is_some() && current_start.is_some() && current_end.is_some() {
            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(trimmed);
        } else {
            warn!("Unexpected text at line {} before sequence number or timestamp: {}", line_count, trimmed);
        }
    }

    // Flush the last block
    if let (Some(seq), Some(start), Some(end)) = (current_seq, current_start, current_end) {
        if !current_text.is_empty() {
            push_current(seq, start, end, &current_text);
        }
    }

    if segments.is_empty() {
        return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
    }

    segments.sort_by_key(|s| s.start_ms);

    let mut overlap_count = 0;
    for i in 0..segments.len().saturating_sub(1) {
        if segments[i].end_ms > segments[i + 1].start_ms {
            overlap_count += 1;
        }
    }
    if overlap_count > 0 {
        warn!("Found {} overlapping subtitle entries", overlap_count);
    }

    // Stable zero-based identity in chronological order
    for (i, segment) in segments.iter_mut().enumerate() {
        segment.index = i;
    }

    Ok(segments)
}

/// Parse an SRT file into segments
pub fn read_srt_file<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read subtitle file: {}", path.as_ref().display()))?;
    parse_srt_string(&content)
}

/// Write segments to an SRT file, carrying the chosen text field
pub fn write_srt_file<P: AsRef<Path>>(path: P, segments: &[Segment], which: TrackText) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;

    let mut untranslated = 0;
    for (i, segment) in segments.iter().enumerate() {
        if which == TrackText::Translation && segment.translated_text.is_none() {
            untranslated += 1;
        }
        writeln!(file, "{}", i + 1)?;
        writeln!(file, "{} --> {}", segment.format_start_time(), segment.format_end_time())?;
        writeln!(file, "{}", segment.text_for(which))?;
        writeln!(file)?;
    }

    if untranslated > 0 {
        warn!(
            "{} of {} segments written with source text (no translation available)",
            untranslated,
            segments.len()
        );
    }

    Ok(())
}

/// Remove trailing punctuation and internal newlines from a cue line
pub fn clean_subtitle_line(text: &str) -> String {
    let mut text = text.trim().to_string();
    while text.ends_with(TRAILING_PUNCTUATION) {
        text.pop();
        text = text.trim_end().to_string();
    }
    let flattened = text.replace(['\n', '\r'], " ");
    flattened.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text on word boundaries while respecting punctuation.
///
/// Cuts early at sentence enders past 70% of the limit and phrase enders
/// past 85%, so sentences don't straddle cue boundaries.
pub fn split_text_smart(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let sentence_enders = ['.', '?', '!'];
    let phrase_enders = [',', '،', ';', ':'];

    let mut parts = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if current_len + word_len + 1 > max_chars {
            if !current.is_empty() {
                parts.push(current.trim().to_string());
                current = word.to_string();
            } else {
                // Single word longer than the limit (rare)
                let chars: Vec<char> = word.chars().collect();
                parts.push(chars[..max_chars].iter().collect());
                current = chars[max_chars..].iter().collect();
            }
        } else {
            if current.is_empty() {
                current = word.to_string();
            } else {
                current.push(' ');
                current.push_str(word);
            }

            let len = current.chars().count();
            if word.ends_with(sentence_enders) && len * 10 > max_chars * 7 {
                parts.push(current.trim().to_string());
                current = String::new();
            } else if word.ends_with(phrase_enders) && len * 100 > max_chars * 85 {
                parts.push(current.trim().to_string());
                current = String::new();
            }
        }
    }

    if !current.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Resegment over-long entries into renderer-sized lines.
///
/// Timing of a split entry is interpolated by character share, so the pieces
/// stay in sync with the audio. Output is reindexed 0-based.
pub fn split_long_segments(segments: &[Segment], max_chars: usize) -> Vec<Segment> {
    let mut result: Vec<Segment> = Vec::with_capacity(segments.len());

    for segment in segments {
        let text = clean_subtitle_line(&segment.source_text);
        let parts = split_text_smart(&text, max_chars);

        if parts.len() <= 1 {
            let mut kept = segment.clone();
            kept.source_text = text;
            result.push(kept);
            continue;
        }

        let duration = segment.duration_ms();
        let total_chars: usize = parts.iter().map(|p| p.chars().count()).sum();
        let mut cursor = segment.start_ms;

        for part in parts {
            let share = part.chars().count() as f64 / total_chars.max(1) as f64;
            let part_duration = (duration as f64 * share) as u64;
            let next = (cursor + part_duration).min(segment.end_ms);
            if next > cursor {
                result.push(Segment::new(0, cursor, next, part));
                cursor = next;
            }
        }
    }

    for (i, segment) in result.iter_mut().enumerate() {
        segment.index = i;
    }
    result
}

/// Parse timestamp capture groups to milliseconds
fn capture_to_ms(caps: &regex::Captures, start_idx: usize) -> Result<u64> {
    let hours: u64 = caps.get(start_idx)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let minutes: u64 = caps.get(start_idx + 1)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let seconds: u64 = caps.get(start_idx + 2)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let millis: u64 = caps.get(start_idx + 3)
        .map_or(0, |m| m.as_str().parse().unwrap_or(0));

    Ok((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
}
