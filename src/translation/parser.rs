/*!
 * Batch response parsing.
 *
 * Translation providers drift between reply shapes: numbered lines, an
 * embedded JSON list, or bare newline-delimited text. Each known shape is
 * attempted in priority order and the first one clearing the minimum
 * recovery bar wins. The parser is deliberately permissive - it returns as
 * many recovered lines as possible and reports the missing indices, which
 * feed the quality validator's completeness check.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::errors::PipelineError;

// Numbering prefix: ASCII, Persian (U+06F0..U+06F9) or Arabic-Indic
// (U+0660..U+0669) digits followed by a separator.
static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9\u{06F0}-\u{06F9}\u{0660}-\u{0669}]+)\s*[.)\-]\s*(.*)$").unwrap()
});

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*```[a-zA-Z]*\s*$").unwrap());

/// Reply shape the parser recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Numbered lines (`1. text`)
    Numbered,
    /// Embedded JSON list of `{index, text}` records
    Structured,
    /// Plain newline-delimited text with implicit ordering
    Plain,
}

/// One structured record in a JSON-shaped reply
#[derive(Debug, Deserialize)]
struct StructuredLine {
    /// Line number as sent in the request
    index: usize,
    /// Translated text
    text: String,
}

/// Envelope some providers wrap structured replies in
#[derive(Debug, Deserialize)]
struct StructuredEnvelope {
    /// The list of translated records
    translations: Vec<StructuredLine>,
}

/// Ordered recovery result: one slot per expected line
#[derive(Debug, Clone)]
pub struct ParsedReply {
    /// Recovered lines, index-aligned with the request; None where the
    /// reply had nothing usable
    pub lines: Vec<Option<String>>,

    /// The shape that produced this result
    pub shape: ReplyShape,
}

impl ParsedReply {
    /// Number of recovered lines
    pub fn recovered_count(&self) -> usize {
        self.lines.iter().filter(|l| l.is_some()).count()
    }

    /// Indices the reply failed to cover
    pub fn missing_indices(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Fraction of expected lines recovered
    pub fn recovered_fraction(&self) -> f64 {
        if self.lines.is_empty() {
            return 1.0;
        }
        self.recovered_count() as f64 / self.lines.len() as f64
    }
}

/// Map Persian and Arabic-Indic digit glyphs to ASCII
fn normalize_eastern_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => {
                char::from_digit(c as u32 - 0x06F0, 10).unwrap_or(c)
            }
            '\u{0660}'..='\u{0669}' => {
                char::from_digit(c as u32 - 0x0660, 10).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

/// Shape (a): numbered lines, with eastern digit prefixes normalized.
/// Continuation lines without a prefix attach to the previous entry.
fn parse_numbered(raw: &str, expected_count: usize) -> Vec<Option<String>> {
    let mut lines: Vec<Option<String>> = vec![None; expected_count];
    let mut last_slot: Option<usize> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = NUMBER_PREFIX.captures(trimmed) {
            let number = normalize_eastern_digits(caps.get(1).map_or("", |m| m.as_str()));
            let text = caps.get(2).map_or("", |m| m.as_str()).trim();

            if let Ok(n) = number.parse::<usize>() {
                if n >= 1 && n <= expected_count && !text.is_empty() {
                    let slot = n - 1;
                    lines[slot] = Some(text.to_string());
                    last_slot = Some(slot);
                    continue;
                }
            }
        }

        // Wrapped continuation of the previous numbered line
        if let Some(slot) = last_slot {
            if let Some(existing) = &mut lines[slot] {
                existing.push(' ');
                existing.push_str(trimmed);
            }
        }
    }

    lines
}

/// Shape (b): an embedded structured list of {index, text} records
fn parse_structured(raw: &str, expected_count: usize) -> Vec<Option<String>> {
    let mut lines: Vec<Option<String>> = vec![None; expected_count];

    let records = extract_records(raw);
    let Some(records) = records else {
        return lines;
    };

    // Providers disagree on whether indices start at 0 or 1
    let one_based = records.iter().all(|r| r.index >= 1);

    for record in records {
        let slot = if one_based { record.index - 1 } else { record.index };
        if slot < expected_count && !record.text.trim().is_empty() {
            lines[slot] = Some(record.text.trim().to_string());
        }
    }

    lines
}

fn extract_records(raw: &str) -> Option<Vec<StructuredLine>> {
    // Bare JSON array first
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if start < end {
            if let Ok(records) = serde_json::from_str::<Vec<StructuredLine>>(&raw[start..=end]) {
                return Some(records);
            }
        }
    }

    // Envelope object with a `translations` key
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(envelope) = serde_json::from_str::<StructuredEnvelope>(&raw[start..=end]) {
                return Some(envelope.translations);
            }
        }
    }

    None
}

/// Shape (c): plain newline-delimited text with implicit ordering
fn parse_plain(raw: &str, expected_count: usize) -> Vec<Option<String>> {
    let mut lines: Vec<Option<String>> = vec![None; expected_count];

    let mut slot = 0;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if slot >= expected_count {
            break;
        }
        lines[slot] = Some(trimmed.to_string());
        slot += 1;
    }

    lines
}

/// Parse a provider reply into index-aligned translated lines.
///
/// Shapes are attempted in priority order; the first result that recovers
/// at least `min_recovery` of the expected lines is returned. Below the bar
/// for every shape, the call fails with `MalformedResponse` carrying the
/// best recovery count seen.
pub fn parse(raw: &str, expected_count: usize, min_recovery: f64) -> Result<ParsedReply, PipelineError> {
    if expected_count == 0 {
        return Ok(ParsedReply { lines: Vec::new(), shape: ReplyShape::Plain });
    }

    let cleaned = CODE_FENCE.replace_all(raw, "");

    let attempts = [
        (ReplyShape::Numbered, parse_numbered(&cleaned, expected_count)),
        (ReplyShape::Structured, parse_structured(&cleaned, expected_count)),
        (ReplyShape::Plain, parse_plain(&cleaned, expected_count)),
    ];

    let mut best_recovered = 0;
    for (shape, lines) in attempts {
        let reply = ParsedReply { lines, shape };
        let recovered = reply.recovered_count();

        if reply.recovered_fraction() >= min_recovery {
            debug!(
                "Reply parsed as {:?}: {}/{} lines recovered",
                shape, recovered, expected_count
            );
            return Ok(reply);
        }
        best_recovered = best_recovered.max(recovered);
    }

    Err(PipelineError::MalformedResponse {
        recovered: best_recovered,
        expected: expected_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_reply(n: usize) -> String {
        (1..=n)
            .map(|i| format!("{}. ترجمه شماره {}", i, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_withNumberedReply_shouldRecoverAllLinesInOrder() {
        let reply = parse(&numbered_reply(10), 10, 0.6).unwrap();
        assert_eq!(reply.shape, ReplyShape::Numbered);
        assert_eq!(reply.recovered_count(), 10);
        assert!(reply.missing_indices().is_empty());
        assert_eq!(reply.lines[0].as_deref(), Some("ترجمه شماره 1"));
        assert_eq!(reply.lines[9].as_deref(), Some("ترجمه شماره 10"));
    }

    #[test]
    fn test_parse_withPersianNumberPrefixes_shouldRecoverSameLines() {
        let persian_digits = ["۱", "۲", "۳", "۴", "۵", "۶", "۷", "۸", "۹", "۱۰"];
        let raw = persian_digits
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{}. ترجمه شماره {}", d, i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        let reply = parse(&raw, 10, 0.6).unwrap();
        assert_eq!(reply.shape, ReplyShape::Numbered);
        assert_eq!(reply.recovered_count(), 10);
        assert_eq!(reply.lines[0].as_deref(), Some("ترجمه شماره 1"));
        assert_eq!(reply.lines[9].as_deref(), Some("ترجمه شماره 10"));
    }

    #[test]
    fn test_parse_withArabicIndicPrefixes_shouldRecover() {
        let raw = "١. أول\n٢. ثان\n٣. ثالث";
        let reply = parse(raw, 3, 0.6).unwrap();
        assert_eq!(reply.recovered_count(), 3);
        assert_eq!(reply.lines[0].as_deref(), Some("أول"));
    }

    #[test]
    fn test_parse_withJsonArray_shouldRecover() {
        let raw = r#"Here are the translations:
[{"index": 1, "text": "premier"}, {"index": 2, "text": "deuxième"}, {"index": 3, "text": "troisième"}]"#;
        let reply = parse(raw, 3, 0.6).unwrap();
        assert_eq!(reply.shape, ReplyShape::Structured);
        assert_eq!(reply.lines[2].as_deref(), Some("troisième"));
    }

    #[test]
    fn test_parse_withFencedJsonEnvelope_shouldRecover() {
        let raw = "```json\n{\"translations\": [{\"index\": 0, \"text\": \"uno\"}, {\"index\": 1, \"text\": \"dos\"}]}\n```";
        let reply = parse(raw, 2, 0.6).unwrap();
        assert_eq!(reply.shape, ReplyShape::Structured);
        assert_eq!(reply.lines[0].as_deref(), Some("uno"));
        assert_eq!(reply.lines[1].as_deref(), Some("dos"));
    }

    #[test]
    fn test_parse_withPlainLines_shouldRecoverByPosition() {
        let raw = "premier\ndeuxième\ntroisième";
        let reply = parse(raw, 3, 0.6).unwrap();
        assert_eq!(reply.shape, ReplyShape::Plain);
        assert_eq!(reply.recovered_count(), 3);
    }

    #[test]
    fn test_parse_withMissingLines_shouldReportMissingIndices() {
        let raw = "1. eins\n3. drei\n4. vier\n5. fünf";
        let reply = parse(raw, 5, 0.6).unwrap();
        assert_eq!(reply.recovered_count(), 4);
        assert_eq!(reply.missing_indices(), vec![1]);
    }

    #[test]
    fn test_parse_withContinuationLines_shouldAttachToPrevious() {
        let raw = "1. a line that got\nwrapped by the provider\n2. second";
        let reply = parse(raw, 2, 0.6).unwrap();
        assert_eq!(
            reply.lines[0].as_deref(),
            Some("a line that got wrapped by the provider")
        );
    }

    #[test]
    fn test_parse_belowMinimumRecovery_shouldFailMalformed() {
        let raw = "1. only one line";
        let result = parse(raw, 10, 0.6);
        match result {
            Err(PipelineError::MalformedResponse { recovered, expected }) => {
                assert_eq!(expected, 10);
                assert!(recovered >= 1);
            }
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_withZeroExpected_shouldReturnEmpty() {
        let reply = parse("anything", 0, 0.6).unwrap();
        assert!(reply.lines.is_empty());
        assert!((reply.recovered_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalizeEasternDigits_shouldMapBothBlocks() {
        assert_eq!(normalize_eastern_digits("۱۲۳"), "123");
        assert_eq!(normalize_eastern_digits("٤٥٦"), "456");
        assert_eq!(normalize_eastern_digits("unchanged 789"), "unchanged 789");
    }
}
