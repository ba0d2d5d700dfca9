/*!
 * Language profiles for subtitle rendering and validation.
 *
 * Each profile carries the script direction, the Unicode ranges used by the
 * quality validator to recognize the target script, and the font the style
 * renderer assigns to the language. Profiles are immutable reference data,
 * looked up by ISO 639-1 code.
 */

use anyhow::{anyhow, Result};
use isolang::Language;

/// Script direction of a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDirection {
    /// Left-to-right script
    Ltr,
    /// Right-to-left script
    Rtl,
}

/// Immutable per-language reference data
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    /// ISO 639-1 code
    pub code: &'static str,

    /// Human-readable name
    pub display_name: &'static str,

    /// Script direction
    pub direction: ScriptDirection,

    /// Inclusive code point ranges of the language's script. Empty for
    /// Latin-script languages - those are validated by the
    /// differs-from-source check instead.
    pub unicode_ranges: &'static [(u32, u32)],

    /// Font assigned by the style renderer
    pub font_name: &'static str,

    /// Font size at 1080p, before resolution scaling
    pub base_font_size: f32,
}

// Arabic-script ranges shared by Persian and Arabic: base block,
// supplement, and the presentation forms shaped text can fall into.
const ARABIC_RANGES: &[(u32, u32)] = &[
    (0x0600, 0x06FF),
    (0x0750, 0x077F),
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
];

const CYRILLIC_RANGES: &[(u32, u32)] = &[(0x0400, 0x04FF)];

const DEVANAGARI_RANGES: &[(u32, u32)] = &[(0x0900, 0x097F)];

// Kana plus unified ideographs - Japanese subtitles mix all three.
const JAPANESE_RANGES: &[(u32, u32)] = &[
    (0x3040, 0x309F),
    (0x30A0, 0x30FF),
    (0x4E00, 0x9FFF),
];

const HANGUL_RANGES: &[(u32, u32)] = &[(0xAC00, 0xD7AF), (0x1100, 0x11FF)];

const CJK_RANGES: &[(u32, u32)] = &[(0x4E00, 0x9FFF), (0x3400, 0x4DBF)];

/// Built-in language profiles
pub const PROFILES: &[LanguageProfile] = &[
    LanguageProfile { code: "en", display_name: "English", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "fa", display_name: "Persian", direction: ScriptDirection::Rtl, unicode_ranges: ARABIC_RANGES, font_name: "B Nazanin", base_font_size: 30.0 },
    LanguageProfile { code: "ar", display_name: "Arabic", direction: ScriptDirection::Rtl, unicode_ranges: ARABIC_RANGES, font_name: "Arial", base_font_size: 30.0 },
    LanguageProfile { code: "es", display_name: "Spanish", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "fr", display_name: "French", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "de", display_name: "German", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "it", display_name: "Italian", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "pt", display_name: "Portuguese", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "ru", display_name: "Russian", direction: ScriptDirection::Ltr, unicode_ranges: CYRILLIC_RANGES, font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "ja", display_name: "Japanese", direction: ScriptDirection::Ltr, unicode_ranges: JAPANESE_RANGES, font_name: "MS Gothic", base_font_size: 26.0 },
    LanguageProfile { code: "ko", display_name: "Korean", direction: ScriptDirection::Ltr, unicode_ranges: HANGUL_RANGES, font_name: "Malgun Gothic", base_font_size: 26.0 },
    LanguageProfile { code: "zh", display_name: "Chinese", direction: ScriptDirection::Ltr, unicode_ranges: CJK_RANGES, font_name: "SimHei", base_font_size: 26.0 },
    LanguageProfile { code: "hi", display_name: "Hindi", direction: ScriptDirection::Ltr, unicode_ranges: DEVANAGARI_RANGES, font_name: "Mangal", base_font_size: 28.0 },
    LanguageProfile { code: "tr", display_name: "Turkish", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "nl", display_name: "Dutch", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
    LanguageProfile { code: "mg", display_name: "Malagasy", direction: ScriptDirection::Ltr, unicode_ranges: &[], font_name: "Arial", base_font_size: 28.0 },
];

/// Fallback profile for valid ISO codes outside the built-in table
const FALLBACK: LanguageProfile = LanguageProfile {
    code: "und",
    display_name: "Unknown",
    direction: ScriptDirection::Ltr,
    unicode_ranges: &[],
    font_name: "Arial",
    base_font_size: 28.0,
};

/// Look up the profile for a language code
pub fn profile_for(code: &str) -> Option<&'static LanguageProfile> {
    let normalized = code.trim().to_lowercase();
    PROFILES.iter().find(|p| p.code == normalized)
}

/// Resolve a language code to a profile, falling back to a Latin-script
/// default for any valid ISO 639-1 code without a built-in entry.
pub fn resolve(code: &str) -> Result<LanguageProfile> {
    if let Some(profile) = profile_for(code) {
        return Ok(*profile);
    }

    let normalized = code.trim().to_lowercase();
    if Language::from_639_1(&normalized).is_some() {
        return Ok(LanguageProfile { ..FALLBACK });
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Get the display name for a language code
pub fn display_name(code: &str) -> Result<String> {
    if let Some(profile) = profile_for(code) {
        return Ok(profile.display_name.to_string());
    }

    let normalized = code.trim().to_lowercase();
    Language::from_639_1(&normalized)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

impl LanguageProfile {
    /// Whether the profile names a non-Latin script the validator can
    /// check code points against
    pub fn has_script_ranges(&self) -> bool {
        !self.unicode_ranges.is_empty()
    }

    /// Whether any character of the text falls inside the profile's script
    pub fn contains_script_char(&self, text: &str) -> bool {
        text.chars().any(|c| {
            let cp = c as u32;
            self.unicode_ranges
                .iter()
                .any(|(lo, hi)| cp >= *lo && cp <= *hi)
        })
    }

    /// Whether the script is right-to-left
    pub fn is_rtl(&self) -> bool {
        self.direction == ScriptDirection::Rtl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profileFor_withKnownCode_shouldReturnProfile() {
        let profile = profile_for("fa").unwrap();
        assert_eq!(profile.display_name, "Persian");
        assert!(profile.is_rtl());
        assert_eq!(profile.font_name, "B Nazanin");
    }

    #[test]
    fn test_profileFor_withUppercaseCode_shouldNormalize() {
        assert!(profile_for("FA").is_some());
        assert!(profile_for(" ja ").is_some());
    }

    #[test]
    fn test_resolve_withValidIsoCodeOutsideTable_shouldFallBack() {
        let profile = resolve("sv").unwrap();
        assert_eq!(profile.direction, ScriptDirection::Ltr);
        assert!(!profile.has_script_ranges());
    }

    #[test]
    fn test_resolve_withInvalidCode_shouldError() {
        assert!(resolve("xx").is_err());
        assert!(resolve("").is_err());
    }

    #[test]
    fn test_containsScriptChar_withPersianText_shouldMatch() {
        let profile = profile_for("fa").unwrap();
        assert!(profile.contains_script_char("سلام دنیا"));
        assert!(!profile.contains_script_char("hello world"));
        // Mixed text with a single Persian character still counts
        assert!(profile.contains_script_char("hello س"));
    }

    #[test]
    fn test_containsScriptChar_withCyrillic_shouldMatchRussianOnly() {
        let ru = profile_for("ru").unwrap();
        let fa = profile_for("fa").unwrap();
        assert!(ru.contains_script_char("Привет"));
        assert!(!fa.contains_script_char("Привет"));
    }

    #[test]
    fn test_latinProfiles_shouldHaveNoRanges() {
        for code in ["en", "es", "fr", "de", "tr", "nl", "mg"] {
            assert!(!profile_for(code).unwrap().has_script_ranges(), "{}", code);
        }
    }
}
