//! Input Mask Engine
//!
//! Reformats raw keystrokes into a canonical display string and checks
//! whether every placeholder of the mask has been filled.
//!
//! ## Pattern language
//!
//! | Char | Meaning |
//! |------|---------|
//! | `0`  | digit placeholder |
//! | `A`  | ASCII letter placeholder |
//! | `*`  | ASCII alphanumeric placeholder |
//! | `\x` | literal `x` |
//! | other | literal, inserted verbatim |
//!
//! ## Formatting
//!
//! The raw input is walked left to right against the pattern. A raw character
//! equal to the pattern literal at the current position is consumed, so
//! already-formatted input formats to itself. Characters that do not fit the
//! current placeholder are dropped, except before the first placeholder is
//! filled, where a mismatch ends formatting with an empty result. Pattern
//! literals are only emitted once a later placeholder is filled or the raw
//! input runs out after at least one placeholder was filled:
//!
//! ```
//! use formspec_core::mask::{apply_mask, MaskSpec};
//!
//! let phone = MaskSpec::named("phone");
//! assert_eq!(apply_mask("5551234567", Some(&phone)), "(555) 123-4567");
//! assert_eq!(apply_mask("555", Some(&phone)), "(555) ");
//! assert_eq!(apply_mask("abc", Some(&phone)), "");
//! ```

pub mod presets;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::iter::Peekable;
use std::str::Chars;

/// One position of a compiled mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskToken {
    Digit,
    Letter,
    Alphanumeric,
    Literal(char),
}

impl MaskToken {
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, MaskToken::Literal(_))
    }

    pub fn accepts(&self, c: char) -> bool {
        match self {
            MaskToken::Digit => c.is_ascii_digit(),
            MaskToken::Letter => c.is_ascii_alphabetic(),
            MaskToken::Alphanumeric => c.is_ascii_alphanumeric(),
            MaskToken::Literal(l) => *l == c,
        }
    }
}

/// A compiled mask pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPattern {
    tokens: Vec<MaskToken>,
}

impl MaskPattern {
    pub fn parse(pattern: &str) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '0' => MaskToken::Digit,
                'A' => MaskToken::Letter,
                '*' => MaskToken::Alphanumeric,
                '\\' => MaskToken::Literal(chars.next().unwrap_or('\\')),
                other => MaskToken::Literal(other),
            };
            tokens.push(token);
        }
        Self { tokens }
    }

    pub fn tokens(&self) -> &[MaskToken] {
        &self.tokens
    }

    /// Rendered length of the pattern, the longest output `apply` can produce
    pub fn max_length(&self) -> usize {
        self.tokens.len()
    }

    pub fn apply(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let mut input = raw.chars().peekable();
        let mut out = String::with_capacity(self.tokens.len());
        let mut pending = String::new();
        let mut filled = 0usize;

        for token in &self.tokens {
            if let MaskToken::Literal(literal) = token {
                pending.push(*literal);
                if input.peek() == Some(literal) {
                    input.next();
                }
                continue;
            }

            match next_accepted(&mut input, token, filled == 0) {
                Some(c) => {
                    out.push_str(&pending);
                    pending.clear();
                    out.push(c);
                    filled += 1;
                }
                None => {
                    if filled > 0 {
                        out.push_str(&pending);
                    }
                    return out;
                }
            }
        }

        if filled > 0 {
            out.push_str(&pending);
        }
        out
    }

    /// True when `formatted` fills every placeholder and matches every literal
    pub fn is_complete(&self, formatted: &str) -> bool {
        formatted.chars().count() == self.tokens.len()
            && formatted
                .chars()
                .zip(&self.tokens)
                .all(|(c, token)| token.accepts(c))
    }

    /// Anchored regular expression matching a completely filled value
    pub fn regex_source(&self) -> String {
        let mut source = String::from("^");
        for token in &self.tokens {
            match token {
                MaskToken::Digit => source.push_str(r"\d"),
                MaskToken::Letter => source.push_str("[A-Za-z]"),
                MaskToken::Alphanumeric => source.push_str("[A-Za-z0-9]"),
                MaskToken::Literal(c) => source.push_str(&regex::escape(&c.to_string())),
            }
        }
        source.push('$');
        source
    }
}

/// Pulls raw characters until one fits `token`
///
/// Returns `None` when the input runs out, or when `strict` and the next
/// character does not fit (the mismatch is left unconsumed).
fn next_accepted(input: &mut Peekable<Chars<'_>>, token: &MaskToken, strict: bool) -> Option<char> {
    loop {
        let c = *input.peek()?;
        if token.accepts(c) {
            input.next();
            return Some(c);
        }
        if strict {
            return None;
        }
        input.next();
    }
}

/// Mask attribute of a field: a preset name or `{ "type": ..., "pattern": ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskSpec {
    Named(String),
    Config(MaskConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskConfig {
    #[serde(rename = "type")]
    pub mask_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MaskSpec {
    pub fn named(name: impl Into<String>) -> Self {
        MaskSpec::Named(name.into())
    }

    pub fn custom(pattern: impl Into<String>) -> Self {
        MaskSpec::Config(MaskConfig {
            mask_type: "custom".to_string(),
            pattern: Some(pattern.into()),
            extra: Map::new(),
        })
    }

    /// Compiled pattern, `None` when the mask is unknown or incomplete
    pub fn resolve(&self) -> Option<MaskPattern> {
        match self {
            MaskSpec::Named(name) => presets::template(name).map(MaskPattern::parse),
            MaskSpec::Config(config) if config.mask_type == "custom" => config
                .pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(MaskPattern::parse),
            MaskSpec::Config(config) => presets::template(&config.mask_type).map(MaskPattern::parse),
        }
    }

    /// Human-readable reason the mask cannot be resolved
    pub fn problem(&self) -> Option<String> {
        if self.resolve().is_some() {
            return None;
        }
        Some(match self {
            MaskSpec::Named(name) => format!("unknown mask preset '{}'", name),
            MaskSpec::Config(config) if config.mask_type == "custom" => {
                "custom mask has no pattern".to_string()
            }
            MaskSpec::Config(config) => format!("unknown mask type '{}'", config.mask_type),
        })
    }
}

/// Format `raw` with `mask`; a missing or unknown mask is the identity
pub fn apply_mask(raw: &str, mask: Option<&MaskSpec>) -> String {
    match mask.and_then(MaskSpec::resolve) {
        Some(pattern) => pattern.apply(raw),
        None => raw.to_string(),
    }
}

/// Whether `formatted` fills `mask`; always true without a usable mask
pub fn is_complete(formatted: &str, mask: Option<&MaskSpec>) -> bool {
    match mask.and_then(MaskSpec::resolve) {
        Some(pattern) => pattern.is_complete(formatted),
        None => true,
    }
}

pub fn max_length(mask: Option<&MaskSpec>) -> Option<usize> {
    mask.and_then(MaskSpec::resolve).map(|p| p.max_length())
}

pub fn pattern_of(mask: Option<&MaskSpec>) -> Option<String> {
    mask.and_then(MaskSpec::resolve).map(|p| p.regex_source())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> MaskSpec {
        MaskSpec::named("phone")
    }

    #[test]
    fn test_phone_formatting() {
        let mask = phone();
        assert_eq!(apply_mask("5551234567", Some(&mask)), "(555) 123-4567");
        assert_eq!(apply_mask("555", Some(&mask)), "(555) ");
        assert_eq!(apply_mask("5551", Some(&mask)), "(555) 1");
        assert_eq!(apply_mask("55", Some(&mask)), "(55");
    }

    #[test]
    fn test_empty_input_and_identity() {
        assert_eq!(apply_mask("", Some(&phone())), "");
        assert_eq!(apply_mask("anything", None), "anything");
        assert_eq!(apply_mask("anything", Some(&MaskSpec::named("nope"))), "anything");
        assert!(is_complete("anything", None));
    }

    #[test]
    fn test_letters_against_digit_mask_yield_empty() {
        assert_eq!(apply_mask("abc", Some(&phone())), "");
        assert_eq!(apply_mask("abc", Some(&MaskSpec::named("zip"))), "");
    }

    #[test]
    fn test_mismatches_after_first_fill_are_dropped() {
        assert_eq!(apply_mask("555-12x3", Some(&phone())), "(555) 123-");
        assert_eq!(apply_mask("12a345", Some(&MaskSpec::named("zip"))), "12345");
    }

    #[test]
    fn test_overlong_input_is_truncated() {
        let zip = MaskSpec::named("zip");
        assert_eq!(apply_mask("1234567890", Some(&zip)), "12345");
        let formatted = apply_mask("55512345678999", Some(&phone()));
        assert_eq!(formatted, "(555) 123-4567");
        assert_eq!(formatted.len(), max_length(Some(&phone())).unwrap());
    }

    #[test]
    fn test_idempotence_across_presets() {
        let raws = ["5551234567", "555", "5", "12345678901234567890", "55-5 12"];
        for (name, _) in presets::PRESETS {
            let mask = MaskSpec::named(*name);
            for raw in raws {
                let once = apply_mask(raw, Some(&mask));
                let twice = apply_mask(&once, Some(&mask));
                assert_eq!(once, twice, "mask {} raw {:?}", name, raw);
            }
        }
    }

    #[test]
    fn test_custom_pattern() {
        let mask = MaskSpec::custom(r"AA-0000-\A*");
        assert_eq!(apply_mask("ab12349", Some(&mask)), "ab-1234-A9");
        assert!(is_complete("ab-1234-A9", Some(&mask)));
        assert!(!is_complete("ab-1234-B9", Some(&mask)));
        assert_eq!(max_length(Some(&mask)), Some(10));
    }

    #[test]
    fn test_is_complete() {
        let mask = phone();
        assert!(is_complete("(555) 123-4567", Some(&mask)));
        assert!(!is_complete("(555) 123-456", Some(&mask)));
        assert!(!is_complete("(555) ", Some(&mask)));
        assert!(!is_complete("", Some(&mask)));
    }

    #[test]
    fn test_pattern_of_is_anchored_regex() {
        let source = pattern_of(Some(&phone())).unwrap();
        let re = regex::Regex::new(&source).unwrap();
        assert!(re.is_match("(555) 123-4567"));
        assert!(!re.is_match("x(555) 123-4567"));
        assert!(!re.is_match("(555) 123-456"));
    }

    #[test]
    fn test_mask_spec_deserialization() {
        let named: MaskSpec = serde_json::from_str(r#""ssn""#).unwrap();
        assert_eq!(named, MaskSpec::named("ssn"));

        let custom: MaskSpec =
            serde_json::from_str(r#"{"type": "custom", "pattern": "00-00"}"#).unwrap();
        assert_eq!(apply_mask("1234", Some(&custom)), "12-34");

        let typed_preset: MaskSpec = serde_json::from_str(r#"{"type": "time"}"#).unwrap();
        assert_eq!(apply_mask("0930", Some(&typed_preset)), "09:30");

        let broken: MaskSpec = serde_json::from_str(r#"{"type": "custom"}"#).unwrap();
        assert!(broken.problem().is_some());
    }
}
