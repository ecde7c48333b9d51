//! Deterministic fallback extraction.
//!
//! Two rules, kept intentionally literal because callers rely on them as the
//! documented fallback contract:
//! - phone: first North-American number, reformatted as `(AAA) NNN-NNNN`
//! - venue: text after the first `" at "` up to `,`, `.`, or newline, with a
//!   leading "the" stripped

use std::sync::OnceLock;

use maitre_core::VenueContact;
use regex::Regex;

const PHONE_PATTERN: &str =
    r"(?:\+?1[\s.\-]?)?(?:\((\d{3})\)|(\d{3}))[\s.\-]?(\d{3})[\s.\-]?(\d{4})";

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PHONE_PATTERN).expect("phone pattern compiles"))
}

fn at_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i) at ").expect("at pattern compiles"))
}

fn leading_the_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^the\s+").expect("the pattern compiles"))
}

pub fn extract(prompt: &str) -> VenueContact {
    VenueContact { venue_name: venue_name(prompt), venue_phone: phone(prompt) }
}

pub fn phone(text: &str) -> Option<String> {
    let captures = phone_regex().captures(text)?;
    let area = captures.get(1).or_else(|| captures.get(2))?.as_str();
    let prefix = captures.get(3)?.as_str();
    let line = captures.get(4)?.as_str();
    Some(format!("({area}) {prefix}-{line}"))
}

pub fn venue_name(text: &str) -> Option<String> {
    let after_at = at_regex().find(text).map(|m| &text[m.end()..])?;
    let stop = after_at.find(|c| matches!(c, ',' | '.' | '\n')).unwrap_or(after_at.len());
    let candidate = after_at[..stop].trim();
    let name = leading_the_regex().replace(candidate, "").trim().to_string();
    (!name.is_empty()).then_some(name)
}
