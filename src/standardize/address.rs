//! Postal address standardization.
//!
//! Components are peeled off the tail first (country, postal code, state),
//! then abbreviations are expanded and the street number and street type are
//! taken. Whatever is left splits into street name and city.
//!
//! A trailing `ct` or `fl` is both a state code and a street abbreviation.
//! It is read as a state only when a street and a city would still remain.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tables::{
    country_code, country_label, expand_address_abbreviation, is_street_type, state_code,
    MAX_PLACE_WORDS,
};

const DEFAULT_COUNTRY: &str = "US";

static POSTAL_CODE: OnceLock<Regex> = OnceLock::new();
static STREET_NUMBER: OnceLock<Regex> = OnceLock::new();

fn postal_code_re() -> &'static Regex {
    POSTAL_CODE.get_or_init(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("valid postal code pattern"))
}

fn street_number_re() -> &'static Regex {
    STREET_NUMBER.get_or_init(|| Regex::new(r"^\d+[a-z]?$").expect("valid street number pattern"))
}

/// A parsed, standardized address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardizedAddress {
    /// Input as given.
    pub original: String,
    /// Canonical single-line form.
    pub standardized: String,
    /// Leading house number, such as `123` or `12b`.
    pub street_number: String,
    /// Street name without number or type.
    pub street_name: String,
    /// Expanded street type, such as `street`.
    pub street_type: String,
    /// Title-cased.
    pub city: String,
    /// Upper-case two-letter code.
    pub state: String,
    /// Five-digit or ZIP+4 postal code.
    pub postal_code: String,
    /// ISO code; `US` unless a known country name was present.
    pub country: String,
}

impl StandardizedAddress {
    /// Returns true when nothing survived standardization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.standardized.is_empty()
    }

    fn render(&self) -> String {
        [
            self.street_number.as_str(),
            self.street_name.as_str(),
            self.street_type.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            country_label(&self.country),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Removes the longest trailing phrase (up to [`MAX_PLACE_WORDS`] tokens)
/// that `lookup` recognizes.
fn take_tail_phrase(
    tokens: &mut Vec<String>,
    lookup: impl Fn(&str) -> Option<&'static str>,
) -> Option<&'static str> {
    let max = MAX_PLACE_WORDS.min(tokens.len());
    for width in (1..=max).rev() {
        let start = tokens.len() - width;
        if let Some(code) = lookup(&tokens[start..].join(" ")) {
            tokens.truncate(start);
            return Some(code);
        }
    }
    None
}

/// Takes a trailing state, unless the token is a street abbreviation
/// that would leave no city behind (`5 Oak Ct`).
fn take_state(tokens: &mut Vec<String>) -> Option<&'static str> {
    if tokens.last().is_some_and(|t| expand_address_abbreviation(t).is_some()) {
        let numbered = tokens.first().is_some_and(|t| street_number_re().is_match(t));
        let place_words = tokens.len() - 1 - usize::from(numbered);
        if place_words < 2 {
            return None;
        }
    }
    take_tail_phrase(tokens, state_code)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

/// Standardizes a raw address string.
///
/// ```
/// use entity_resolution::standardize::standardize_address;
///
/// let addr = standardize_address("123 Main St., Springfield, IL 62704");
/// assert_eq!(addr.street_number, "123");
/// assert_eq!(addr.street_type, "street");
/// assert_eq!(addr.city, "Springfield");
/// assert_eq!(addr.state, "IL");
/// assert_eq!(addr.standardized, "123 main street Springfield IL 62704 US");
/// ```
#[must_use]
pub fn standardize_address(raw: &str) -> StandardizedAddress {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();

    let mut tokens: Vec<String> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect();

    let mut out = StandardizedAddress {
        original: raw.to_string(),
        ..StandardizedAddress::default()
    };
    if tokens.is_empty() {
        return out;
    }

    out.country = take_tail_phrase(&mut tokens, country_code)
        .unwrap_or(DEFAULT_COUNTRY)
        .to_string();

    if tokens.last().is_some_and(|t| postal_code_re().is_match(t)) {
        out.postal_code = tokens.pop().unwrap_or_default();
    }

    if let Some(code) = take_state(&mut tokens) {
        out.state = code.to_string();
    }

    for token in &mut tokens {
        if let Some(full) = expand_address_abbreviation(token) {
            *token = full.to_string();
        }
    }

    if tokens.first().is_some_and(|t| street_number_re().is_match(t)) {
        out.street_number = tokens.remove(0);
    }

    if let Some(pos) = tokens.iter().rposition(|t| is_street_type(t)) {
        out.street_type = tokens.remove(pos);
    }

    if let Some((city, street)) = tokens.split_last() {
        if street.is_empty() {
            out.street_name = city.clone();
        } else {
            out.street_name = street.join(" ");
            out.city = title_case(city);
        }
    }

    out.standardized = out.render();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_address() {
        let addr = standardize_address("456 Oak Avenue Apt 4B, Boston, Massachusetts 02101-1234, USA");
        assert_eq!(addr.street_number, "456");
        assert_eq!(addr.street_type, "avenue");
        assert_eq!(addr.street_name, "oak apartment 4b");
        assert_eq!(addr.city, "Boston");
        assert_eq!(addr.state, "MA");
        assert_eq!(addr.postal_code, "02101-1234");
        assert_eq!(addr.country, "US");
    }

    #[test]
    fn test_two_word_state_name() {
        let addr = standardize_address("9 Elm Rd Albany New York");
        assert_eq!(addr.state, "NY");
        assert_eq!(addr.city, "Albany");
        assert_eq!(addr.street_name, "elm");
        assert_eq!(addr.street_type, "road");
    }

    #[test]
    fn test_two_remaining_tokens_split_one_to_one() {
        let addr = standardize_address("12 Maple Springfield");
        assert_eq!(addr.street_name, "maple");
        assert_eq!(addr.city, "Springfield");
    }

    #[test]
    fn test_single_remaining_token_is_street_name() {
        let addr = standardize_address("77 Sunset Blvd");
        assert_eq!(addr.street_name, "sunset");
        assert_eq!(addr.street_type, "boulevard");
        assert!(addr.city.is_empty());
    }

    #[test]
    fn test_trailing_abbreviation_without_city_is_street_type() {
        let court = standardize_address("5 Oak Ct");
        assert_eq!(court.street_type, "court");
        assert_eq!(court.street_name, "oak");
        assert!(court.state.is_empty());
        assert_eq!(court.standardized, "5 oak court US");

        let floor = standardize_address("12 Harbor Fl");
        assert_eq!(floor.street_number, "12");
        assert!(floor.state.is_empty());
        assert!(floor.standardized.contains("Floor"));
    }

    #[test]
    fn test_trailing_abbreviation_after_city_is_state() {
        let addr = standardize_address("10 Court Street Hartford CT");
        assert_eq!(addr.state, "CT");
        assert_eq!(addr.city, "Hartford");
        assert_eq!(addr.street_name, "court");

        let fl = standardize_address("3 Palm Way Miami Fl");
        assert_eq!(fl.state, "FL");
        assert_eq!(fl.city, "Miami");
    }

    #[test]
    fn test_country_other_than_us() {
        let addr = standardize_address("1 Bay Street Toronto Canada");
        assert_eq!(addr.country, "CA");
        assert_eq!(addr.standardized, "1 bay street Toronto CANADA");
        assert_eq!(standardize_address(&addr.standardized).country, "CA");
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert!(standardize_address("").is_empty());
        let punct = standardize_address(" , . # ");
        assert!(punct.is_empty());
        assert!(punct.country.is_empty());
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "123 Main St., Springfield, IL 62704",
            "456 Oak Avenue Apt 4B, Boston, Massachusetts 02101-1234, USA",
            "10 Court Street Hartford CT",
            "5 Oak Ct",
            "77 Sunset Blvd",
            "1 Bay Street Toronto Canada",
            "PO Box 12",
            "",
        ] {
            let once = standardize_address(raw);
            let twice = standardize_address(&once.standardized);
            assert_eq!(once.standardized, twice.standardized, "input {raw:?}");
            assert_eq!(once.city, twice.city);
            assert_eq!(once.state, twice.state);
        }
    }
}
