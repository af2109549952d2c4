//! Per-field similarity functions.
//!
//! Each field comparison returns `None` when either side has nothing to
//! compare, so absent fields can be left out of the weighted score instead of
//! counting as a mismatch. Every `Some` score lies in [0, 1].

use std::collections::BTreeSet;

use crate::config::MatchingConfig;
use crate::standardize::{split_email, StandardizedAddress, StandardizedName, StandardizedPhone};

/// `1 - distance / max(len1, len2)`, measured in characters.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / max_len as f64
}

/// Jaccard similarity of the lowercase token sets.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn token_jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let set_a: BTreeSet<String> = a.iter().map(|t| t.as_ref().to_lowercase()).collect();
    let set_b: BTreeSet<String> = b.iter().map(|t| t.as_ref().to_lowercase()).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 1.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

/// Best of exact, edit-distance, token-overlap and phonetic agreement.
#[must_use]
pub fn name_similarity(
    a: &StandardizedName,
    b: &StandardizedName,
    config: &MatchingConfig,
) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let mut best: f64 = if a.standardized == b.standardized { 1.0 } else { 0.0 };

    if config.fuzzy_matching_enabled {
        best = best
            .max(levenshtein_similarity(&a.standardized, &b.standardized))
            .max(token_jaccard(&a.tokens, &b.tokens));
    }

    if config.phonetic_matching_enabled {
        if !a.phonetic.is_empty() && a.phonetic == b.phonetic {
            best = best.max(0.8);
        }
        if !a.metaphone.is_empty() && a.metaphone == b.metaphone {
            best = best.max(0.75);
        }
    }

    Some(best)
}

fn both<'a>(a: &'a str, b: &'a str) -> Option<(&'a str, &'a str)> {
    (!a.is_empty() && !b.is_empty()).then_some((a, b))
}

/// Mean over the address components present on both sides.
///
/// State and postal code only contribute when they agree.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn address_similarity(a: &StandardizedAddress, b: &StandardizedAddress) -> Option<f64> {
    let mut scores = Vec::with_capacity(5);

    if let Some((x, y)) = both(&a.street_number, &b.street_number) {
        scores.push(if x == y { 1.0 } else { 0.0 });
    }
    if let Some((x, y)) = both(&a.street_name, &b.street_name) {
        scores.push(levenshtein_similarity(x, y) * 0.8);
    }
    if let Some((x, y)) = both(&a.city, &b.city) {
        scores.push(levenshtein_similarity(x, y) * 0.6);
    }
    if let Some((x, y)) = both(&a.state, &b.state) {
        if x == y {
            scores.push(0.4);
        }
    }
    if let Some((x, y)) = both(&a.postal_code, &b.postal_code) {
        if x == y {
            scores.push(0.7);
        }
    }

    if scores.is_empty() {
        return None;
    }
    Some((scores.iter().sum::<f64>() / scores.len() as f64).clamp(0.0, 1.0))
}

/// Exact, then local-number agreement, then edit distance.
#[must_use]
pub fn phone_similarity(a: &StandardizedPhone, b: &StandardizedPhone) -> Option<f64> {
    let (x, y) = both(&a.standardized, &b.standardized)?;
    if x == y {
        return Some(1.0);
    }
    if !a.number.is_empty() && a.number == b.number {
        return Some(0.9);
    }
    Some(levenshtein_similarity(x, y))
}

/// Exact match, else local-part similarity discounted by domain agreement.
#[must_use]
pub fn email_similarity(a: &str, b: &str) -> Option<f64> {
    let (a, b) = both(a, b)?;
    if a == b {
        return Some(1.0);
    }

    Some(match (split_email(a), split_email(b)) {
        (Some((local_a, domain_a)), Some((local_b, domain_b))) if domain_a == domain_b => {
            levenshtein_similarity(local_a, local_b) * 0.9
        }
        (Some((local_a, domain_a)), Some((local_b, domain_b))) => {
            (levenshtein_similarity(local_a, local_b) + levenshtein_similarity(domain_a, domain_b))
                / 2.0
                * 0.7
        }
        _ => levenshtein_similarity(a, b),
    })
}

/// Case-insensitive, trimmed exact match: 1.0 or 0.0.
#[must_use]
pub fn identifier_similarity(a: &str, b: &str) -> Option<f64> {
    let (a, b) = both(a.trim(), b.trim())?;
    Some(if a.to_lowercase() == b.to_lowercase() { 1.0 } else { 0.0 })
}
