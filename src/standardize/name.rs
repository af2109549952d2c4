//! Person and organization name standardization.

use serde::{Deserialize, Serialize};

use super::phonetic::{metaphone, soundex};
use super::tables::{is_stopword, is_title, name_alias};

/// A standardized name plus its phonetic codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardizedName {
    /// Input as given.
    pub original: String,
    /// Lowercased, alias-mapped name.
    pub standardized: String,
    /// Post-alias tokens, in input order.
    pub tokens: Vec<String>,
    /// Soundex code of the standardized name.
    pub phonetic: String,
    /// Simplified Metaphone code of the standardized name.
    pub metaphone: String,
}

impl StandardizedName {
    /// Returns true when nothing survived standardization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.standardized.is_empty()
    }
}

fn keep_name_char(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '\''
}

/// Standardizes a raw name.
///
/// Lowercases, strips punctuation other than `-` and `'`, drops titles and
/// stopwords and maps each remaining token through the alias table.
///
/// ```
/// use entity_resolution::standardize::standardize_name;
///
/// let name = standardize_name("Dr. Robert J. O'Brien");
/// assert_eq!(name.standardized, "bob j o'brien");
/// assert_eq!(name.tokens, ["bob", "j", "o'brien"]);
/// ```
#[must_use]
pub fn standardize_name(raw: &str) -> StandardizedName {
    let cleaned: String = raw.to_lowercase().chars().filter(|&c| keep_name_char(c)).collect();

    let tokens: Vec<String> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .filter(|t| !is_title(t) && !is_stopword(t))
        .map(|t| name_alias(t).unwrap_or(t).to_string())
        .collect();

    let standardized = tokens.join(" ");

    StandardizedName {
        original: raw.to_string(),
        phonetic: soundex(&standardized),
        metaphone: metaphone(&standardized),
        standardized,
        tokens,
    }
}
