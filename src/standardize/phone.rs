//! Telephone number standardization (North American numbering by default).

use serde::{Deserialize, Serialize};

/// A parsed, standardized phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardizedPhone {
    /// Input as given.
    pub original: String,
    /// `+1 (555) 123-4567 x12`; empty when no digits were found.
    pub standardized: String,
    /// `1` for NANP numbers; empty otherwise.
    pub country_code: String,
    /// Three-digit area code; empty for bare local numbers.
    pub area_code: String,
    /// Local number without country or area code.
    pub number: String,
    /// Digits after the first `x`.
    pub extension: String,
}

impl StandardizedPhone {
    /// Returns true when no number was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.standardized.is_empty()
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Standardizes a raw phone number.
///
/// Everything after the first `x` is the extension. Ten digits, or eleven
/// starting with `1`, are read as country code 1 plus a three-digit area code.
///
/// ```
/// use entity_resolution::standardize::standardize_phone;
///
/// let phone = standardize_phone("(555) 123-4567 ext. 12");
/// assert_eq!(phone.standardized, "+1 (555) 123-4567 x12");
/// assert_eq!(phone.area_code, "555");
/// ```
#[must_use]
pub fn standardize_phone(raw: &str) -> StandardizedPhone {
    let lowered = raw.to_lowercase();
    let (main, extension) = match lowered.split_once('x') {
        Some((main, ext)) => (digits(main), digits(ext)),
        None => (digits(&lowered), String::new()),
    };

    let mut out = StandardizedPhone {
        original: raw.to_string(),
        ..StandardizedPhone::default()
    };

    let national = match main.len() {
        10 => Some(main.as_str()),
        11 if main.starts_with('1') => Some(&main[1..]),
        _ => None,
    };

    if let Some(national) = national {
        out.country_code = "1".to_string();
        out.area_code = national[..3].to_string();
        out.number = national[3..].to_string();
    } else {
        out.number = main;
    }

    if out.number.is_empty() {
        return out;
    }
    out.extension = extension;

    let mut parts = Vec::with_capacity(4);
    if !out.country_code.is_empty() {
        parts.push(format!("+{}", out.country_code));
    }
    if !out.area_code.is_empty() {
        parts.push(format!("({})", out.area_code));
    }
    if out.number.len() == 7 {
        parts.push(format!("{}-{}", &out.number[..3], &out.number[3..]));
    } else {
        parts.push(out.number.clone());
    }
    if !out.extension.is_empty() {
        parts.push(format!("x{}", out.extension));
    }

    out.standardized = parts.join(" ");
    out
}
