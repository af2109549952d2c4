//! Deterministic normalization of noisy identity fields.
//!
//! Every function here is total and side-effect free: malformed input yields
//! an empty-but-valid result, never an error. Standardizing an already
//! standardized string returns it unchanged.

mod address;
mod email;
mod name;
mod phone;
mod phonetic;
mod tables;

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueMap};

pub use address::{standardize_address, StandardizedAddress};
pub use email::standardize_email;
pub(crate) use email::split_email;
pub use name::{standardize_name, StandardizedName};
pub use phone::{standardize_phone, StandardizedPhone};
pub use phonetic::{metaphone, soundex};

/// Which dedicated standardizer a field key dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// The `email` key.
    Email,
    /// The `phone` key.
    Phone,
    /// The `address` key.
    Address,
    /// Passed through unchanged.
    Other,
}

impl FieldKind {
    /// Classifies a field key, case-insensitively.
    #[must_use]
    pub fn classify(key: &str) -> Self {
        let key = key.trim();
        if key.eq_ignore_ascii_case("email") {
            Self::Email
        } else if key.eq_ignore_ascii_case("phone") {
            Self::Phone
        } else if key.eq_ignore_ascii_case("address") {
            Self::Address
        } else {
            Self::Other
        }
    }

    /// True for the contact fields the matcher scores on their own.
    #[must_use]
    pub const fn is_contact(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// All standardized fields of one observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Standardized name and phonetic codes.
    pub name: StandardizedName,
    /// Parsed address; empty when absent.
    pub address: StandardizedAddress,
    /// Parsed phone; empty when absent.
    pub phone: StandardizedPhone,
    /// Canonical email; empty when absent.
    pub email: String,
}

/// Stateless entry point over the individual standardizers.
///
/// # Examples
///
/// ```
/// use entity_resolution::standardize::Standardizer;
/// use entity_resolution::{Value, ValueMap};
///
/// let mut ids = ValueMap::new();
/// ids.insert("email".into(), Value::from("Jane.Doe@Example.com"));
/// ids.insert("ssn".into(), Value::from("123-45-6789"));
///
/// let std = Standardizer::new().identifiers(&ids);
/// assert_eq!(std["email"], Value::from("jane.doe@example.com"));
/// assert_eq!(std["ssn"], Value::from("123-45-6789"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Standardizer;

impl Standardizer {
    /// Creates a standardizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Standardizes a personal or organization name.
    #[must_use]
    pub fn name(&self, raw: &str) -> StandardizedName {
        standardize_name(raw)
    }

    /// Parses and standardizes a postal address.
    #[must_use]
    pub fn address(&self, raw: &str) -> StandardizedAddress {
        standardize_address(raw)
    }

    /// Parses and formats a phone number.
    #[must_use]
    pub fn phone(&self, raw: &str) -> StandardizedPhone {
        standardize_phone(raw)
    }

    /// Canonicalizes an email address.
    #[must_use]
    pub fn email(&self, raw: &str) -> String {
        standardize_email(raw)
    }

    /// Standardizes one field value according to its key.
    ///
    /// Only string values of contact keys change; a contact value that
    /// standardizes to nothing is kept as given.
    #[must_use]
    pub fn field(&self, key: &str, value: &Value) -> Value {
        let Some(raw) = value.as_str() else {
            return value.clone();
        };

        let standardized = match FieldKind::classify(key) {
            FieldKind::Email => self.email(raw),
            FieldKind::Phone => self.phone(raw).standardized,
            FieldKind::Address => self.address(raw).standardized,
            FieldKind::Other => return value.clone(),
        };

        if standardized.is_empty() {
            value.clone()
        } else {
            Value::String(standardized)
        }
    }

    /// Standardizes every field of an identifier or attribute map.
    #[must_use]
    pub fn identifiers(&self, fields: &ValueMap) -> ValueMap {
        fields
            .iter()
            .map(|(key, value)| (key.clone(), self.field(key, value)))
            .collect()
    }

    /// Builds the full normalized record for an observation.
    ///
    /// Contact fields are looked up in `identifiers` first, then `attributes`.
    #[must_use]
    pub fn record(&self, name: &str, identifiers: &ValueMap, attributes: &ValueMap) -> NormalizedRecord {
        let lookup = |kind: FieldKind| {
            identifiers
                .iter()
                .chain(attributes.iter())
                .find(|(key, value)| FieldKind::classify(key) == kind && value.is_string())
                .and_then(|(_, value)| value.as_str())
                .unwrap_or_default()
        };

        NormalizedRecord {
            name: self.name(name),
            address: self.address(lookup(FieldKind::Address)),
            phone: self.phone(lookup(FieldKind::Phone)),
            email: self.email(lookup(FieldKind::Email)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_field_kind_classify() {
        assert_eq!(FieldKind::classify("Email"), FieldKind::Email);
        assert_eq!(FieldKind::classify(" phone "), FieldKind::Phone);
        assert_eq!(FieldKind::classify("ADDRESS"), FieldKind::Address);
        assert_eq!(FieldKind::classify("ssn"), FieldKind::Other);
        assert!(!FieldKind::Other.is_contact());
    }

    #[test]
    fn test_identifiers_dispatch_per_key() {
        let mut ids = ValueMap::new();
        ids.insert("phone".into(), Value::from("555-123-4567"));
        ids.insert("address".into(), Value::from("1 Main St Springfield IL"));
        ids.insert("account".into(), Value::Int(42));
        ids.insert("email".into(), Value::Int(7));

        let std = Standardizer::new().identifiers(&ids);
        assert_eq!(std["phone"], Value::from("+1 (555) 123-4567"));
        assert_eq!(std["address"], Value::from("1 main street Springfield IL US"));
        assert_eq!(std["account"], Value::Int(42));
        assert_eq!(std["email"], Value::Int(7));
    }

    #[test]
    fn test_unparseable_contact_value_kept() {
        let std = Standardizer::new().field("phone", &Value::from("unknown"));
        assert_eq!(std, Value::from("unknown"));
    }

    #[test]
    fn test_record_prefers_identifiers_over_attributes() {
        let mut ids = ValueMap::new();
        ids.insert("email".into(), Value::from("A@X.com"));
        let mut attrs = ValueMap::new();
        attrs.insert("email".into(), Value::from("b@y.com"));
        attrs.insert("phone".into(), Value::from("5551234567"));

        let record = Standardizer::new().record("Jane Doe", &ids, &attrs);
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.phone.standardized, "+1 (555) 123-4567");
        assert_eq!(record.name.standardized, "jane doe");
        assert!(record.address.is_empty());
    }

    #[test]
    fn test_empty_record_is_valid() {
        let record = Standardizer::new().record("", &ValueMap::new(), &ValueMap::new());
        assert_eq!(record, NormalizedRecord::default());
    }

    #[test]
    fn test_identifiers_idempotent() {
        let mut ids = ValueMap::new();
        ids.insert("email".into(), Value::from("J.Doe+x@gmail.com"));
        ids.insert("phone".into(), Value::from("(555) 123-4567"));
        ids.insert("address".into(), Value::from("9 Elm Rd Albany New York"));

        let s = Standardizer::new();
        let once = s.identifiers(&ids);
        assert_eq!(s.identifiers(&once), once);
    }
}
