//! Fixed lookup tables used by the standardizers.

/// Honorifics and generational suffixes dropped from names.
pub(crate) fn is_title(token: &str) -> bool {
    matches!(
        token,
        "mr" | "mrs"
            | "ms"
            | "miss"
            | "dr"
            | "prof"
            | "sir"
            | "madam"
            | "lord"
            | "lady"
            | "jr"
            | "sr"
            | "ii"
            | "iii"
            | "iv"
    )
}

/// English function words that carry no identity signal in a name.
pub(crate) fn is_stopword(token: &str) -> bool {
    matches!(
        token,
        "a" | "an" | "and" | "the" | "of" | "for" | "at" | "by" | "in" | "on" | "to" | "with"
    )
}

/// Given-name variants and corporate suffixes. Outputs are never keys, so
/// mapping twice is a no-op.
pub(crate) fn name_alias(token: &str) -> Option<&'static str> {
    Some(match token {
        "william" => "bill",
        "robert" => "bob",
        "richard" => "dick",
        "michael" => "mike",
        "christopher" => "chris",
        "matthew" => "matt",
        "andrew" => "andy",
        "anthony" => "tony",
        "joseph" => "joe",
        "david" => "dave",
        "james" => "jim",
        "john" => "jack",
        "corporation" => "corp",
        "company" => "co",
        "incorporated" => "inc",
        "limited" => "ltd",
        _ => return None,
    })
}

/// Street-type and unit abbreviations.
pub(crate) fn expand_address_abbreviation(token: &str) -> Option<&'static str> {
    Some(match token {
        "st" => "street",
        "ave" | "av" => "avenue",
        "blvd" => "boulevard",
        "rd" => "road",
        "dr" => "drive",
        "ln" => "lane",
        "ct" => "court",
        "pl" => "place",
        "cir" => "circle",
        "pkwy" => "parkway",
        "hwy" => "highway",
        "apt" => "apartment",
        "ste" => "suite",
        "bldg" => "building",
        "fl" => "floor",
        _ => return None,
    })
}

/// Keywords recognized as the street type once abbreviations are expanded.
pub(crate) fn is_street_type(token: &str) -> bool {
    matches!(
        token,
        "street"
            | "avenue"
            | "boulevard"
            | "road"
            | "drive"
            | "lane"
            | "court"
            | "place"
            | "circle"
            | "way"
            | "parkway"
            | "highway"
    )
}

const STATES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("district of columbia", "DC"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

/// Maps a lowercase two-letter code or full state name to its upper-case code.
pub(crate) fn state_code(phrase: &str) -> Option<&'static str> {
    STATES.iter().find_map(|&(name, code)| {
        (name == phrase || (phrase.len() == 2 && code.eq_ignore_ascii_case(phrase))).then_some(code)
    })
}

/// Maps a lowercase country name (or unambiguous ISO code) to its ISO code.
///
/// `ca` is absent: a trailing `ca` is California.
pub(crate) fn country_code(phrase: &str) -> Option<&'static str> {
    Some(match phrase {
        "us" | "usa" | "united states" | "united states of america" | "america" => "US",
        "canada" => "CA",
        "gb" | "uk" | "united kingdom" | "great britain" | "england" => "GB",
        _ => return None,
    })
}

/// Country as written in a standardized address string; must re-parse to `code`.
pub(crate) fn country_label(code: &str) -> &str {
    match code {
        "CA" => "CANADA",
        other => other,
    }
}

/// Longest multi-word phrase in the state and country tables.
pub(crate) const MAX_PLACE_WORDS: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_idempotent() {
        for token in ["william", "robert", "corporation", "incorporated", "john"] {
            let once = name_alias(token).unwrap();
            assert!(name_alias(once).is_none(), "{once} must not be an alias key");
            assert!(!is_title(once) && !is_stopword(once));
        }
    }

    #[test]
    fn state_lookup() {
        assert_eq!(state_code("il"), Some("IL"));
        assert_eq!(state_code("new york"), Some("NY"));
        assert_eq!(state_code("xx"), None);
        assert_eq!(state_code("street"), None);
    }

    #[test]
    fn country_labels_reparse() {
        for code in ["US", "CA", "GB"] {
            assert_eq!(
                country_code(&country_label(code).to_ascii_lowercase()),
                Some(code)
            );
        }
    }
}
