//! Phonetic codes for names.
//!
//! Both codes are fixed at four characters, padded with `0`, and are empty
//! when the input contains no ASCII letters.

const CODE_LEN: usize = 4;

fn letters(text: &str) -> Vec<u8> {
    text.bytes()
        .filter(u8::is_ascii_alphabetic)
        .map(|b| b.to_ascii_uppercase())
        .collect()
}

fn pad(mut code: String) -> String {
    code.truncate(CODE_LEN);
    while code.len() < CODE_LEN {
        code.push('0');
    }
    code
}

const fn soundex_digit(letter: u8) -> Option<u8> {
    match letter {
        b'B' | b'F' | b'P' | b'V' => Some(b'1'),
        b'C' | b'G' | b'J' | b'K' | b'Q' | b'S' | b'X' | b'Z' => Some(b'2'),
        b'D' | b'T' => Some(b'3'),
        b'L' => Some(b'4'),
        b'M' | b'N' => Some(b'5'),
        b'R' => Some(b'6'),
        _ => None,
    }
}

/// Soundex-style primary code.
///
/// Keeps the first letter, maps the remaining consonants to digit classes
/// (vowels, `H`, `W` and `Y` are skipped), then collapses adjacent repeats.
///
/// ```
/// use entity_resolution::standardize::soundex;
///
/// assert_eq!(soundex("smith"), "S530");
/// assert_eq!(soundex(""), "");
/// ```
#[must_use]
pub fn soundex(text: &str) -> String {
    let letters = letters(text);
    let Some((&first, rest)) = letters.split_first() else {
        return String::new();
    };

    let mut code = vec![first];
    for digit in rest.iter().copied().filter_map(soundex_digit) {
        if code.last() != Some(&digit) {
            code.push(digit);
        }
    }

    pad(String::from_utf8_lossy(&code).into_owned())
}

/// Simplified Metaphone secondary code.
///
/// Rewrites `PH GH CK SCH TH SH CH` (in that order) and drops vowels after
/// the first character.
#[must_use]
pub fn metaphone(text: &str) -> String {
    let letters = letters(text);
    if letters.is_empty() {
        return String::new();
    }

    let mut word = String::from_utf8_lossy(&letters).into_owned();
    for (from, to) in [
        ("PH", "F"),
        ("GH", "F"),
        ("CK", "K"),
        ("SCH", "SK"),
        ("TH", "0"),
        ("SH", "X"),
        ("CH", "X"),
    ] {
        word = word.replace(from, to);
    }

    let mut chars = word.chars();
    let mut code: String = chars.next().into_iter().collect();
    code.extend(chars.filter(|c| !matches!(c, 'A' | 'E' | 'I' | 'O' | 'U')));

    pad(code)
}
