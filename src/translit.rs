//! Greek to Latin transliteration.
//!
//! Location text arrives in Greek script, Greeklish or English. This module
//! maps Greek letters to their Latin equivalents one character at a time so
//! that all three spellings meet in the same ASCII token space. Characters
//! outside the table are left untouched.

/// Latin replacement for a single lowercase Greek character.
///
/// Covers the base alphabet, tonos and dialytika forms, and the final sigma.
/// Input is expected to be lowercased already.
pub fn latin_for(c: char) -> Option<&'static str> {
    let mapped = match c {
        'α' | 'ά' => "a",
        'β' => "v",
        'γ' => "g",
        'δ' => "d",
        'ε' | 'έ' => "e",
        'ζ' => "z",
        'η' | 'ή' => "i",
        'θ' => "th",
        'ι' | 'ί' | 'ϊ' | 'ΐ' => "i",
        'κ' => "k",
        'λ' => "l",
        'μ' => "m",
        'ν' => "n",
        'ξ' => "x",
        'ο' | 'ό' => "o",
        'π' => "p",
        'ρ' => "r",
        'σ' | 'ς' => "s",
        'τ' => "t",
        'υ' | 'ύ' | 'ϋ' | 'ΰ' => "y",
        'φ' => "f",
        'χ' => "ch",
        'ψ' => "ps",
        'ω' | 'ώ' => "o",
        _ => return None,
    };
    Some(mapped)
}

/// Transliterate every Greek character in `s`, passing other characters through.
pub fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match latin_for(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// True if any character of `s` has an entry in the transliteration table.
pub fn contains_greek(s: &str) -> bool {
    s.chars().flat_map(char::to_lowercase).any(|c| latin_for(c).is_some())
}
