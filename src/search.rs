//! Location normalization and alias expansion.
//!
//! Both sides of a lookup go through here: the importer stores the output of
//! [`build_location_search`] on every record, and the query surface turns the
//! user's term into a single token with [`normalize_query`]. A match is plain
//! array membership between the two.

use crate::translit;

/// Characters replaced by a space before transliteration.
const PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '·', '\u{037E}', '\u{0387}', '\'', '"', '(', ')', '[', ']', '{',
    '}', '/', '\\', '-', '_', '|', '*', '#', '&', '+', '«', '»', '“', '”', '‘', '’',
];

/// Canonical place tokens and the spellings each one expands to.
///
/// Keys are compared against already normalized text, so Greek keys appear in
/// their character-by-character transliteration ("maroysi", not "marousi").
const LOCATION_ALIASES: &[(&str, &[&str])] = &[
    ("athina", &["athina", "athens", "athena"]),
    ("athens", &["athina", "athens", "athena"]),
    ("thessaloniki", &["thessaloniki", "saloniki", "salonica", "thessalonica"]),
    ("saloniki", &["thessaloniki", "saloniki", "salonica", "thessalonica"]),
    ("peiraias", &["peiraias", "piraeus", "pireas"]),
    ("piraeus", &["peiraias", "piraeus", "pireas"]),
    ("patra", &["patra", "patras"]),
    ("irakleio", &["irakleio", "iraklio", "heraklion"]),
    ("iraklio", &["irakleio", "iraklio", "heraklion"]),
    ("heraklion", &["irakleio", "iraklio", "heraklion"]),
    ("kriti", &["kriti", "crete"]),
    ("crete", &["kriti", "crete"]),
    ("chania", &["chania", "hania", "xania"]),
    ("ioannina", &["ioannina", "giannena", "yannena"]),
    ("kerkyra", &["kerkyra", "kerkira", "corfu"]),
    ("corfu", &["kerkyra", "kerkira", "corfu"]),
    ("rodos", &["rodos", "rhodes"]),
    ("rhodes", &["rodos", "rhodes"]),
    ("larisa", &["larisa", "larissa"]),
    ("mykonos", &["mykonos", "mikonos"]),
    ("santorini", &["santorini", "thira", "fira"]),
    ("glyfada", &["glyfada", "glifada"]),
    ("kifisia", &["kifisia", "kifissia"]),
    ("maroysi", &["maroysi", "marousi", "maroussi", "amaroysio"]),
    ("chalkidiki", &["chalkidiki", "halkidiki"]),
    ("kavala", &["kavala", "kavalla"]),
    ("alexandroypoli", &["alexandroypoli", "alexandroupoli", "alexandroupolis"]),
    ("kypros", &["kypros", "cyprus"]),
    ("cyprus", &["kypros", "cyprus"]),
    ("lefkosia", &["lefkosia", "nicosia"]),
    ("nicosia", &["lefkosia", "nicosia"]),
    ("lemesos", &["lemesos", "limassol"]),
    ("limassol", &["lemesos", "limassol"]),
];

/// Normalize text into a canonical search token.
///
/// Lowercases, turns punctuation into spaces, collapses whitespace and
/// transliterates Greek. Running it on its own output is a no-op.
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let spaced: String = lowered
        .chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    translit::transliterate(&collapsed)
}

pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = normalize(trimmed);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Build the `locationSearch` token list for a free-text location.
///
/// The list holds the whole normalized string, each normalized word, and the
/// aliases of every known place the input touches. Order is first-seen;
/// duplicates are dropped. Blank or absent input yields an empty list.
pub fn build_location_search(location: Option<&str>) -> Vec<String> {
    let Some(raw) = location.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    let full = normalize(raw);
    let words: Vec<String> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(normalize)
        .filter(|w| !w.is_empty())
        .collect();

    let mut tokens: Vec<String> = Vec::new();
    push_unique(&mut tokens, &full);
    for word in &words {
        push_unique(&mut tokens, word);
    }

    for (key, aliases) in LOCATION_ALIASES {
        if alias_key_matches(key, &full, &words) {
            for alias in *aliases {
                push_unique(&mut tokens, alias);
            }
        }
    }

    tokens
}

// Deliberately loose: partial input such as "thessal" still expands.
fn alias_key_matches(key: &str, full: &str, words: &[String]) -> bool {
    full.contains(key)
        || words
            .iter()
            .any(|w| w == key || key.contains(w.as_str()) || w.contains(key))
}

fn push_unique(tokens: &mut Vec<String>, token: &str) {
    if !token.is_empty() && !tokens.iter().any(|t| t == token) {
        tokens.push(token.to_string());
    }
}
