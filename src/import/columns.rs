//! Spreadsheet header resolution.
//!
//! Lead exports name their columns after the form questions, so headers are
//! matched loosely against a fixed candidate list. The list is ordered: a
//! header is consumed by the first candidate it matches, and a field keeps the
//! first header assigned to it.

use std::collections::BTreeMap;

use strsim::jaro_winkler;

use crate::record::Field;

/// Characters trimmed from the end of a header before matching.
const TRAILING_PUNCTUATION: &[char] = &[';', '\u{037E}', '?', ':', '.', '!', '·', '\u{0387}'];

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

struct Candidate {
    column: &'static str,
    field: Field,
    exact: bool,
}

const fn loose(column: &'static str, field: Field) -> Candidate {
    Candidate {
        column,
        field,
        exact: false,
    }
}

const fn exact(column: &'static str, field: Field) -> Candidate {
    Candidate {
        column,
        field,
        exact: true,
    }
}

// Order matters: earlier entries win for headers that match several.
const CANDIDATES: &[Candidate] = &[
    // Ad platforms also export ad_id, form_id, campaign_id...
    exact("id", Field::LeadId),
    exact("lead_id", Field::LeadId),
    // Ahead of form_name, which a bare "name" header would otherwise hit.
    loose("full_name", Field::Name),
    loose("ονοματεπώνυμο", Field::Name),
    loose("created_time", Field::CreatedAt),
    loose("created_at", Field::CreatedAt),
    loose("ημερομηνία_υποβολής", Field::CreatedAt),
    loose("form_name", Field::FormName),
    loose("platform", Field::Platform),
    loose("κατηγορία", Field::Category),
    loose("category", Field::Category),
    loose("ποιος_είναι_ο_κύριος_ρόλος_σου", Field::MainRole),
    loose("κύριος_ρόλος", Field::MainRole),
    loose("main_role", Field::MainRole),
    loose("email", Field::Email),
    loose("e-mail", Field::Email),
    loose("phone_number", Field::Phone),
    loose("phone", Field::Phone),
    loose("τηλέφωνο", Field::Phone),
    loose("σε_ποια_πόλη_ή_περιοχή", Field::Location),
    loose("πόλη", Field::Location),
    loose("location", Field::Location),
    loose("city", Field::Location),
    loose("πες_μας_λίγα_λόγια_για_σένα", Field::Bio),
    loose("βιογραφικό", Field::Bio),
    loose("bio", Field::Bio),
    loose("instagram", Field::Instagram),
    loose("tiktok", Field::Tiktok),
    loose("youtube", Field::Youtube),
    loose("portfolio", Field::Portfolio),
    loose("τι_εξοπλισμό_διαθέτεις", Field::Equipment),
    loose("εξοπλισμός", Field::Equipment),
    loose("equipment", Field::Equipment),
    loose("πόσα_χρόνια_εμπειρίας_έχεις", Field::Experience),
    loose("εμπειρία", Field::Experience),
    loose("experience", Field::Experience),
    loose("πόσους_followers_έχεις", Field::Followers),
    loose("followers", Field::Followers),
];

/// Result of matching a header row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    assigned: BTreeMap<Field, usize>,
    /// Headers that matched no candidate, with their column index
    pub unmapped: Vec<(usize, String)>,
    /// Headers that matched a field some earlier header already took
    pub shadowed: Vec<(usize, String, Field)>,
}

impl ColumnMap {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.assigned.get(&field).copied()
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.assigned.contains_key(&field)
    }

    /// Field assignments in field order.
    pub fn assignments(&self) -> impl Iterator<Item = (Field, usize)> + '_ {
        self.assigned.iter().map(|(field, index)| (*field, *index))
    }

    /// Cell value for `field` in `row`, trimmed, `None` when unmapped or blank.
    pub fn value<'a>(&self, row: &'a [String], field: Field) -> Option<&'a str> {
        let index = self.column(field)?;
        row.get(index)
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
    }
}

/// Lowercase, trim and strip trailing punctuation.
pub fn clean_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_PUNCTUATION.contains(&c))
        .to_string()
}

fn header_matches(header: &str, candidate: &Candidate) -> bool {
    let column = candidate.column;
    if candidate.exact {
        return header == column;
    }
    header == column
        || header.starts_with(column)
        || column.starts_with(header)
        || header.contains(column)
        || column.contains(header)
}

pub fn resolve_headers(headers: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();

    for (index, raw) in headers.iter().enumerate() {
        let header = clean_header(raw);
        if header.is_empty() {
            continue;
        }

        let Some(candidate) = CANDIDATES.iter().find(|c| header_matches(&header, c)) else {
            map.unmapped.push((index, raw.clone()));
            continue;
        };

        if map.assigned.contains_key(&candidate.field) {
            map.shadowed.push((index, raw.clone(), candidate.field));
        } else {
            map.assigned.insert(candidate.field, index);
        }
    }

    map
}

/// Closest known column name for an unmapped header, if any is close enough.
pub fn suggest_column(header: &str) -> Option<&'static str> {
    let cleaned = clean_header(header);
    CANDIDATES
        .iter()
        .map(|c| (c.column, jaro_winkler(&cleaned, c.column)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(column, _)| column)
}
