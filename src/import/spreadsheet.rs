use std::collections::BTreeMap;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::columns::ColumnMap;
use super::sheet::Table;
use crate::record::{Category, Field, ProfessionalRecord};
use crate::remote::{DocumentStore, WriteOp};
use crate::search;

/// Prefix of keys derived from row contents rather than a lead id.
const DERIVED_KEY_PREFIX: &str = "lead_";
/// Hex characters of the digest kept in a derived key.
const DERIVED_KEY_HEX_LEN: usize = 20;
const KEY_PART_SEPARATOR: &str = "|";
/// Characters that are not safe inside a document key.
const UNSAFE_KEY_CHARS: &[char] = &['/', '\\', '.', '#', '$', '[', ']'];

const INFLUENCER_KEYWORDS: &[&str] = &["influencer", "content creator", "ugc"];
const VIDEOGRAPHER_KEYWORDS: &[&str] = &["videographer", "videograph", "vinteograf", "cameraman", "kameraman"];
const EDITOR_KEYWORDS: &[&str] = &["editor", "montaz", "monter"];
const MODEL_KEYWORDS: &[&str] = &["model", "montelo"];

/// Records built from a table, plus what was left out.
#[derive(Debug, Default)]
pub struct BuiltRecords {
    pub records: Vec<ProfessionalRecord>,
    /// Data rows dropped as blank
    pub skipped_blank: usize,
}

/// Result of an upload
#[derive(Debug, Default, PartialEq)]
pub struct UploadResult {
    pub written: usize,
    pub batches: usize,
}

/// Turn every data row of `table` into a record.
pub fn build_records(
    table: &Table,
    columns: &ColumnMap,
    category_override: Option<Category>,
) -> BuiltRecords {
    let mut built = BuiltRecords::default();
    for row in &table.rows {
        match record_from_row(row, columns, category_override) {
            Some(record) => built.records.push(record),
            None => built.skipped_blank += 1,
        }
    }
    built
}

/// Build one record, or `None` for a blank row.
///
/// A row is blank when name, location and the raw category cell are all
/// empty; an override category does not rescue it.
pub fn record_from_row(
    row: &[String],
    columns: &ColumnMap,
    category_override: Option<Category>,
) -> Option<ProfessionalRecord> {
    let name = columns.value(row, Field::Name).unwrap_or_default();
    let location = columns.value(row, Field::Location).unwrap_or_default();
    let raw_category = columns.value(row, Field::Category).unwrap_or_default();

    if name.is_empty() && location.is_empty() && raw_category.is_empty() {
        return None;
    }

    let category = match category_override {
        Some(category) => category.as_str().to_string(),
        None => derive_category(
            raw_category,
            columns.value(row, Field::MainRole).unwrap_or_default(),
            columns.value(row, Field::FormName).unwrap_or_default(),
        ),
    };

    let mut details = BTreeMap::new();
    for (field, _) in columns.assignments() {
        if matches!(field, Field::Name | Field::Location | Field::Category) {
            continue;
        }
        if let Some(value) = columns.value(row, field) {
            details.insert(field, value.to_string());
        }
    }

    let id = match details.get(&Field::LeadId) {
        Some(lead_id) => sanitize_key(lead_id),
        None => derived_key(
            details.get(&Field::CreatedAt).map(String::as_str).unwrap_or(""),
            details.get(&Field::Email).map(String::as_str).unwrap_or(""),
            name,
        ),
    };

    Some(ProfessionalRecord {
        id: Some(id).filter(|id| !id.is_empty()),
        category,
        name: name.to_string(),
        location: location.to_string(),
        location_search: search::build_location_search(Some(location)),
        details,
    })
}

/// Classify a row from its category cell, main role and form name.
///
/// Influencer beats everything. A main role naming both videographer and
/// editor counts as videographer.
pub fn derive_category(raw_category: &str, main_role: &str, form_name: &str) -> String {
    let category = search::normalize(raw_category);
    let role = search::normalize(main_role);
    let form = search::normalize(form_name);

    let mentions = |text: &str, keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    let role_video = mentions(&role, VIDEOGRAPHER_KEYWORDS);
    let role_editor = mentions(&role, EDITOR_KEYWORDS);

    let chosen = if [&category, &role, &form]
        .iter()
        .any(|s| mentions(s, INFLUENCER_KEYWORDS))
    {
        Some(Category::Influencer)
    } else if mentions(&category, VIDEOGRAPHER_KEYWORDS)
        || mentions(&form, VIDEOGRAPHER_KEYWORDS)
        || (role_video && !role_editor)
    {
        Some(Category::Videographer)
    } else if mentions(&category, EDITOR_KEYWORDS)
        || mentions(&form, EDITOR_KEYWORDS)
        || (role_editor && !role_video)
    {
        Some(Category::Editor)
    } else if role_video && role_editor {
        Some(Category::Videographer)
    } else if mentions(&category, MODEL_KEYWORDS) {
        Some(Category::Model)
    } else {
        None
    };

    match chosen {
        Some(category) => category.as_str().to_string(),
        None => {
            let raw = raw_category.trim().to_lowercase();
            if raw.is_empty() {
                Category::Videographer.as_str().to_string()
            } else {
                raw
            }
        }
    }
}

/// Replace characters that cannot appear in a document key.
pub fn sanitize_key(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if UNSAFE_KEY_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Stable key for rows without a lead id: same createdAt, email and name,
/// same key.
pub fn derived_key(created_at: &str, email: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(created_at.as_bytes());
    hasher.update(KEY_PART_SEPARATOR.as_bytes());
    hasher.update(email.as_bytes());
    hasher.update(KEY_PART_SEPARATOR.as_bytes());
    hasher.update(name.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", DERIVED_KEY_PREFIX, &digest[..DERIVED_KEY_HEX_LEN])
}

fn to_write(record: &ProfessionalRecord, now: OffsetDateTime) -> WriteOp {
    let fields = record.to_fields(now);
    match &record.id {
        Some(id) => WriteOp::Upsert {
            id: id.clone(),
            fields,
        },
        None => WriteOp::Insert { fields },
    }
}

/// Write records in sequential batches of `batch_size`.
///
/// Each batch is one atomic commit; the first failing commit aborts the run.
pub fn upload(
    store: &dyn DocumentStore,
    records: &[ProfessionalRecord],
    batch_size: usize,
    show_progress: bool,
) -> Result<UploadResult> {
    let batch_size = batch_size.max(1);
    let now = OffsetDateTime::now_utc();
    let mut result = UploadResult::default();

    let pb = if show_progress {
        create_progress_bar(records.len() as u64, "Uploading")
    } else {
        ProgressBar::hidden()
    };

    for (index, chunk) in records.chunks(batch_size).enumerate() {
        let writes: Vec<WriteOp> = chunk.iter().map(|r| to_write(r, now)).collect();
        store.commit(&writes).with_context(|| {
            format!(
                "batch {} failed after {} record(s) were written",
                index + 1,
                result.written
            )
        })?;
        result.written += chunk.len();
        result.batches += 1;
        pb.inc(chunk.len() as u64);
        tracing::debug!(batch = index + 1, size = chunk.len(), "committed batch");
    }

    pb.finish_with_message("Upload complete");
    Ok(result)
}

fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::columns::resolve_headers;
    use crate::record::LOCATION_SEARCH_KEY;
    use crate::remote::memory::MemoryStore;
    use crate::remote::{FieldValue, LocationQuery};

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: &[&[&str]]) -> Table {
        Table::from_rows(rows.iter().map(|r| strings(r)).collect()).unwrap()
    }

    const HEADERS: &[&str] = &[
        "id",
        "created_time",
        "form_name",
        "κατηγορία",
        "ποιος_είναι_ο_κύριος_ρόλος_σου;",
        "full_name",
        "email",
        "σε_ποια_πόλη_ή_περιοχή;",
        "instagram",
    ];

    #[test]
    fn test_derive_category_tie_break() {
        assert_eq!(derive_category("", "videographer, editor", ""), "videographer");
    }

    #[test]
    fn test_derive_category_order() {
        assert_eq!(derive_category("videographer", "influencer", ""), "influencer");
        assert_eq!(derive_category("", "", "Influencers Form"), "influencer");
        assert_eq!(derive_category("", "Video editor", ""), "editor");
        assert_eq!(derive_category("Editor", "", "Videographers form"), "videographer");
        assert_eq!(derive_category("Μοντέλο", "", ""), "model");
        assert_eq!(derive_category("", "Βιντεογράφος", ""), "videographer");
        assert_eq!(derive_category("", "Μοντάζ", ""), "editor");
    }

    #[test]
    fn test_derive_category_fallbacks() {
        assert_eq!(derive_category(" Photographer ", "", ""), "photographer");
        assert_eq!(derive_category("", "", ""), "videographer");
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("abc/def"), "abc_def");
        assert_eq!(sanitize_key(" l:1.2#3 "), "l:1_2_3");
    }

    #[test]
    fn test_derived_key_is_stable() {
        let a = derived_key("2026-03-01", "eleni@example.com", "Eleni K");
        let b = derived_key("2026-03-01", "eleni@example.com", "Eleni K");
        let c = derived_key("2026-03-01", "eleni@example.com", "Eleni P");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("lead_"));
        assert_eq!(a.len(), "lead_".len() + 20);
        assert!(a["lead_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_derived_key_separates_parts() {
        assert_ne!(derived_key("a", "b", "c"), derived_key("ab", "", "c"));
    }

    #[test]
    fn test_record_from_row_with_lead_id() {
        let t = table(&[
            HEADERS,
            &["abc/def", "2026-03-01", "", "", "", "Eleni K", "", "Πάτρα", " @eleni "],
        ]);
        let columns = resolve_headers(&t.headers);
        let record = record_from_row(&t.rows[0], &columns, None).unwrap();

        assert_eq!(record.id.as_deref(), Some("abc_def"));
        assert_eq!(record.detail(Field::LeadId), Some("abc/def"));
        assert_eq!(record.location, "Πάτρα");
        assert_eq!(record.location_search, vec!["patra", "patras"]);
        assert_eq!(record.detail(Field::Instagram), Some("@eleni"));
        assert_eq!(record.detail(Field::Email), None);
        assert_eq!(record.category, "videographer");
    }

    #[test]
    fn test_record_from_row_without_id_uses_derived_key() {
        let t = table(&[
            HEADERS,
            &["", "2026-03-01", "", "model", "", "Maria", "maria@example.com", "", ""],
        ]);
        let columns = resolve_headers(&t.headers);
        let record = record_from_row(&t.rows[0], &columns, None).unwrap();

        assert_eq!(
            record.id,
            Some(derived_key("2026-03-01", "maria@example.com", "Maria"))
        );
        assert_eq!(record.category, "model");
        assert_eq!(record.location, "");
        assert!(record.location_search.is_empty());
    }

    #[test]
    fn test_blank_row_dropped() {
        let t = table(&[
            HEADERS,
            &["", "", "", "", "", "", "", "", ""],
            &["", "2026-03-01", "", "", "", "", "x@y.gr", "", ""],
            &["", "", "", "", "", "Nikos", "", "", ""],
        ]);
        let columns = resolve_headers(&t.headers);
        let built = build_records(&t, &columns, None);
        assert_eq!(built.records.len(), 1);
        assert_eq!(built.skipped_blank, 2);
        assert_eq!(built.records[0].name, "Nikos");
    }

    #[test]
    fn test_category_override() {
        let t = table(&[
            HEADERS,
            &["", "", "", "", "videographer, editor", "Nikos", "", "Αθήνα", ""],
        ]);
        let columns = resolve_headers(&t.headers);
        let built = build_records(&t, &columns, Some(Category::Influencer));
        assert_eq!(built.records[0].category, "influencer");
    }

    #[test]
    fn test_main_role_tie_break_through_row() {
        let t = table(&[
            HEADERS,
            &["", "", "", "", "videographer, editor", "Nikos", "", "Αθήνα", ""],
        ]);
        let columns = resolve_headers(&t.headers);
        let record = record_from_row(&t.rows[0], &columns, None).unwrap();
        assert_eq!(record.category, "videographer");
        assert_eq!(record.detail(Field::MainRole), Some("videographer, editor"));
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let t = table(&[
            HEADERS,
            &["", "2026-03-01", "", "", "", "Maria", "maria@example.com", "Θεσσαλονίκη", ""],
            &["77", "2026-03-02", "", "", "", "Kostas", "", "Αθήνα", ""],
        ]);
        let columns = resolve_headers(&t.headers);
        let store = MemoryStore::new();

        for _ in 0..2 {
            let built = build_records(&t, &columns, None);
            upload(&store, &built.records, 400, false).unwrap();
        }

        assert_eq!(store.len(), 2);
        assert!(store.get("77").is_some());
        let hits = store
            .query(&LocationQuery {
                category: "videographer".to_string(),
                token: "salonica".to_string(),
                limit: 10,
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text("name"), "Maria");
    }

    #[test]
    fn test_upsert_merges_existing_fields() {
        let store = MemoryStore::new();
        let mut existing = crate::remote::Fields::new();
        existing.insert("notes".to_string(), FieldValue::String("booked twice".to_string()));
        existing.insert("name".to_string(), FieldValue::String("old".to_string()));
        store.put("77", existing);

        let t = table(&[HEADERS, &["77", "", "", "", "", "Kostas", "", "Αθήνα", ""]]);
        let columns = resolve_headers(&t.headers);
        let built = build_records(&t, &columns, None);
        upload(&store, &built.records, 400, false).unwrap();

        let doc = store.get("77").unwrap();
        assert_eq!(doc.get("notes"), Some(&FieldValue::String("booked twice".to_string())));
        assert_eq!(doc.get("name"), Some(&FieldValue::String("Kostas".to_string())));
        assert!(doc.contains_key(LOCATION_SEARCH_KEY));
    }

    #[test]
    fn test_upload_batches() {
        let records: Vec<ProfessionalRecord> = (0..5)
            .map(|i| ProfessionalRecord {
                id: Some(format!("r{i}")),
                category: "editor".to_string(),
                name: format!("n{i}"),
                location: String::new(),
                location_search: Vec::new(),
                details: BTreeMap::new(),
            })
            .collect();
        let store = MemoryStore::new();
        let result = upload(&store, &records, 2, false).unwrap();
        assert_eq!(result, UploadResult { written: 5, batches: 3 });
        assert_eq!(store.commits(), 3);
    }

    #[test]
    fn test_record_without_key_is_inserted() {
        let record = ProfessionalRecord {
            id: None,
            category: "editor".to_string(),
            name: "Anon".to_string(),
            location: String::new(),
            location_search: Vec::new(),
            details: BTreeMap::new(),
        };
        let store = MemoryStore::new();
        upload(&store, &[record.clone(), record], 10, false).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failed_batch_aborts() {
        let records: Vec<ProfessionalRecord> = (0..4)
            .map(|i| ProfessionalRecord {
                id: Some(format!("r{i}")),
                category: "editor".to_string(),
                name: format!("n{i}"),
                location: String::new(),
                location_search: Vec::new(),
                details: BTreeMap::new(),
            })
            .collect();
        let store = MemoryStore::failing_on(1);
        let err = upload(&store, &records, 2, false).unwrap_err();
        assert!(err.to_string().contains("batch 2 failed after 2 record(s)"));
        assert_eq!(store.len(), 2);
    }
}
