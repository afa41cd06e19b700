pub mod columns;
pub mod sheet;
pub mod spreadsheet;

use std::path::Path;

use anyhow::Result;

use crate::record::{Category, Field};
use crate::remote::DocumentStore;
use crate::translit;
use columns::ColumnMap;
use spreadsheet::BuiltRecords;

/// Records shown in full by a dry run.
const DRY_RUN_SAMPLE: usize = 3;

pub struct ImportOptions {
    pub batch_size: usize,
    pub show_progress: bool,
}

/// Result of a spreadsheet import
#[derive(Debug, Default)]
pub struct ImportResult {
    pub rows: usize,
    pub written: usize,
    pub skipped_blank: usize,
    pub batches: usize,
}

/// Everything up to, but not including, contacting the store.
pub struct PreparedImport {
    pub columns: ColumnMap,
    pub headers: Vec<String>,
    pub rows: usize,
    pub built: BuiltRecords,
}

pub fn prepare(input: &Path, category_override: Option<Category>) -> Result<PreparedImport> {
    let table = sheet::read_first_sheet(input)?;
    let columns = columns::resolve_headers(&table.headers);

    for (_, header) in &columns.unmapped {
        tracing::debug!(header = %header, "unmapped column");
    }
    for field in [Field::Name, Field::Location] {
        if !columns.is_mapped(field) {
            tracing::warn!("no column maps to `{}`", field.key());
        }
    }

    let built = spreadsheet::build_records(&table, &columns, category_override);
    for record in &built.records {
        if record.category.parse::<Category>().is_err() {
            tracing::warn!(
                name = %record.name,
                category = %record.category,
                "unrecognized category kept as-is"
            );
        }
    }

    Ok(PreparedImport {
        columns,
        rows: table.rows.len(),
        headers: table.headers,
        built,
    })
}

pub fn import_spreadsheet(
    prepared: &PreparedImport,
    store: &dyn DocumentStore,
    options: &ImportOptions,
) -> Result<ImportResult> {
    let upload = spreadsheet::upload(
        store,
        &prepared.built.records,
        options.batch_size,
        options.show_progress,
    )?;

    Ok(ImportResult {
        rows: prepared.rows,
        written: upload.written,
        skipped_blank: prepared.built.skipped_blank,
        batches: upload.batches,
    })
}

/// Print header resolution and a preview of the records a real run would write.
pub fn print_dry_run(prepared: &PreparedImport) -> Result<()> {
    println!("Column mapping:");
    for (field, index) in prepared.columns.assignments() {
        println!(
            "  {:<12} <- [{}] {}",
            field.key(),
            index,
            prepared.headers[index].trim()
        );
    }

    if !prepared.columns.unmapped.is_empty() {
        println!("Unmapped columns:");
        for (index, header) in &prepared.columns.unmapped {
            match columns::suggest_column(header) {
                Some(suggestion) => {
                    println!("  [{}] {} (closest known: {})", index, header.trim(), suggestion)
                }
                None => println!("  [{}] {}", index, header.trim()),
            }
        }
    }

    if !prepared.columns.shadowed.is_empty() {
        println!("Ignored duplicate columns:");
        for (index, header, field) in &prepared.columns.shadowed {
            println!("  [{}] {} (already mapped to {})", index, header.trim(), field.key());
        }
    }

    let records = &prepared.built.records;
    let greek = records
        .iter()
        .filter(|r| translit::contains_greek(&r.location))
        .count();
    let unreachable = records
        .iter()
        .filter(|r| r.detail(Field::Email).is_none() && r.detail(Field::Phone).is_none())
        .count();

    println!();
    println!("Rows read:          {}", prepared.rows);
    println!("Records to write:   {}", records.len());
    println!("Blank rows skipped: {}", prepared.built.skipped_blank);
    println!("Greek locations:    {}", greek);
    println!("No email or phone:  {}", unreachable);

    for category in [
        Category::Videographer,
        Category::Influencer,
        Category::Model,
        Category::Editor,
    ] {
        let count = records
            .iter()
            .filter(|r| r.category == category.as_str())
            .count();
        println!("  {:<12} {}", category.as_str(), count);
    }

    for record in records.iter().take(DRY_RUN_SAMPLE) {
        println!();
        println!("{} ->", record.id.as_deref().unwrap_or("(new document)"));
        println!("{}", serde_json::to_string_pretty(record)?);
    }

    println!();
    println!("[dry-run] No records were written.");
    Ok(())
}
