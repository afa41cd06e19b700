mod config;
mod import;
mod record;
mod remote;
mod search;
mod translit;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;
use import::ImportOptions;
use record::{Category, Field};
use remote::auth::ServiceAccount;
use remote::firestore::FirestoreStore;
use remote::{DocumentStore, LocationQuery};

/// Project id used against the emulator when none is configured.
const EMULATOR_PROJECT_ID: &str = "demo-crewdex";

#[derive(Parser, Debug)]
#[command(name = "crewdex", version)]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import professionals from a spreadsheet (first sheet, first row = headers)
    Import(ImportArgs),
    /// Find professionals by category and location
    Search(SearchArgs),
    /// Print the location tokens produced for a piece of text
    Normalize(NormalizeArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Resolve headers and print what would be written, without touching the store
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Force every imported record into this category
    #[arg(long, value_enum)]
    category: Option<Category>,

    /// Records per commit (overrides config)
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(value_name = "PATH")]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long, value_enum)]
    category: Category,

    /// Maximum number of results (overrides config)
    #[arg(long)]
    limit: Option<usize>,

    /// Location as typed by the user, in Greek, Greeklish or English
    term: String,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    text: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    if let Some(path) = &config.config_path {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }

    match cli.command {
        Command::Import(args) => handle_import(args, &config),
        Command::Search(args) => handle_search(args, &config),
        Command::Normalize(args) => {
            handle_normalize(args);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "crewdex=debug" } else { "crewdex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_import(args: ImportArgs, config: &Config) -> Result<()> {
    let input = args
        .input
        .ok_or_else(|| anyhow!("missing input file path (usage: crewdex import <PATH>)"))?;
    if !input.exists() {
        bail!("input file not found: {}", input.display());
    }

    let batch_size = args.batch_size.unwrap_or(config.batch_size);
    if batch_size == 0 || batch_size > config::MAX_BATCH_SIZE {
        bail!(
            "--batch-size must be between 1 and {}",
            config::MAX_BATCH_SIZE
        );
    }

    if args.dry_run {
        let prepared = import::prepare(&input, args.category)?;
        return import::print_dry_run(&prepared);
    }

    let store = open_store(config)?;
    let prepared = import::prepare(&input, args.category)?;
    tracing::info!(
        records = prepared.built.records.len(),
        batch_size,
        collection = %config.collection,
        "starting import"
    );

    let options = ImportOptions {
        batch_size,
        show_progress: true,
    };
    let result = import::import_spreadsheet(&prepared, store.as_ref(), &options)?;

    println!(
        "Imported {} record(s) from {} row(s) in {} batch(es).",
        result.written, result.rows, result.batches
    );
    if result.skipped_blank > 0 {
        println!("Skipped {} blank row(s).", result.skipped_blank);
    }
    Ok(())
}

fn handle_search(args: SearchArgs, config: &Config) -> Result<()> {
    let Some(token) = search::normalize_query(&args.term) else {
        bail!("search term is empty (usage: crewdex search --category <CATEGORY> <TERM>)");
    };
    let limit = args.limit.unwrap_or(config.search_limit).max(1);

    let store = open_store(config)?;
    let query = LocationQuery {
        category: args.category.as_str().to_string(),
        token,
        limit,
    };
    tracing::debug!(?query, "running query");
    let results = store.query(&query)?;

    if results.is_empty() {
        println!(
            "No {} matches for \"{}\"",
            args.category,
            args.term.trim()
        );
    } else {
        println!(
            "Found {} {}(s) matching \"{}\"",
            results.len(),
            args.category,
            args.term.trim()
        );
    }

    // name<TAB>location<TAB>email<TAB>phone
    for doc in results {
        println!(
            "{}\t{}\t{}\t{}",
            doc.text(Field::Name.key()),
            doc.text(Field::Location.key()),
            doc.text(Field::Email.key()),
            doc.text(Field::Phone.key())
        );
    }

    Ok(())
}

fn handle_normalize(args: NormalizeArgs) {
    for token in search::build_location_search(Some(&args.text)) {
        println!("{}", token);
    }
}

fn open_store(config: &Config) -> Result<Box<dyn DocumentStore>> {
    if let Some(host) = config.emulator_host() {
        let project_id = config
            .project_id
            .clone()
            .unwrap_or_else(|| EMULATOR_PROJECT_ID.to_string());
        tracing::info!(host = %host, project = %project_id, "using Firestore emulator");
        return Ok(Box::new(FirestoreStore::emulator(
            &host,
            project_id,
            config.collection.clone(),
        )));
    }

    let path = config.credentials_path().ok_or_else(|| {
        anyhow!(
            "missing credentials: set {} to a service account key file",
            config::CREDENTIALS_ENV
        )
    })?;
    let account = ServiceAccount::from_file(&path)?;

    let project_id = config
        .project_id
        .clone()
        .or_else(|| account.project_id.clone())
        .ok_or_else(|| {
            anyhow!(
                "no project id: set `project_id` in config or use a key file that carries one"
            )
        })?;

    Ok(Box::new(FirestoreStore::new(
        account,
        project_id,
        config.collection.clone(),
    )))
}
