//! QA Import CLI
//!
//! Command-line tool for importing radiology QA uploads, evaluating the
//! resulting test records and keeping them in a JSON record store.

use clap::{Parser, Subcommand};
use qa_core::{
    evaluate_all, import_path_into, normalize_test_name, parse_rows, read_path, scan_directory, BatchFile, ImportStats,
    IngestConfig, JsonFileStore, RecordSet, RecordStore, TestKind,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "qa-cli")]
#[command(about = "Radiology QA bulk import and evaluation", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an upload and print the import fields
    Parse {
        /// Path to the CSV or Excel file
        #[arg(short, long)]
        file: PathBuf,

        /// Config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the fields as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import uploads into a service's records
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Service the records belong to
        #[arg(short, long)]
        service: String,

        /// JSON record store (defaults to the config's store_path)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Import and print the results without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-evaluate a service's stored records
    Evaluate {
        #[arg(short, long)]
        service: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show a stored record in the editor's JSON shape
    Show {
        #[arg(short, long)]
        service: String,

        /// Test slug or name (e.g. "total_filtration" or "Total Filtration")
        #[arg(short, long)]
        test: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List stored records
    List {
        /// Only records of this service
        #[arg(short, long)]
        service: Option<String>,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Scan directories for importable files
    Scan {
        /// Root directories to scan
        #[arg(short, long, required = true)]
        root: Vec<PathBuf>,
    },

    /// List the known tests
    Tests,

    /// Run a batch import
    Batch {
        /// Path to batch file (JSON)
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Create a config file template
    CreateConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,

        /// Record store to set as default
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Create a batch file template
    CreateBatch {
        /// Output path for the batch file
        #[arg(short, long)]
        output: PathBuf,

        /// Record store receiving the results
        #[arg(long)]
        store: PathBuf,

        #[arg(short, long)]
        service: String,

        /// Files or directories to include
        #[arg(short, long)]
        input: Vec<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.log_level());

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("qa_core={level},qa_cli={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn run(cli: Cli) -> qa_core::Result<()> {
    match cli.command {
        Commands::Parse { file, config, json } => cmd_parse(&file, config.as_deref(), json),
        Commands::Import {
            inputs,
            service,
            store,
            config,
            dry_run,
        } => cmd_import(&inputs, &service, store, config.as_deref(), dry_run),
        Commands::Evaluate { service, store, config } => cmd_evaluate(&service, store, config.as_deref()),
        Commands::Show {
            service,
            test,
            store,
            config,
        } => cmd_show(&service, &test, store, config.as_deref()),
        Commands::List { service, store, config } => cmd_list(service.as_deref(), store, config.as_deref()),
        Commands::Scan { root } => cmd_scan(&root),
        Commands::Tests => cmd_tests(),
        Commands::Batch { batch } => cmd_batch(&batch),
        Commands::CreateConfig { output, store } => cmd_create_config(&output, store),
        Commands::CreateBatch {
            output,
            store,
            service,
            input,
            config,
        } => cmd_create_batch(&output, store, &service, &input, config),
    }
}

fn load_config(path: Option<&Path>) -> qa_core::Result<IngestConfig> {
    match path {
        Some(path) => IngestConfig::load(path),
        None => Ok(IngestConfig::default()),
    }
}

/// Store from the command line, falling back to the config
fn open_store(store: Option<PathBuf>, config: &IngestConfig) -> qa_core::Result<JsonFileStore> {
    let path = store.or_else(|| config.store_path.clone()).ok_or_else(|| {
        qa_core::Error::Store("no record store given; pass --store or set store_path in the config".to_string())
    })?;
    JsonFileStore::open(path)
}

fn resolve_test(name: &str) -> qa_core::Result<TestKind> {
    TestKind::from_slug(name)
        .or_else(|| normalize_test_name(name))
        .ok_or_else(|| qa_core::Error::UnknownTest(name.to_string()))
}

fn cmd_parse(file: &Path, config: Option<&Path>, json: bool) -> qa_core::Result<()> {
    let config = load_config(config)?;
    let rows = read_path(file)?;
    let output = parse_rows(&rows, &config.parse_options());

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Rows: {}", output.rows_read);
    println!("Fields: {}", output.fields.len());
    println!();

    println!("{:<34}\t{:<24}\t{:>4}\tValue", "Test", "Field", "Row");
    println!("{}", "-".repeat(80));
    for field in &output.fields {
        println!(
            "{:<34}\t{:<24}\t{:>4}\t{}",
            field.test.canonical_name(),
            field.field_name,
            field.row_index,
            field.value
        );
    }

    println!();
    println!("Sections: {}", output.sections);
    println!("Skipped rows: {}", output.skipped_rows);
    if output.dropped_without_test > 0 {
        println!("Dropped (no test): {}", output.dropped_without_test);
    }
    for label in &output.unresolved_sections {
        println!("Unrecognized section: {}", label);
    }

    Ok(())
}

/// Expand directories into the files they contain
fn collect_inputs(inputs: &[PathBuf]) -> qa_core::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let scan = scan_directory(&[input])?;
            files.extend(scan.files.into_iter().map(|f| f.path));
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_stats(stats: &ImportStats) {
    println!("{}", stats.source);
    println!(
        "  {} rows, {} fields routed, {} ignored, {} skipped rows",
        stats.rows_read, stats.fields_routed, stats.fields_ignored, stats.skipped_rows
    );
    for (test, count) in &stats.per_test {
        println!("  {:<40} {} fields", test.canonical_name(), count);
    }
    for label in &stats.unresolved_sections {
        println!("  unrecognized section: {}", label);
    }
    if stats.is_empty() {
        println!("  nothing imported: the file looks empty or unrecognized");
    }
}

/// Import files on top of a record set; unreadable files are reported and skipped
///
/// A file that cannot be read leaves the records as they were.
fn import_files(records: &mut RecordSet, files: &[PathBuf], config: &IngestConfig) -> Vec<(PathBuf, String)> {
    let mut errors = Vec::new();

    for file in files {
        match import_path_into(records, file, config) {
            Ok(stats) => print_stats(&stats),
            Err(e) => {
                warn!(file = %file.display(), "import failed: {}", e);
                errors.push((file.clone(), e.to_string()));
            }
        }
    }

    errors
}

fn print_remarks(records: &RecordSet) {
    for record in records.iter() {
        println!("  {:<40} {}", record.test.canonical_name(), record.remark);
    }
}

fn cmd_import(
    inputs: &[PathBuf],
    service: &str,
    store: Option<PathBuf>,
    config: Option<&Path>,
    dry_run: bool,
) -> qa_core::Result<()> {
    let config = load_config(config)?;
    let files = collect_inputs(inputs)?;
    info!(files = files.len(), service, "importing");

    if dry_run {
        let mut records = RecordSet::new();
        let errors = import_files(&mut records, &files, &config);
        println!();
        print_remarks(&records);
        print_errors(&errors);
        return Ok(());
    }

    let mut store = open_store(store, &config)?;
    let mut records = store.load_service(service)?;
    let errors = import_files(&mut records, &files, &config);

    let receipts = store.save_all(service, &records)?;
    println!();
    println!("Saved {} records to {}", receipts.len(), store.path().display());
    print_remarks(&records);
    print_errors(&errors);

    Ok(())
}

fn print_errors(errors: &[(PathBuf, String)]) {
    if errors.is_empty() {
        return;
    }
    println!("\nErrors ({}):", errors.len());
    for (path, err) in errors {
        println!("  {}: {}", path.display(), err);
    }
}

fn cmd_evaluate(service: &str, store: Option<PathBuf>, config: Option<&Path>) -> qa_core::Result<()> {
    let config = load_config(config)?;
    let mut store = open_store(store, &config)?;

    let mut records = store.load_service(service)?;
    if records.is_empty() {
        println!("No records for service '{}'", service);
        return Ok(());
    }

    evaluate_all(&mut records);
    store.save_all(service, &records)?;

    println!("Service: {}", service);
    print_remarks(&records);

    Ok(())
}

fn cmd_show(service: &str, test: &str, store: Option<PathBuf>, config: Option<&Path>) -> qa_core::Result<()> {
    let config = load_config(config)?;
    let store = open_store(store, &config)?;
    let test = resolve_test(test)?;

    match store.load(service, test)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record.to_editor_json())?),
        None => println!("No '{}' record for service '{}'", test, service),
    }

    Ok(())
}

fn cmd_list(service: Option<&str>, store: Option<PathBuf>, config: Option<&Path>) -> qa_core::Result<()> {
    let config = load_config(config)?;
    let store = open_store(store, &config)?;
    let entries = store.list(service)?;

    println!("Records ({}):", entries.len());
    println!();
    for entry in &entries {
        println!(
            "  {:<48} {:<5} {}",
            entry.id,
            entry.remark.as_str(),
            entry.saved_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn cmd_scan(roots: &[PathBuf]) -> qa_core::Result<()> {
    let result = scan_directory(roots)?;

    println!("Scanned {} root(s):", result.roots.len());
    for root in &result.roots {
        println!("  {}", root.display());
    }
    println!();
    println!("Found {} importable files", result.total_files);
    for file in &result.files {
        println!("  {} [{:?}]", file.path.display(), file.format);
    }

    Ok(())
}

fn cmd_tests() -> qa_core::Result<()> {
    println!("{:<34} {:<42} Default tolerance", "Slug", "Name");
    println!("{}", "-".repeat(100));

    for test in TestKind::ALL {
        let spec = test.layout().default_tolerance;
        let tolerance = match spec.value {
            Some(value) => format!(
                "{} {} {} ({:?})",
                spec.operator.as_str(),
                spec.sign.as_str(),
                value,
                spec.kind
            ),
            None => "-".to_string(),
        };
        println!("{:<34} {:<42} {}", test.slug(), test.canonical_name(), tolerance);
    }

    Ok(())
}

fn cmd_batch(batch_path: &Path) -> qa_core::Result<()> {
    let batch = BatchFile::load(batch_path)?;
    let config = batch.load_config()?;

    println!("Running batch for service '{}' with {} input(s)", batch.service_id, batch.inputs.len());
    println!("Store: {}", batch.store.display());
    println!();

    let files = collect_inputs(&batch.inputs)?;
    let mut store = JsonFileStore::open(&batch.store)?;
    let mut records = store.load_service(&batch.service_id)?;

    let errors = import_files(&mut records, &files, &config);
    let receipts = store.save_all(&batch.service_id, &records)?;

    println!();
    println!("Batch complete:");
    println!("  {} files imported", files.len() - errors.len());
    println!("  {} records saved", receipts.len());
    print_remarks(&records);
    print_errors(&errors);

    Ok(())
}

fn cmd_create_config(output: &Path, store: Option<PathBuf>) -> qa_core::Result<()> {
    let mut config = IngestConfig {
        store_path: store,
        ..IngestConfig::default()
    };
    // Show the format with each test's built-in tolerance
    for test in TestKind::ALL {
        let spec = test.layout().default_tolerance;
        if spec.value.is_some() {
            config.tolerances.insert(test, spec);
        }
    }

    config.save(output)?;
    println!("Created config file: {}", output.display());
    println!();
    println!("Edit the tolerances, then pass it to any command with --config {}", output.display());

    Ok(())
}

fn cmd_create_batch(
    output: &Path,
    store: PathBuf,
    service: &str,
    inputs: &[PathBuf],
    config: Option<PathBuf>,
) -> qa_core::Result<()> {
    let inputs = if inputs.is_empty() {
        vec![PathBuf::from("uploads")]
    } else {
        inputs.to_vec()
    };

    let batch = BatchFile {
        config,
        store,
        service_id: service.to_string(),
        inputs,
    };

    batch.save(output)?;
    println!("Created batch file: {}", output.display());
    println!();
    println!("Edit the file to configure your batch, then run:");
    println!("  qa-cli batch --batch {}", output.display());

    Ok(())
}
