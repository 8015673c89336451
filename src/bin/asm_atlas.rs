use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use assembly_atlas::app::{App, RunOptions, RunSummary};
use assembly_atlas::catalog::CatalogHttpClient;
use assembly_atlas::config::{DEFAULT_DELAY_SECS, EntrezCredentials, delay_from_secs};
use assembly_atlas::domain::FieldGroup;
use assembly_atlas::entrez::EntrezHttpClient;
use assembly_atlas::error::AtlasError;
use assembly_atlas::heal::HealOptions;
use assembly_atlas::table::Table;

#[derive(Parser)]
#[command(name = "asm-atlas")]
#[command(
    about = "Fetches NCBI assembly metadata into one append-only TSV, heals missing fields in place, and rebuilds a geo/biome-filtered view."
)]
#[command(version, author)]
struct Cli {
    /// Input TSV with assembly accessions in the first column.
    input: Utf8PathBuf,

    /// Canonical metadata TSV; appended across runs and healed in place.
    output: Utf8PathBuf,

    /// Additional pre-existing table whose accessions are treated as already
    /// processed.
    #[arg(long)]
    resume: Option<Utf8PathBuf>,

    /// The input file has no header row; take the first line as data.
    #[arg(long)]
    no_input_header: bool,

    /// Entrez contact email (takes precedence over ENTREZ_EMAIL).
    #[arg(long)]
    email: Option<String>,

    /// Minimum delay in seconds between calls to each NCBI service.
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    delay: f64,

    /// After processing new accessions, try to fill placeholder fields in
    /// the existing table.
    #[arg(long)]
    heal_missing: bool,

    /// Skip new accessions entirely; only heal placeholder fields and exit.
    #[arg(long)]
    heal_only: bool,

    /// Limit healing to these field groups (comma-separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    heal_columns: Vec<FieldGroup>,

    /// During healing, log only rows that improved.
    #[arg(long)]
    heal_changed_only: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(atlas) = report.downcast_ref::<AtlasError>() {
            return ExitCode::from(map_exit_code(atlas));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AtlasError) -> u8 {
    match error {
        AtlasError::InputRead(_) | AtlasError::ResumeRead(_) | AtlasError::InvalidAccession(_) => 2,
        AtlasError::CatalogHttp(_)
        | AtlasError::CatalogStatus { .. }
        | AtlasError::EntrezHttp(_)
        | AtlasError::EntrezStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let delay = delay_from_secs(cli.delay);
    let credentials = EntrezCredentials::resolve(cli.email.as_deref());
    let catalog =
        CatalogHttpClient::new(credentials.api_key.as_deref(), delay).into_diagnostic()?;
    let entrez = EntrezHttpClient::new(credentials, delay).into_diagnostic()?;

    let table = Table::new(cli.output.clone());
    let app = App::new(table, catalog, entrez);

    let heal = HealOptions {
        groups: if cli.heal_columns.is_empty() {
            FieldGroup::ALL.to_vec()
        } else {
            cli.heal_columns.clone()
        },
        changed_only: cli.heal_changed_only,
    };

    let summary = if cli.heal_only {
        app.heal_only(&heal).into_diagnostic()?
    } else {
        let options = RunOptions {
            input: cli.input.clone(),
            resume: cli.resume.clone(),
            input_has_header: !cli.no_input_header,
            heal_after: cli.heal_missing,
            heal,
        };
        app.run(&options).into_diagnostic()?
    };

    print_summary(&cli, &summary, app.table());
    Ok(())
}

fn print_summary(cli: &Cli, summary: &RunSummary, table: &Table) {
    if !cli.heal_only {
        println!("Already present & skipped: {}", summary.skipped_existing);
        println!("Processed in this run: {}", summary.processed);
        if summary.identity_failures > 0 {
            println!("Skipped (base lookup failed): {}", summary.identity_failures);
        }
        if summary.invalid_keys > 0 {
            println!("Skipped (not an assembly accession): {}", summary.invalid_keys);
        }
        println!(
            "With BiomeDistribution filled in this run: {}",
            summary.biome_filled
        );
        println!(
            "With Latitude/Longitude filled in this run: {}",
            summary.latlon_filled
        );
    }
    if let Some(heal) = &summary.heal {
        println!("Healed rows: {} of {} checked", heal.updated, heal.checked);
    }
    println!("Main output (appended): {}", table.path());
    println!(
        "Filtered rebuilt (overwritten): {} ({} rows)",
        table.filtered_path(),
        summary.filtered_rows
    );
}
