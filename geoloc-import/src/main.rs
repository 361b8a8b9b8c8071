//! geoloc-import - Geonames postal code importer
//!
//! Downloads per-country geonames archives and converges the local
//! geography store (states, boroughs, cities, zips) to them.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use geoloc_common::config::{load_toml_config, resolve_database_path, TomlConfig};
use geoloc_common::db::countries::{self, ColumnOverrides};
use geoloc_common::db::{geography, init_database};
use geoloc_import::config::{
    resolve_geonames_url, resolve_letter_case, resolve_timeout, save_geonames_url,
};
use geoloc_import::{run_import, GeonamesClient, ImportRequest, ImportSummary, LetterCase};
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for geoloc-import
#[derive(Parser, Debug)]
#[command(name = "geoloc-import")]
#[command(about = "Import geonames postal codes into the geography store")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "GEOLOC_DATABASE")]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "GEOLOC_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and reconcile one or more countries
    Import(ImportArgs),
    /// Manage registered countries
    #[command(subcommand)]
    Country(CountryCommand),
    /// Manage settings stored in the database
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print stored entity counts for a country
    Status {
        /// Country code, e.g. FR
        #[arg(long)]
        country: String,
    },
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Country codes, processed in the given order
    #[arg(long = "country", required = true, num_args = 1..)]
    countries: Vec<String>,

    /// Case transform applied to state, borough and city names
    #[arg(long, value_enum)]
    letter_case: Option<LetterCase>,

    /// Only consider the first N rows of each feed (disables deletions)
    #[arg(long, default_value_t = 0)]
    max_import: usize,

    /// Archive URL template containing {code}
    #[arg(long)]
    url: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum CountryCommand {
    /// Register a country
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
    },
    /// Set feed column overrides (0 restores the default column)
    Columns {
        #[arg(long)]
        code: String,
        #[arg(long)]
        state_name: Option<i64>,
        #[arg(long)]
        state_code: Option<i64>,
        #[arg(long)]
        borough_name: Option<i64>,
        #[arg(long)]
        borough_code: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Store the archive URL template used when --url is not given
    SetUrl {
        /// Template containing {code}
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let toml_config =
        load_toml_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(cli.verbose, &toml_config);

    let db_path = resolve_database_path(cli.database.as_deref(), &toml_config);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Command::Import(args) => import(&pool, &toml_config, args).await,
        Command::Country(CountryCommand::Add { code, name }) => {
            let id = countries::insert_country(&pool, &code, &name)
                .await
                .with_context(|| format!("Failed to register country {}", code))?;
            println!("Registered {} ({}) with id {}", code.to_uppercase(), name, id);
            Ok(())
        }
        Command::Country(CountryCommand::Columns {
            code,
            state_name,
            state_code,
            borough_name,
            borough_code,
        }) => {
            let country = find_country(&pool, &code).await?;
            let overrides = ColumnOverrides {
                state_name,
                state_code,
                borough_name,
                borough_code,
            };
            countries::set_column_overrides(&pool, country.id, overrides).await?;
            println!("Updated column overrides for {}", country.code);
            Ok(())
        }
        Command::Config(ConfigCommand::SetUrl { url }) => {
            save_geonames_url(&pool, &url).await?;
            println!("Stored geonames URL {}", url.trim());
            Ok(())
        }
        Command::Status { country } => status(&pool, &country, cli.verbose).await,
    }
}

/// RUST_LOG wins, then the TOML level, then info; -v forces debug
fn init_tracing(verbose: bool, toml_config: &TomlConfig) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(toml_config.logging.level.as_deref().unwrap_or("info"))
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn find_country(pool: &SqlitePool, code: &str) -> Result<geoloc_common::db::Country> {
    countries::find_country_by_code(pool, code)
        .await?
        .ok_or_else(|| anyhow!("Unknown country code {}", code))
}

async fn import(pool: &SqlitePool, toml_config: &TomlConfig, args: ImportArgs) -> Result<()> {
    let mut country_ids = Vec::with_capacity(args.countries.len());
    for code in &args.countries {
        country_ids.push(find_country(pool, code).await?.id);
    }

    let url = resolve_geonames_url(args.url.as_deref(), pool, toml_config).await?;
    let letter_case = resolve_letter_case(args.letter_case, toml_config)?;
    let client = GeonamesClient::new(url, resolve_timeout(toml_config))?;

    let request = ImportRequest::new(country_ids)
        .with_letter_case(letter_case)
        .with_max_import(args.max_import);

    let summary = run_import(pool, &client, &request)
        .await
        .context("Import aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Import {} finished in {} ms (letter case: {}, max import: {})",
        summary.run_id, summary.duration_ms, summary.letter_case, summary.max_import
    );

    for report in &summary.countries {
        println!(
            "{} {}: {} of {} rows{}",
            report.code,
            report.name,
            report.rows_considered,
            report.rows_total,
            if report.purged { "" } else { " (no purge)" }
        );
        for (label, stats) in [
            ("states", &report.states),
            ("boroughs", &report.boroughs),
            ("cities", &report.cities),
            ("zips", &report.zips),
        ] {
            println!(
                "  {:<9} reused {:>7}  created {:>7}  deleted {:>7}{}",
                label,
                stats.reused,
                stats.created,
                stats.deleted,
                if stats.is_unchanged() { "  (unchanged)" } else { "" }
            );
        }
    }
}

async fn status(pool: &SqlitePool, code: &str, verbose: bool) -> Result<()> {
    let country = find_country(pool, code).await?;
    let counts = geography::level_counts(pool, country.id).await?;

    println!("{} {} (id {})", country.code, country.name, country.id);
    println!("  states   {:>7}", counts.states);
    println!("  boroughs {:>7}", counts.boroughs);
    println!("  cities   {:>7}", counts.cities);
    println!("  zips     {:>7}", counts.zips);

    if verbose {
        for state in geography::list_states(pool, country.id).await? {
            println!("  state {} {}", state.code, state.name);
        }
        for borough in geography::list_boroughs(pool, country.id).await? {
            println!("  borough {}", borough);
        }
    }

    Ok(())
}
