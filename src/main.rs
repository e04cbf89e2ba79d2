// 🏛️ pdp-records - Command line entry point
// Fetches parliamentary records from the data platform, runs them through the
// reconciliation pipeline and writes CSV. Logs go to stderr, tables to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pdp_records::{
    calendar_from_table, general_elections, readable, Category, ElectionCalendar, House,
    Pipeline, QueryOptions, Settings, SparqlClient, Table, Value,
};

#[derive(Parser, Debug)]
#[command(name = "pdp-records")]
#[command(about = "Download and reconcile UK Parliament member records")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one category of records as CSV
    Fetch {
        category: CategoryArg,

        #[arg(long, value_enum, default_value = "commons")]
        house: HouseArg,

        /// Keep records ending on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Keep records starting on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Keep records in force on this date; overrides --from and --to
        #[arg(long)]
        on: Option<String>,

        /// Keep records from outside the member's own tenure
        #[arg(long)]
        all_records: bool,

        /// Merge consecutive memberships of the same party
        #[arg(long)]
        collapse: bool,

        /// Drop id columns
        #[arg(long)]
        readable: bool,

        /// General elections calendar CSV (name, dissolution, election)
        #[arg(long, value_name = "FILE")]
        calendar: Option<PathBuf>,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Write CSV here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Write the general elections calendar as CSV
    Elections {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Check the SPARQL endpoint is reachable
    Check {
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
}

#[derive(clap::Args, Debug)]
struct EndpointArgs {
    /// SPARQL endpoint (overrides PDP_API_URL and the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// TOML config file with an `api_url` key
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Members,
    Memberships,
    PartyMemberships,
    GovernmentRoles,
    OppositionRoles,
    CommitteeMemberships,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Members => Category::Members,
            CategoryArg::Memberships => Category::Tenure,
            CategoryArg::PartyMemberships => Category::PartyMemberships,
            CategoryArg::GovernmentRoles => Category::GovernmentRoles,
            CategoryArg::OppositionRoles => Category::OppositionRoles,
            CategoryArg::CommitteeMemberships => Category::CommitteeMemberships,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum HouseArg {
    Commons,
    Lords,
}

impl From<HouseArg> for House {
    fn from(arg: HouseArg) -> Self {
        match arg {
            HouseArg::Commons => House::Commons,
            HouseArg::Lords => House::Lords,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pdp_records=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Fetch {
            category,
            house,
            from,
            to,
            on,
            all_records,
            collapse,
            readable: drop_ids,
            calendar,
            endpoint,
            output,
        } => {
            let options = QueryOptions::new()
                .with_dates(Value::from(from), Value::from(to), Value::from(on))
                .context("Invalid date bounds")?
                .while_member(!all_records)
                .collapse(collapse);

            let client = SparqlClient::new(resolve_settings(&endpoint)?);
            let calendar = load_calendar(calendar.as_deref())?;
            let pipeline = Pipeline::with_calendar(&client, calendar);

            let category = Category::from(category);
            let house = House::from(house);
            let table = pipeline
                .fetch(category, house, &options)
                .with_context(|| format!("Failed to fetch {} for the {}", category, house))?;
            tracing::info!("{} rows of {}", table.len(), category);

            let table = if drop_ids { readable(&table) } else { table };
            write_table(&table, output.as_deref())?;
        }

        Command::Elections { output } => {
            let calendar = general_elections().context("Built-in elections calendar is invalid")?;
            write_table(&calendar.to_table(), output.as_deref())?;
        }

        Command::Check { endpoint } => {
            let client = SparqlClient::new(resolve_settings(&endpoint)?);
            let url = client.settings().api_url().to_string();
            if client.check_api() {
                println!("✓ {} is reachable", url);
            } else {
                eprintln!("❌ {} is not reachable", url);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn resolve_settings(endpoint: &EndpointArgs) -> Result<Settings> {
    Settings::resolve(endpoint.api_url.as_deref(), endpoint.config.as_deref())
        .context("Failed to resolve endpoint settings")
}

fn load_calendar(path: Option<&Path>) -> Result<ElectionCalendar> {
    let Some(path) = path else {
        return general_elections().context("Built-in elections calendar is invalid");
    };

    let file = File::open(path)
        .with_context(|| format!("Failed to open calendar {}", path.display()))?;
    let table = Table::read_csv(file, &["dissolution", "election"])
        .with_context(|| format!("Failed to read calendar {}", path.display()))?;
    let calendar = calendar_from_table(&table)
        .with_context(|| format!("Invalid calendar {}", path.display()))?;

    tracing::info!("Loaded {} general elections from {}", calendar.len(), path.display());
    Ok(calendar)
}

fn write_table(table: &Table, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(file)?;
            tracing::info!("Wrote {} rows to {}", table.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            table.write_csv(&mut handle)?;
            handle.flush()?;
        }
    }
    Ok(())
}
