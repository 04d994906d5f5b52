//! Skillsurvey CLI - survey exports to per-intern PDF reports
//!
//! # Main Command
//!
//! ```bash
//! skillsurvey                        # Full run: fetch, filter, merge, categorize, render
//! ```
//!
//! # Debug Commands (one stage at a time)
//!
//! ```bash
//! skillsurvey fetch participant      # Download one survey export
//! skillsurvey filter -p raw_p.csv -e raw_e.csv
//! skillsurvey merge                  # Join the filtered CSVs
//! skillsurvey categorize             # Merge + write the processed CSVs
//! skillsurvey render complete        # PDFs for one category
//! skillsurvey parse input.csv        # Dump a CSV as JSON
//! skillsurvey schema                 # Print the effective survey schema
//! ```

use clap::{Parser, Subcommand};
use skillsurvey::config::Config;
use skillsurvey::logs::{init_tracing, log_error, log_info, log_success};
use skillsurvey::models::{Category, Side};
use skillsurvey::transform::pipeline::{self, Stages};
use skillsurvey::parse_csv_file_auto;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "skillsurvey")]
#[command(about = "Download, merge and report intern/supervisor skill surveys", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the export of one survey into the raw data directory
    Fetch {
        /// participant (student) or evaluator (supervisor)
        side: Side,
    },

    /// Filter raw exports by cutoff date into the intermediate directory
    Filter {
        /// Raw participant export
        #[arg(short, long)]
        participant: PathBuf,

        /// Raw evaluator export
        #[arg(short, long)]
        evaluator: PathBuf,
    },

    /// Join the filtered CSVs into merged_data.csv
    Merge,

    /// Merge the filtered CSVs and write the three processed CSVs
    Categorize,

    /// Render the PDF reports of one category
    Render {
        /// complete, participant-only or evaluator-only
        category: Category,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Rows to skip under the header (raw exports carry 2)
        #[arg(short, long, default_value = "0")]
        skip: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective survey schema as JSON
    Schema,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        None => cmd_run().await,
        Some(Commands::Fetch { side }) => cmd_fetch(side).await,
        Some(Commands::Filter {
            participant,
            evaluator,
        }) => cmd_filter(&participant, &evaluator),
        Some(Commands::Merge) => cmd_merge().map(|_| ()),
        Some(Commands::Categorize) => cmd_categorize(),
        Some(Commands::Render { category }) => cmd_render(category),
        Some(Commands::Parse {
            input,
            skip,
            output,
        }) => cmd_parse(&input, skip, output.as_deref()),
        Some(Commands::Schema) => cmd_schema(),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn load() -> CmdResult<(Config, Stages)> {
    let config = Config::from_env()?;
    let stages = Stages::new(&config)?;
    Ok((config, stages))
}

async fn cmd_run() -> CmdResult {
    let config = Config::from_env()?;
    let summary = pipeline::run(&config).await?;
    log_info(format!(
        "Complete: {}, participant only: {}, evaluator only: {} ({} reconciled)",
        summary.complete, summary.participant_only, summary.evaluator_only, summary.reconciled
    ));
    Ok(())
}

async fn cmd_fetch(side: Side) -> CmdResult {
    let config = Config::from_env()?;
    let path = pipeline::fetch(&config, side).await?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_filter(participant: &Path, evaluator: &Path) -> CmdResult {
    let (config, stages) = load()?;
    pipeline::filter(&config, &stages, Side::Participant, participant)?;
    pipeline::filter(&config, &stages, Side::Evaluator, evaluator)?;
    Ok(())
}

fn cmd_merge() -> CmdResult<(Config, Stages, skillsurvey::MergedTable)> {
    let (config, stages) = load()?;
    let (participant, evaluator) = pipeline::load_filtered(&config)?;
    let merged = pipeline::merge(&config, &stages, &participant, &evaluator)?;
    Ok((config, stages, merged))
}

fn cmd_categorize() -> CmdResult {
    let (config, stages, merged) = cmd_merge()?;
    pipeline::categorize(&config, &stages, &merged)?;
    Ok(())
}

fn cmd_render(category: Category) -> CmdResult {
    let (config, stages) = load()?;
    let summary = pipeline::render(&config, &stages, category)?;
    for path in &summary.rendered {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_parse(input: &Path, skip: usize, output: Option<&Path>) -> CmdResult {
    log_info(format!("📄 Parsing CSV: {}", input.display()));

    let result = parse_csv_file_auto(input, skip)?;
    log_info(format!("   Encoding: {}", result.encoding));
    log_info(format!("   Delimiter: '{}'", result.delimiter.escape_default()));
    log_info(format!("   Columns: {}", result.table.headers.join(", ")));
    log_success(format!("Parsed {} records", result.table.len()));

    let json = serde_json::to_string_pretty(&result.table.to_records())?;
    write_output(&json, output)
}

fn cmd_schema() -> CmdResult {
    let _ = dotenvy::dotenv();
    let schema = match std::env::var("SURVEY_SCHEMA_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            skillsurvey::SurveySchema::from_json_file(Path::new(path.trim()))?
        }
        _ => skillsurvey::SurveySchema::default(),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CmdResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            log_success(format!("Output written to: {}", p.display()));
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
