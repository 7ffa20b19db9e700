//! # GPO Audit CLI
//!
//! Discovers the GPOs of a policy store and prints their decoded settings,
//! security findings or link order as JSON.

mod commands;

use clap::{ArgAction, Args, Parser, Subcommand};
use commands::CliError;
use gpo_analyzer_base::api::{AnalyzerConfig, ObjectFilter, ObjectKind};
use gpo_analyzer_base::directory::{DirectoryLookup, StaticDirectory};
use gpo_analyzer_base::Engine;
use gpo_decoders::config::runtime::{DecoderPreferences, LogLevel, LoggingPreferences};
use gpo_decoders::{log_error, log_info, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "gpo-audit", version, about = "Decode and audit Group Policy Objects from a policy store")]
pub struct Cli {
    /// Policy store root holding `<domain>/Policies/{GUID}` folders
    #[arg(short = 's', long, global = true)]
    pub sysvol: Option<PathBuf>,

    /// Directory data as JSON (domains, accounts, containers and links)
    #[arg(long, global = true)]
    pub directory: Option<PathBuf>,

    /// Directory overriding the embedded analysis rules
    #[arg(long, global = true)]
    pub rules_dir: Option<PathBuf>,

    /// Directory overriding the embedded file schema
    #[arg(long, global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Worker threads per domain; 0 uses one per core
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Keep the content of script files in dumps
    #[arg(long, global = true)]
    pub script_content: bool,

    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log events as JSON lines
    #[arg(long, global = true)]
    pub structured_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print decoded settings
    Dump(DumpArgs),
    /// Report security findings
    Analysis(AnalysisArgs),
    /// Print the GPOs applied to a container, highest precedence first
    Order(OrderArgs),
}

/// Domain and GUID filters; empty filters select everything
#[derive(Debug, Clone, Default, Args)]
pub struct Selection {
    #[arg(short, long)]
    pub domain: Vec<String>,

    #[arg(short, long)]
    pub guid: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DumpArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Only list GPO GUIDs
    #[arg(long, conflicts_with = "search")]
    pub list: bool,

    /// Case-insensitive regex over keys and values
    #[arg(long)]
    pub search: Option<String>,

    /// With --search, print the record enclosing each matching key
    #[arg(long, requires = "search")]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct AnalysisArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Object kinds to analyze: group, registry, privilege, gpppassword
    #[arg(short = 'o', long = "object", value_delimiter = ',')]
    pub objects: Vec<ObjectKind>,

    /// Print the canonical records instead of findings
    #[arg(long, conflicts_with = "enrich")]
    pub processed: bool,

    /// Attach the containers each GPO applies to
    #[arg(long)]
    pub affected: bool,

    /// Print computer edges and properties derived from the findings
    #[arg(long)]
    pub enrich: bool,
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Distinguished name of the container
    #[arg(short, long)]
    pub container: String,

    #[arg(short, long)]
    pub domain: String,
}

fn init_logging(cli: &Cli) -> Result<(), String> {
    let (level, filter) = match cli.verbose {
        0 => (LogLevel::Warning, log::LevelFilter::Warn),
        1 => (LogLevel::Info, log::LevelFilter::Info),
        _ => (LogLevel::Debug, log::LevelFilter::Debug),
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .init();

    let preferences = LoggingPreferences::default()
        .with_min_level(level)
        .with_structured(cli.structured_logs)
        .with_facade(true);
    logging::config::init_runtime_preferences(preferences)?;
    logging::init_global_logging()
}

fn analyzer_config(cli: &Cli) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    if let Some(threads) = cli.threads {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        config = config.with_max_threads(threads);
    }
    if let Some(dir) = &cli.rules_dir {
        config = config.with_rules_dir(dir);
    }

    let mut decoder = DecoderPreferences::default().with_script_content(cli.script_content);
    if let Some(dir) = &cli.schema_dir {
        decoder = decoder.with_schema_dir(dir);
    }
    config.with_decoder_preferences(decoder)
}

fn load_directory(cli: &Cli) -> Result<Arc<dyn DirectoryLookup>, CliError> {
    let directory = match &cli.directory {
        Some(path) => StaticDirectory::load(path).map_err(gpo_analyzer_base::AnalyzerError::from)?,
        None => StaticDirectory::well_known_only(),
    };
    Ok(Arc::new(directory))
}

fn sysvol(cli: &Cli) -> Result<PathBuf, CliError> {
    cli.sysvol
        .clone()
        .ok_or_else(|| CliError::Usage("--sysvol is required for this command".to_string()))
}

fn run(cli: &Cli) -> Result<String, CliError> {
    let directory = load_directory(cli)?;
    let mut config = analyzer_config(cli);

    match &cli.command {
        Command::Dump(args) => {
            let engine = Engine::from_config(config, directory)?;
            commands::dump::run(&engine, &sysvol(cli)?, args)
        }
        Command::Analysis(args) => {
            config = config
                .with_objects(ObjectFilter::only(args.objects.iter().copied()))
                .with_affected(args.affected);
            let engine = Engine::from_config(config, directory)?;
            commands::analysis::run(&engine, &sysvol(cli)?, args)
        }
        Command::Order(args) => {
            let engine = Engine::from_config(config, directory)?;
            commands::order::run(&engine, args)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: logging could not be initialized: {}", e);
        return ExitCode::FAILURE;
    }
    log_info!("gpo-audit starting", "version" => gpo_analyzer_base::VERSION);

    let outcome = run(&cli);
    let summary = logging::get_processing_summary();
    if cli.verbose > 0 && (summary.has_errors() || summary.has_warnings()) {
        if let Some(report) = logging::file_report() {
            eprintln!("{}", report);
        }
    }

    match outcome {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_error!(e.log_code(), "gpo-audit failed", "error" => e);
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
