//! consultation-etl command line

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use consultation_etl::cli::CliError;
use consultation_etl::cli::commands::flatten::{FlattenArgs, handle_flatten};
use consultation_etl::cli::commands::pipeline::{
    PipelineRunArgs, PipelineStatusArgs, handle_pipeline_run, handle_pipeline_status,
};
use consultation_etl::cli::commands::transform::{TransformArgs, handle_transform};
use consultation_etl::cli::logging::{LogConfig, LogFormat, init_logging};
use consultation_etl::flatten::DEFAULT_PATTERN;

#[derive(Parser)]
#[command(
    name = "consultation-etl",
    version,
    about = "Flatten consultation XML records into a star schema and load it into PostgreSQL"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatArg,
}

#[derive(Subcommand)]
enum Command {
    /// Run or inspect the full pipeline
    #[command(subcommand)]
    Pipeline(PipelineCommand),

    /// Flatten XML files into xml_data.csv
    Flatten {
        /// Directory of XML files
        #[arg(long, default_value = "data/xml")]
        source: PathBuf,
        /// Glob pattern for source files
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,
        /// Output directory
        #[arg(long = "output", default_value = "processed")]
        output_dir: PathBuf,
        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Build the dimension and fact tables from xml_data.csv
    Transform {
        /// Wide table to read (default: <OUTPUT>/xml_data.csv)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory
        #[arg(long = "output", default_value = "processed")]
        output_dir: PathBuf,
        /// Drop columns with more nulls than this
        #[arg(long)]
        threshold: Option<usize>,
    },

    /// Drop and recreate the destination tables
    Schema(DatabaseArgs),

    /// Recreate the destination tables and bulk-load the output tables
    Load {
        #[command(flatten)]
        database: DatabaseArgs,
        /// Directory holding the <table>.csv files
        #[arg(long = "output", default_value = "processed")]
        output_dir: PathBuf,
        /// Table to load (repeatable; default: all)
        #[arg(long = "table")]
        tables: Vec<String>,
        /// Stop at the first failed table
        #[arg(long)]
        fail_fast: bool,
    },
}

#[derive(Subcommand)]
enum PipelineCommand {
    /// Run the pipeline
    Run(RunArgs),
    /// Show the checkpoint of the last run
    Status {
        /// Output directory of the run
        #[arg(long = "output", default_value = "processed")]
        output_dir: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// TOML configuration file
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,
    /// Directory of XML files
    #[arg(long)]
    source: Option<PathBuf>,
    /// Glob pattern for source files
    #[arg(long)]
    pattern: Option<String>,
    /// Output directory
    #[arg(long = "output")]
    output_dir: Option<PathBuf>,
    /// PostgreSQL connection string (default: DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
    /// Stage to run (repeatable; default: all)
    #[arg(long = "stage")]
    stages: Vec<String>,
    /// Drop columns with more nulls than this
    #[arg(long)]
    threshold: Option<usize>,
    /// Stop loading at the first failed table
    #[arg(long)]
    fail_fast: bool,
    /// Validate inputs without running
    #[arg(long)]
    dry_run: bool,
    /// Resume from the checkpoint
    #[arg(long)]
    resume: bool,
    /// Show a progress bar while flattening
    #[arg(long)]
    progress: bool,
}

#[derive(Args)]
struct DatabaseArgs {
    /// PostgreSQL connection string (default: DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

impl DatabaseArgs {
    fn resolve(&self) -> Result<String, CliError> {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                CliError::InvalidArgument(
                    "no database: pass --database-url or set DATABASE_URL".to_string(),
                )
            })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(format)
        .with_ansi(io::stderr().is_terminal());
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }

    if let Err(error) = run(cli.command, cli.verbose > 0) {
        eprintln!("error: {}", error.user_message());
        std::process::exit(1);
    }
}

fn run(command: Command, verbose: bool) -> Result<(), CliError> {
    match command {
        Command::Pipeline(PipelineCommand::Run(args)) => handle_pipeline_run(&PipelineRunArgs {
            config_file: args.config_file,
            source: args.source,
            pattern: args.pattern,
            output_dir: args.output_dir,
            database_url: args.database_url,
            stages: args.stages,
            threshold: args.threshold,
            fail_fast: args.fail_fast,
            dry_run: args.dry_run,
            resume: args.resume,
            progress: args.progress,
            verbose,
        }),
        Command::Pipeline(PipelineCommand::Status { output_dir }) => {
            handle_pipeline_status(&PipelineStatusArgs { output_dir })
        }
        Command::Flatten {
            source,
            pattern,
            output_dir,
            progress,
        } => handle_flatten(&FlattenArgs {
            source,
            pattern,
            output_dir,
            progress,
        }),
        Command::Transform {
            input,
            output_dir,
            threshold,
        } => handle_transform(&TransformArgs {
            input,
            output_dir,
            threshold,
        }),
        Command::Schema(database) => run_schema(&database),
        Command::Load {
            database,
            output_dir,
            tables,
            fail_fast,
        } => run_load(&database, output_dir, tables, fail_fast),
    }
}

#[cfg(feature = "postgres")]
fn run_schema(database: &DatabaseArgs) -> Result<(), CliError> {
    consultation_etl::cli::commands::load::handle_schema(&database.resolve()?)
}

#[cfg(feature = "postgres")]
fn run_load(
    database: &DatabaseArgs,
    output_dir: PathBuf,
    tables: Vec<String>,
    fail_fast: bool,
) -> Result<(), CliError> {
    use consultation_etl::cli::commands::load::{LoadArgs, handle_load};

    handle_load(&LoadArgs {
        database_url: database.resolve()?,
        output_dir,
        tables,
        fail_fast,
    })
}

#[cfg(not(feature = "postgres"))]
fn run_schema(_database: &DatabaseArgs) -> Result<(), CliError> {
    Err(CliError::InvalidArgument(
        "built without the `postgres` feature".to_string(),
    ))
}

#[cfg(not(feature = "postgres"))]
fn run_load(
    _database: &DatabaseArgs,
    _output_dir: PathBuf,
    _tables: Vec<String>,
    _fail_fast: bool,
) -> Result<(), CliError> {
    Err(CliError::InvalidArgument(
        "built without the `postgres` feature".to_string(),
    ))
}
