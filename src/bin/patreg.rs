use clap::{Parser, Subcommand};
use patreg::lens::dashboard::PatientSearchArgs;
use patreg::lens::patient::PatientListArgs;
use patreg::lens::query::QueryArgs;
use patreg::lens::registration::PatientForm;
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.patreg/patreg.toml is used
    #[clap(short, long, global = true)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new patient
    Register(PatientForm),

    /// Change fields of an existing patient
    Edit(commands::edit::EditArgs),

    /// Show one patient
    Show(commands::show::ShowArgs),

    /// List patients, newest first
    List(PatientListArgs),

    /// Find patients by first or last name
    Search(PatientSearchArgs),

    /// Run a SQL statement against the registry
    Query(QueryArgs),

    /// Export query results as CSV or JSON
    Export(commands::export::ExportCommandArgs),

    /// Registry statistics
    Stats,

    /// Start the WebSocket server
    Serve(commands::serve::ServeArgs),

    /// Show configuration and database status
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match PatregConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => commands::fail(e),
    };

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::INFO } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let format = cli.format;
    match cli.command {
        Commands::Register(form) => commands::register::run(&config, form, format).await,
        Commands::Edit(args) => commands::edit::run(&config, args, format).await,
        Commands::Show(args) => commands::show::run(&config, args, format).await,
        Commands::List(args) => commands::list::run(&config, args, format).await,
        Commands::Search(args) => commands::search::run(&config, args, format).await,
        Commands::Query(args) => commands::query::run(&config, args, format).await,
        Commands::Export(args) => commands::export::run(&config, args).await,
        Commands::Stats => commands::stats::run(&config, format).await,
        Commands::Serve(args) => commands::serve::run(&config, args).await,
        Commands::Config => commands::config::run(&config, format),
    }
}
