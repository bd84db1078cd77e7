use std::env;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use mycocosm_etl::app::App;
use mycocosm_etl::config::{ConfigLoader, PipelineConfig};
use mycocosm_etl::domain::OrganismId;
use mycocosm_etl::error::{FailureClass, MycoError};
use mycocosm_etl::jgi::{FileListClient, JgiHttpClient};
use mycocosm_etl::output::{ConsoleSink, ConsoleSummary, JsonOutput, OutputMode};
use mycocosm_etl::table::{MycocosmHttpClient, PortalPageClient};

const TOKEN_ENV: &str = "JGI_API_TOKEN";

#[derive(Parser)]
#[command(name = "mycocosm-etl")]
#[command(about = "Collect MycoCosm genome metadata and prepare proteomes for comparative genomics")]
#[command(version, author)]
struct Cli {
    /// JSON config file (defaults to ./mycocosm-etl.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Overrides the configured data directory
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Print stage results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    #[command(about = "Scrape the genome-portal table")]
    Table,
    #[command(about = "Fetch file listings for the selected organisms and flatten them")]
    Files,
    #[command(about = "Rebuild the file table from saved listings")]
    Flatten,
    #[command(about = "Partition organisms by phylogeny completeness")]
    Reconcile,
    #[command(about = "Extract proteome archives and normalise FASTA headers")]
    Proteomes,
    #[command(about = "Apply portal-specific header rules to processed proteomes")]
    RenameCustom,
    #[command(about = "Keep sequences inside the configured length window")]
    Filter,
    #[command(about = "Run every stage in order")]
    Run,
}

impl Command {
    fn needs_portal_page(self) -> bool {
        matches!(self, Command::Table | Command::Run)
    }

    fn needs_file_list(self) -> bool {
        matches!(self, Command::Files | Command::Run)
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<MycoError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MycoError) -> u8 {
    match error.class() {
        FailureClass::Config => 2,
        FailureClass::Network => 3,
        FailureClass::Fatal => 4,
        FailureClass::Parse | FailureClass::Filesystem => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = OutputMode::from_json_flag(cli.json);

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(Utf8PathBuf::from(data_dir));
    }
    tracing::debug!(data_dir = %config.data_dir, "resolved configuration");

    let command = cli.command;
    match (command.needs_portal_page(), command.needs_file_list()) {
        (true, true) => {
            let files = jgi_client(&config)?;
            let app = App::new(config, MycocosmHttpClient::new()?, files);
            run_command(command, &app, output_mode)
        }
        (true, false) => {
            let app = App::new(config, MycocosmHttpClient::new()?, NopFileList);
            run_command(command, &app, output_mode)
        }
        (false, true) => {
            let files = jgi_client(&config)?;
            let app = App::new(config, NopPortalPage, files);
            run_command(command, &app, output_mode)
        }
        (false, false) => {
            let app = App::new(config, NopPortalPage, NopFileList);
            run_command(command, &app, output_mode)
        }
    }
}

fn jgi_client(config: &PipelineConfig) -> Result<JgiHttpClient, MycoError> {
    let token = env::var(TOKEN_ENV).map_err(|_| MycoError::MissingToken)?;
    JgiHttpClient::new(&config.api_base_url, &token)
}

fn run_command<P: PortalPageClient, F: FileListClient>(
    command: Command,
    app: &App<P, F>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => {
            let sink = JsonOutput;
            match command {
                Command::Table => JsonOutput::print_table(&app.fetch_table(&sink)),
                Command::Files => JsonOutput::print_files(&app.files(&sink)?),
                Command::Flatten => {
                    let organisms = app.organism_ids()?;
                    let result = app.flatten(&organisms, &sink)?;
                    JsonOutput::print_flatten(&result)
                }
                Command::Reconcile => JsonOutput::print_reconcile(&app.reconcile(&sink)?),
                Command::Proteomes => JsonOutput::print_proteomes(&app.process_proteomes(&sink)?),
                Command::RenameCustom => JsonOutput::print_custom(&app.rename_custom(&sink)?),
                Command::Filter => JsonOutput::print_filter(&app.filter(&sink)?),
                Command::Run => JsonOutput::print_run(&app.run_all(&sink)?),
            }
            .into_diagnostic()
        }
        OutputMode::Console => {
            let sink = ConsoleSink;
            match command {
                Command::Table => ConsoleSummary::print_table(&app.fetch_table(&sink)),
                Command::Files => ConsoleSummary::print_files(&app.files(&sink)?),
                Command::Flatten => {
                    let organisms = app.organism_ids()?;
                    ConsoleSummary::print_flatten(&app.flatten(&organisms, &sink)?);
                }
                Command::Reconcile => ConsoleSummary::print_reconcile(&app.reconcile(&sink)?),
                Command::Proteomes => {
                    ConsoleSummary::print_proteomes(&app.process_proteomes(&sink)?)
                }
                Command::RenameCustom => ConsoleSummary::print_custom(&app.rename_custom(&sink)?),
                Command::Filter => ConsoleSummary::print_filter(&app.filter(&sink)?),
                Command::Run => ConsoleSummary::print_run(&app.run_all(&sink)?),
            }
            Ok(())
        }
    }
}

struct NopPortalPage;
struct NopFileList;

impl PortalPageClient for NopPortalPage {
    fn fetch_html(&self, _url: &str) -> Result<String, MycoError> {
        Err(MycoError::InvalidConfig(
            "portal page client not available for this command".to_string(),
        ))
    }
}

impl FileListClient for NopFileList {
    fn fetch_page(
        &self,
        _organism: &OrganismId,
        _page: u32,
        _per_page: u32,
    ) -> Result<String, MycoError> {
        Err(MycoError::MissingToken)
    }
}
