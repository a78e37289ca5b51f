use std::fs::{self, File};
use std::process::ExitCode;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use runfolder_cleaner::auth::{Credential, CredentialCache, resolve_credential};
use runfolder_cleaner::config::{ConfigLoader, Overrides};
use runfolder_cleaner::error::CleanerError;
use runfolder_cleaner::manager::RunFolderManager;
use runfolder_cleaner::output::{JsonOutput, OutputMode, RunLog, TextOutput};
use runfolder_cleaner::remote::DnanexusHttpClient;

#[derive(Parser)]
#[command(name = "rf-cleaner")]
#[command(about = "Delete local runfolders once their DNAnexus upload is verified")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check runfolders and delete the ones that are safely uploaded")]
    Run(RunArgs),
    #[command(about = "Manage the cached DNAnexus auth token")]
    Key(KeyArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, help = "Directory containing runfolders to process")]
    runfolders_dir: Utf8PathBuf,

    #[arg(long, help = "File containing the DNAnexus auth token (defaults to the cached token)")]
    auth: Option<Utf8PathBuf>,

    #[arg(long, help = "Report what would be deleted without deleting anything")]
    dry_run: bool,

    #[arg(long, help = "Age in days a runfolder must reach before it is considered")]
    min_age: Option<u64>,

    #[arg(long, help = "Minimum number of logfiles in the project's logfile folder")]
    logfile_count: Option<usize>,

    #[arg(long, help = "Directory for the run's logfile and JSON-lines report")]
    log_dir: Option<Utf8PathBuf>,

    #[arg(long, help = "Directory holding <runfolder>_upload_runfolder.log files")]
    upload_log_dir: Option<Utf8PathBuf>,

    #[arg(long, help = "JSON config file (defaults to ./rf-cleaner.json when present)")]
    config: Option<Utf8PathBuf>,

    #[arg(long, help = "Number of runfolders evaluated concurrently")]
    workers: Option<usize>,

    #[arg(long, help = "Print the run summary as JSON")]
    json: bool,
}

#[derive(Args)]
struct KeyArgs {
    #[command(subcommand)]
    command: KeyCommand,
}

#[derive(Subcommand)]
enum KeyCommand {
    #[command(about = "Cache a DNAnexus auth token for future runs")]
    Set { token: String },
    #[command(about = "Print the cached DNAnexus auth token")]
    Show,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CleanerError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CleanerError) -> u8 {
    match error {
        CleanerError::InvalidRoot(_)
        | CleanerError::MissingCredential(_)
        | CleanerError::EmptyCredential(_)
        | CleanerError::RejectedCredential { .. }
        | CleanerError::CredentialCache(_)
        | CleanerError::ConfigRead(_)
        | CleanerError::ConfigParse(_)
        | CleanerError::InvalidPattern { .. }
        | CleanerError::InvalidSetting(_) => 2,
        CleanerError::RemoteHttp(_)
        | CleanerError::RemoteStatus { .. }
        | CleanerError::RemoteFileNotFound(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_cleaner(args),
        Commands::Key(args) => run_key(args),
    }
}

fn run_key(args: KeyArgs) -> miette::Result<()> {
    init_logging(None)?;
    let cache = CredentialCache::new()?;
    match args.command {
        KeyCommand::Set { token } => {
            let credential = Credential::new(&token)
                .ok_or_else(|| miette::Report::msg("auth token must not be empty"))?;
            cache.store(&credential)?;
            println!("cached auth token in {}", cache.path());
        }
        KeyCommand::Show => {
            let credential = cache.load()?;
            println!("{}", credential.token());
        }
    }
    Ok(())
}

fn run_cleaner(args: RunArgs) -> miette::Result<()> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let log_file = match &args.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| CleanerError::Filesystem(format!("create {dir}: {err}")))?;
            Some(dir.join(format!("{timestamp}_rf_cleaner.log")))
        }
        None => None,
    };
    init_logging(log_file.as_deref())?;
    info!(log_file = ?log_file, "START");

    let root = args.runfolders_dir;
    if !root.as_std_path().is_dir() {
        return Err(CleanerError::InvalidRoot(root).into());
    }
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let overrides = Overrides {
        min_age_days: args.min_age,
        logfile_count: args.logfile_count,
        workers: args.workers,
        upload_log_dir: args.upload_log_dir,
    };
    let settings = ConfigLoader::resolve_settings(config, overrides, &root)?;

    let cache = CredentialCache::new()?;
    let credential = resolve_credential(args.auth.as_deref(), &cache)?;
    let remote = DnanexusHttpClient::new(&credential)?;

    let manager = RunFolderManager::new(&root, remote, settings, args.dry_run)?;
    let summary = manager.run()?;

    if let Some(dir) = &args.log_dir {
        let mut run_log = RunLog::create(dir.join(format!("{timestamp}_rf_cleaner_reports.jsonl")))?;
        run_log.write_summary(&summary, &chrono::Local::now().to_rfc3339())?;
        info!(path = %run_log.path(), "wrote run report");
    }

    let output_mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&summary).into_diagnostic()?,
    }
    info!("END");
    Ok(())
}

fn init_logging(log_file: Option<&Utf8Path>) -> Result<(), CleanerError> {
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path.as_std_path())
                .map_err(|err| CleanerError::LogSetup(format!("create {path}: {err}")))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| CleanerError::LogSetup(err.to_string()))
}
