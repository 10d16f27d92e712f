use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use roc2rawsplits::client::RocHttpClient;
use roc2rawsplits::config::{CONFIG_FILE_NAME, Config, ConfigLoader, ResolvedConfig};
use roc2rawsplits::controller::FetchController;
use roc2rawsplits::domain::ApiPreset;
use roc2rawsplits::error::RocError;
use roc2rawsplits::log::{FileLog, LogSink, TeeLog, TracingLog};
use roc2rawsplits::output::ConsoleObserver;
use roc2rawsplits::poller::Poller;

#[derive(Parser)]
#[command(name = "roc2rawsplits")]
#[command(about = "Download split times from a ROC API and save them as a RACOM raw splits file")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Poll the API on a fixed interval (default)")]
    Run(RunArgs),
    #[command(about = "Run a single download cycle")]
    Once(SessionArgs),
    #[command(about = "Write a config file from the given options")]
    Init(InitArgs),
    #[command(about = "List predefined ROC API endpoints")]
    Presets,
}

#[derive(Args, Clone, Default)]
struct SessionArgs {
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long)]
    api: Option<ApiPreset>,

    #[arg(long)]
    race: Option<u32>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    last_id: Option<i64>,

    #[arg(long, conflicts_with = "last_id")]
    no_last_id: bool,

    #[arg(long)]
    log_file: Option<Utf8PathBuf>,

    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    quiet: bool,

    /// Store the final lastId back into the config file.
    #[arg(long)]
    save_cursor: bool,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[arg(long)]
    interval: Option<u64>,

    #[arg(long)]
    cycles: Option<u64>,
}

#[derive(Args)]
struct InitArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[arg(long)]
    interval: Option<u64>,

    #[arg(long)]
    path: Option<Utf8PathBuf>,

    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<RocError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RocError) -> u8 {
    match error {
        RocError::ConfigRead(_)
        | RocError::ConfigParse(_)
        | RocError::InvalidConfig(_) => 2,
        RocError::Http(_) | RocError::HttpStatus { .. } => 3,
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
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_poll(config_path, args),
        Commands::Once(args) => run_once(config_path, args),
        Commands::Init(args) => run_init(config_path, args),
        Commands::Presets => {
            for preset in ApiPreset::ALL {
                println!("{preset:<12} {:<14} {}", preset.label(), preset.url());
            }
            Ok(())
        }
    }
}

fn overrides(session: &SessionArgs, interval: Option<u64>) -> Config {
    Config {
        api_url: session.api_url.clone(),
        api_preset: session.api,
        race: session.race,
        output: session.output.clone(),
        use_last_id: session.no_last_id.then_some(false),
        last_id: session.last_id,
        interval_secs: interval,
        timeout_secs: session.timeout,
        log_file: session.log_file.clone(),
    }
}

fn build_controller(
    resolved: &ResolvedConfig,
    session: &SessionArgs,
) -> Result<FetchController<Box<dyn LogSink>>, RocError> {
    let log: Box<dyn LogSink> = match &resolved.log_file {
        Some(path) => Box::new(TeeLog::new(TracingLog, FileLog::open(path)?)),
        None => Box::new(TracingLog),
    };
    let mut controller = FetchController::new(resolved.controller_settings(), log);
    controller.add_observer(Box::new(ConsoleObserver {
        quiet: session.quiet,
    }));
    Ok(controller)
}

fn run_poll(config_path: Option<&str>, args: RunArgs) -> miette::Result<()> {
    let seed = overrides(&args.session, args.interval);
    let resolved = ConfigLoader::resolve(config_path, seed.clone())?;
    let transport = Arc::new(RocHttpClient::with_timeout(resolved.timeout)?);
    let mut controller = build_controller(&resolved, &args.session)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, finishing in-flight download");
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| miette::Report::msg(format!("cannot install Ctrl-C handler: {err}")))?;

    tracing::info!(
        url = %resolved.api_url,
        race = resolved.race,
        output = %resolved.output,
        interval_secs = resolved.interval.as_secs(),
        "polling started"
    );
    let cycles = Poller::new(resolved.interval)
        .with_max_cycles(args.cycles)
        .run(&mut controller, transport, &stop);
    tracing::info!(cycles, punches = controller.store().len(), "polling finished");

    if args.session.save_cursor {
        save_cursor(&resolved, seed, controller.cursor())?;
    }
    Ok(())
}

fn run_once(config_path: Option<&str>, args: SessionArgs) -> miette::Result<()> {
    let seed = overrides(&args, None);
    let resolved = ConfigLoader::resolve(config_path, seed.clone())?;
    let transport = RocHttpClient::with_timeout(resolved.timeout)?;
    let mut controller = build_controller(&resolved, &args)?;

    let summary = controller.run_cycle(&transport);
    if args.save_cursor {
        save_cursor(&resolved, seed, controller.cursor())?;
    }
    match summary.and_then(|summary| summary.transport_error) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn run_init(config_path: Option<&str>, args: InitArgs) -> miette::Result<()> {
    let path = args
        .path
        .or_else(|| config_path.map(Utf8PathBuf::from))
        .unwrap_or_else(|| Utf8PathBuf::from(CONFIG_FILE_NAME));
    if path.as_std_path().exists() && !args.force {
        return Err(miette::Report::msg(format!(
            "{path} already exists (use --force to overwrite)"
        )));
    }

    let config = overrides(&args.session, args.interval);
    ConfigLoader::resolve_config(config.clone())?;
    ConfigLoader::write(&path, &config)?;
    println!("wrote {path}");
    Ok(())
}

fn save_cursor(resolved: &ResolvedConfig, seed: Config, cursor: i64) -> Result<(), RocError> {
    match ConfigLoader::save_last_id(resolved, seed, cursor)? {
        Some(path) => tracing::info!(%path, cursor, "lastId saved"),
        None => tracing::info!("lastId not used, nothing saved"),
    }
    Ok(())
}
