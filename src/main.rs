use clap::Parser;
use fund_ingest::app::{process_once, run_dev, run_prod};
use fund_ingest::config::{
    AppConfig, Cli, Command, LogFormat, ProcessArgs, RunMode, ServeArgs, DEFAULT_CONFIG_FILE,
};
use fund_ingest::utils::error::IngestError;
use fund_ingest::utils::{logger, validation::Validate};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command.clone() {
        Command::Serve(args) => serve(&cli, args).await,
        Command::Process(args) => process(&cli, args).await,
    };

    if let Err(e) = result {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ fund-ingest failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn serve(cli: &Cli, args: ServeArgs) -> Result<(), IngestError> {
    let mode = if args.reload {
        RunMode::Dev
    } else {
        RunMode::Prod
    };
    let config_path = cli.config.clone();

    // 每次重新載入都套用相同的命令列覆寫
    let load_config = move || -> Result<AppConfig, IngestError> {
        let mut config = AppConfig::load(config_path.as_deref())?;
        args.apply(&mut config);
        config.validate()?;
        Ok(config)
    };

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            init_logger(mode.default_log_format(), cli.verbose);
            return Err(e);
        }
    };
    init_logger(mode.log_format(&config), cli.verbose);

    tracing::info!("Starting fund-ingest in {} mode", mode);
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    match mode {
        RunMode::Dev => run_dev(load_config, config_file(cli), shutdown_signal()).await,
        RunMode::Prod => run_prod(config, shutdown_signal()).await,
    }
}

async fn process(cli: &Cli, args: ProcessArgs) -> Result<(), IngestError> {
    init_logger(LogFormat::Compact, cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    config.validate()?;

    let outcome = process_once(&config, args.fund_id, &args.file).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_completed() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logger(format: LogFormat, verbose: bool) {
    match format {
        LogFormat::Compact => logger::init_cli_logger(verbose),
        LogFormat::Json => logger::init_json_logger(verbose),
    }
}

/// The config file in use, which dev mode watches when nothing else is configured.
fn config_file(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_FILE);
        default.exists().then(|| default.to_path_buf())
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C"),
        Err(e) => {
            tracing::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
