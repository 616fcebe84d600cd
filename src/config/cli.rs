use crate::config::toml_config::AppConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "fund-ingest")]
#[command(about = "Fund document ingestion server")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the JSON-RPC server and its worker pool
    Serve(ServeArgs),
    /// Process one document immediately and print the outcome
    Process(ProcessArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Restart when watched files change (development mode)
    #[arg(long)]
    pub reload: bool,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Number of background workers
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub data_dir: Option<String>,

    /// Extra files or directories to watch with --reload
    #[arg(long, value_delimiter = ',')]
    pub watch: Vec<String>,

    /// Log system stats after every document
    #[arg(long)]
    pub monitor: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ProcessArgs {
    /// Fund the document belongs to
    #[arg(long)]
    pub fund_id: u64,

    /// CSV, TSV or ZIP document
    pub file: PathBuf,

    #[arg(long)]
    pub data_dir: Option<String>,
}

impl ServeArgs {
    /// 命令列參數覆蓋設定檔
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(workers) = self.workers {
            config.workers.count = Some(workers);
        }
        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
        config.reload.watch.extend(self.watch.iter().cloned());
        if self.monitor {
            config.monitoring.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_prod_invocation() {
        let cli = Cli::parse_from([
            "fund-ingest",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "8000",
            "--workers",
            "2",
        ]);

        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(!args.reload);

        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        args.apply(&mut config);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.workers.count, Some(2));
    }

    #[test]
    fn test_run_dev_invocation() {
        let cli = Cli::parse_from([
            "fund-ingest",
            "serve",
            "--reload",
            "--watch",
            "fixtures,fund-ingest.toml",
            "-v",
        ]);

        assert!(cli.verbose);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(args.reload);

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.reload.watch, vec!["fixtures", "fund-ingest.toml"]);
        assert_eq!(config.workers.count, None);
    }

    #[test]
    fn test_process_invocation() {
        let cli = Cli::parse_from([
            "fund-ingest",
            "--config",
            "custom.toml",
            "process",
            "--fund-id",
            "12",
            "statement.zip",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        let Command::Process(args) = cli.command else {
            panic!("expected process");
        };
        assert_eq!(args.fund_id, 12);
        assert_eq!(args.file, PathBuf::from("statement.zip"));
    }
}
