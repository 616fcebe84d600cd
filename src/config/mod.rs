pub mod cli;
pub mod toml_config;

pub use cli::{Cli, Command, ProcessArgs, ServeArgs};
pub use toml_config::{AppConfig, LogFormat, DEFAULT_CONFIG_FILE};

use std::fmt;

/// dev: 單一 worker、可讀日誌、檔案變更時重新啟動
/// prod: 多個 worker、JSON 日誌
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Dev,
    Prod,
}

impl RunMode {
    pub fn default_workers(self) -> usize {
        match self {
            RunMode::Dev => 1,
            RunMode::Prod => 2,
        }
    }

    pub fn default_log_format(self) -> LogFormat {
        match self {
            RunMode::Dev => LogFormat::Compact,
            RunMode::Prod => LogFormat::Json,
        }
    }

    /// Configured worker count, or this mode's default.
    pub fn worker_count(self, config: &AppConfig) -> usize {
        config.workers.count.unwrap_or_else(|| self.default_workers())
    }

    pub fn log_format(self, config: &AppConfig) -> LogFormat {
        config
            .logging
            .format
            .unwrap_or_else(|| self.default_log_format())
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Dev => write!(f, "dev"),
            RunMode::Prod => write!(f, "prod"),
        }
    }
}
