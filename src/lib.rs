pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;
pub mod worker;

pub use adapters::{DelimitedTableSource, FileRepository, LocalStorage};
pub use app::Application;
pub use config::{AppConfig, RunMode};
pub use core::DocumentProcessor;
pub use utils::error::{IngestError, Result};
