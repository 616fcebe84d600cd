// Adapters layer: concrete implementations for external systems (storage, table formats, http).

pub mod http;
pub mod repository;
pub mod storage;
pub mod table_source;

pub use http::{DocumentFetcher, FetchedDocument};
pub use repository::FileRepository;
pub use storage::LocalStorage;
pub use table_source::DelimitedTableSource;
