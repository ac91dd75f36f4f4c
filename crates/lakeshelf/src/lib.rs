#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::large_enum_variant,
    clippy::missing_errors_doc
)]
#![forbid(unsafe_code)]
mod config;
pub mod service;
pub use config::{
    CONFIG, CacheConfig, DEFAULT_NAMESPACE, DynAppConfig, StorageConfig, TableStateCacheConfig,
};
pub use service::{Catalog, QualifiedTableName, Session, TableIdent};

pub use async_trait;
pub use bytes;
pub use lakeshelf_io::{LakeshelfStorage, LocalStorage, Location};
pub use tokio;
pub use tokio_util::sync::CancellationToken;
pub use tracing;

#[cfg(any(test, feature = "test-utils"))]
pub mod tests;
