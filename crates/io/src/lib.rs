#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::pedantic
)]
#![allow(clippy::module_name_repetitions)]
#![forbid(unsafe_code)]

use bytes::Bytes;

mod error;
mod local;
mod location;
#[cfg(feature = "storage-in-memory")]
mod memory;

pub use error::{ErrorKind, IOError};
pub use local::LocalStorage;
pub use location::{InvalidLocationError, Location};
#[cfg(feature = "storage-in-memory")]
pub use memory::InMemoryStorage;

/// File names starting with one of these prefixes are bookkeeping files
/// of writers (`_SUCCESS`, `.part-0.crc`, ...) and never table data.
pub const HIDDEN_FILE_PREFIXES: [char; 2] = ['_', '.'];

/// Returns `true` if the last segment of `location` marks a hidden file.
#[must_use]
pub fn is_hidden_file(location: &Location) -> bool {
    location
        .file_name()
        .starts_with(|c| HIDDEN_FILE_PREFIXES.contains(&c))
}

/// Storage collaborator of the catalog.
///
/// The catalog never interprets file contents. It lists files to learn which
/// data exists, removes directories of managed tables and partitions, and
/// hands payloads to `write` on behalf of the data writer.
#[async_trait::async_trait]
pub trait LakeshelfStorage: std::fmt::Debug + Clone + Send + Sync + 'static {
    /// Recursively list all files below `location`.
    ///
    /// A location that does not exist yields an empty listing.
    /// Returned locations are children of `location` built by plain
    /// concatenation, sorted lexicographically.
    async fn list(&self, location: &Location) -> Result<Vec<Location>, IOError>;

    /// Read the full contents of a single file.
    async fn read(&self, location: &Location) -> Result<Bytes, IOError>;

    /// Write `data` to a single file, replacing any previous content.
    async fn write(&self, location: &Location, data: Bytes) -> Result<(), IOError>;

    /// Delete a single file. Deleting a missing file is not an error.
    async fn delete(&self, location: &Location) -> Result<(), IOError>;

    /// Recursively delete everything at or below `location`.
    /// Removing a missing location is not an error.
    async fn remove_all(&self, location: &Location) -> Result<(), IOError>;
}
