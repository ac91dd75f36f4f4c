use bytes::Bytes;
use lakeshelf_io::{IOError, LakeshelfStorage, Location};
use uuid::Uuid;

/// Collaborator performing the row-data write of a catalog-mediated write.
///
/// The catalog only decides the target location. What lands there, and in
/// which format, is up to the writer.
#[async_trait::async_trait]
pub trait DataWriter: std::fmt::Debug + Send + Sync + 'static {
    /// Write `payload` as a new file below `target` and return its location.
    async fn write(
        &self,
        target: &Location,
        provider: &str,
        payload: Bytes,
    ) -> Result<Location, IOError>;
}

/// Writes every payload verbatim as `part-<uuid>.<provider>` through the
/// catalog's storage.
#[derive(Debug, Clone)]
pub struct StorageDataWriter<S> {
    storage: S,
}

impl<S: LakeshelfStorage> StorageDataWriter<S> {
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

#[async_trait::async_trait]
impl<S: LakeshelfStorage> DataWriter for StorageDataWriter<S> {
    async fn write(
        &self,
        target: &Location,
        provider: &str,
        payload: Bytes,
    ) -> Result<Location, IOError> {
        let file = target.child(&format!("part-{}.{provider}", Uuid::now_v7()));
        self.storage.write(&file, payload).await?;
        tracing::debug!(file = %file, "Wrote data file");
        Ok(file)
    }
}
