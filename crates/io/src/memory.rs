use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{ErrorKind, IOError, LakeshelfStorage, Location};

/// Process-local storage for tests. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    files: Arc<RwLock<BTreeMap<Location, Bytes>>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait::async_trait]
impl LakeshelfStorage for InMemoryStorage {
    async fn list(&self, location: &Location) -> Result<Vec<Location>, IOError> {
        Ok(self
            .files
            .read()
            .keys()
            .filter(|file| file.is_sublocation_of(location))
            .cloned()
            .collect())
    }

    async fn read(&self, location: &Location) -> Result<Bytes, IOError> {
        self.files.read().get(location).cloned().ok_or_else(|| {
            IOError::new(ErrorKind::NotFound, "File does not exist", location.as_str())
        })
    }

    async fn write(&self, location: &Location, data: Bytes) -> Result<(), IOError> {
        self.files.write().insert(location.clone(), data);
        Ok(())
    }

    async fn delete(&self, location: &Location) -> Result<(), IOError> {
        self.files.write().remove(location);
        Ok(())
    }

    async fn remove_all(&self, location: &Location) -> Result<(), IOError> {
        self.files
            .write()
            .retain(|file, _| !file.is_sublocation_of(location));
        Ok(())
    }
}
