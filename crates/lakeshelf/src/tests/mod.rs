use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use bytes::Bytes;
use lakeshelf_io::{ErrorKind, IOError, InMemoryStorage, LakeshelfStorage, Location};

use crate::{
    Catalog, DynAppConfig, StorageConfig,
    service::{DataWriter, Field, Schema, StorageDataWriter},
};

#[cfg(test)]
mod namespace_ops;

pub const TEST_WAREHOUSE_LOCATION: &str = "/warehouse";

#[derive(typed_builder::TypedBuilder, Debug)]
pub struct SetupTestCatalog<S: LakeshelfStorage> {
    storage: S,
    #[builder(default = TEST_WAREHOUSE_LOCATION.to_string(), setter(into))]
    warehouse_location: String,
    #[builder(default)]
    case_sensitive: bool,
    #[builder(default = 300)]
    list_timeout_secs: u64,
    #[builder(default, setter(strip_option))]
    writer: Option<Arc<dyn DataWriter>>,
}

impl<S: LakeshelfStorage> SetupTestCatalog<S> {
    /// # Panics
    /// If the catalog configuration is invalid.
    #[must_use]
    pub fn setup(self) -> Catalog<S> {
        let config = DynAppConfig {
            warehouse_location: self.warehouse_location,
            case_sensitive: self.case_sensitive,
            storage: StorageConfig {
                list_timeout_secs: self.list_timeout_secs,
            },
            ..DynAppConfig::default()
        };
        match self.writer {
            Some(writer) => Catalog::with_writer(self.storage, config, writer),
            None => Catalog::with_config(self.storage, config),
        }
        .unwrap()
    }
}

/// Catalog over a fresh [`InMemoryStorage`] located at [`TEST_WAREHOUSE_LOCATION`].
#[must_use]
pub fn memory_catalog() -> Catalog<InMemoryStorage> {
    SetupTestCatalog::builder()
        .storage(InMemoryStorage::new())
        .build()
        .setup()
}

#[must_use]
pub fn key_values(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

/// `(id bigint not null, p int)`
#[must_use]
pub fn id_p_schema() -> Schema {
    Schema::new(vec![Field::new("id", "bigint").not_null(), Field::new("p", "int")])
}

/// Storage whose listings can be made to fail or to hang.
#[derive(Debug, Clone, Default)]
pub struct ControlledStorage {
    pub inner: InMemoryStorage,
    fail_list: Arc<AtomicBool>,
    block_list: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
}

impl ControlledStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn block_list(&self, block: bool) {
        self.block_list.store(block, Ordering::SeqCst);
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LakeshelfStorage for ControlledStorage {
    async fn list(&self, location: &Location) -> Result<Vec<Location>, IOError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(IOError::new(
                ErrorKind::Unexpected,
                "Listing is unavailable",
                location.as_str(),
            ));
        }
        if self.block_list.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.inner.list(location).await
    }

    async fn read(&self, location: &Location) -> Result<Bytes, IOError> {
        self.inner.read(location).await
    }

    async fn write(&self, location: &Location, data: Bytes) -> Result<(), IOError> {
        self.inner.write(location, data).await
    }

    async fn delete(&self, location: &Location) -> Result<(), IOError> {
        self.inner.delete(location).await
    }

    async fn remove_all(&self, location: &Location) -> Result<(), IOError> {
        self.inner.remove_all(location).await
    }
}

/// Data writer over a storage that can be switched to fail every write.
#[derive(Debug)]
pub struct ControlledWriter<S> {
    inner: StorageDataWriter<S>,
    fail: AtomicBool,
}

impl<S: LakeshelfStorage> ControlledWriter<S> {
    #[must_use]
    pub fn new(storage: S) -> Arc<Self> {
        Arc::new(Self {
            inner: StorageDataWriter::new(storage),
            fail: AtomicBool::new(false),
        })
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl<S: LakeshelfStorage> DataWriter for ControlledWriter<S> {
    async fn write(
        &self,
        target: &Location,
        provider: &str,
        payload: Bytes,
    ) -> Result<Location, IOError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IOError::new(
                ErrorKind::Unexpected,
                "Writer is unavailable",
                target.as_str(),
            ));
        }
        self.inner.write(target, provider, payload).await
    }
}
