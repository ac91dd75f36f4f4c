use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use lakeshelf_io::{LakeshelfStorage, Location};
use moka::future::Cache;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use super::{
    CachedTableState, CatalogInitError, CatalogLoadTableError, CatalogResolveTableError,
    DataWriter, IdentifierPolicy, InvalidLocation, Namespace, NamespaceNotFound, PartitionEntry,
    PartitionSpec, QualifiedTableName, Session, StorageDataWriter, Table, TableId, TableIdent,
    TableNotFound,
};
use crate::{CONFIG, DynAppConfig};

/// Lock entries are pruned once the map grows beyond this size.
const TABLE_LOCKS_PRUNE_THRESHOLD: usize = 1024;

/// The catalog: namespaces, tables, partitions and the cached file state of
/// tables, backed by a storage collaborator.
///
/// Cloning is cheap; clones share all state.
#[derive(derive_more::Debug)]
pub struct Catalog<S: LakeshelfStorage> {
    pub(crate) inner: Arc<CatalogInner<S>>,
}

impl<S: LakeshelfStorage> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[derive(derive_more::Debug)]
pub(crate) struct CatalogInner<S: LakeshelfStorage> {
    pub(crate) config: DynAppConfig,
    pub(crate) policy: IdentifierPolicy,
    pub(crate) default_namespace: String,
    pub(crate) warehouse_location: Location,
    pub(crate) state: RwLock<CatalogState>,
    pub(crate) locks: TableLocks,
    pub(crate) storage: S,
    pub(crate) writer: Arc<dyn DataWriter>,
    #[debug(skip)]
    pub(crate) table_states: Cache<TableId, Arc<CachedTableState>>,
}

/// Authoritative metadata of the catalog.
#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    pub(crate) namespaces: HashMap<String, NamespaceEntry>,
}

#[derive(Debug)]
pub(crate) struct NamespaceEntry {
    pub(crate) namespace: Arc<Namespace>,
    pub(crate) tables: BTreeMap<String, TableEntry>,
}

impl NamespaceEntry {
    pub(crate) fn new(namespace: Namespace) -> Self {
        Self {
            namespace: Arc::new(namespace),
            tables: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TableEntry {
    pub(crate) table: Arc<Table>,
    pub(crate) partitions: BTreeMap<PartitionSpec, PartitionEntry>,
    /// Number of completed refreshes of this table.
    pub(crate) generation: u64,
}

impl TableEntry {
    pub(crate) fn new(table: Arc<Table>) -> Self {
        Self {
            table,
            partitions: BTreeMap::new(),
            generation: 0,
        }
    }

    pub(crate) fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            table: self.table.clone(),
            partitions: self.partitions.values().cloned().collect(),
            generation: self.generation,
        }
    }
}

/// A consistent copy of a table's metadata taken under the state lock.
#[derive(Debug, Clone)]
pub(crate) struct TableSnapshot {
    pub(crate) table: Arc<Table>,
    pub(crate) partitions: Vec<PartitionEntry>,
    pub(crate) generation: u64,
}

impl CatalogState {
    pub(crate) fn table(&self, name: &QualifiedTableName) -> Option<&TableEntry> {
        self.namespaces
            .get(&name.namespace)
            .and_then(|ns| ns.tables.get(&name.name))
    }

    pub(crate) fn table_mut(&mut self, name: &QualifiedTableName) -> Option<&mut TableEntry> {
        self.namespaces
            .get_mut(&name.namespace)
            .and_then(|ns| ns.tables.get_mut(&name.name))
    }
}

/// Serializes mutations per qualified table name.
#[derive(Debug, Default)]
pub(crate) struct TableLocks {
    locks: Mutex<HashMap<QualifiedTableName, Arc<tokio::sync::Mutex<()>>>>,
}

impl TableLocks {
    pub(crate) async fn lock(&self, table: &QualifiedTableName) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() > TABLE_LOCKS_PRUNE_THRESHOLD {
                // Entries only referenced by the map are neither held nor awaited.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(table.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Lock several tables in a deadlock-free order.
    pub(crate) async fn lock_all(
        &self,
        tables: impl IntoIterator<Item = QualifiedTableName>,
    ) -> Vec<OwnedMutexGuard<()>> {
        let mut tables = tables.into_iter().collect::<Vec<_>>();
        tables.sort();
        tables.dedup();
        let mut guards = Vec::with_capacity(tables.len());
        for table in &tables {
            guards.push(self.lock(table).await);
        }
        guards
    }
}

impl<S: LakeshelfStorage> Catalog<S> {
    /// Create a catalog configured from [`CONFIG`].
    ///
    /// # Errors
    /// Fails if the configured default namespace or warehouse location is invalid.
    pub fn new(storage: S) -> Result<Self, CatalogInitError> {
        Self::with_config(storage, CONFIG.clone())
    }

    /// Create a catalog writing data through [`StorageDataWriter`].
    ///
    /// # Errors
    /// Fails if the configured default namespace or warehouse location is invalid.
    pub fn with_config(storage: S, config: DynAppConfig) -> Result<Self, CatalogInitError> {
        let writer = Arc::new(StorageDataWriter::new(storage.clone()));
        Self::with_writer(storage, config, writer)
    }

    /// Create a catalog with a custom data writer.
    ///
    /// # Errors
    /// Fails if the configured default namespace or warehouse location is invalid.
    pub fn with_writer(
        storage: S,
        config: DynAppConfig,
        writer: Arc<dyn DataWriter>,
    ) -> Result<Self, CatalogInitError> {
        let policy = IdentifierPolicy {
            case_sensitive: config.case_sensitive,
        };
        let default_namespace = policy.validated(&config.default_namespace)?;
        let mut warehouse_location = Location::parse(config.warehouse_location.clone())
            .map_err(InvalidLocation::from)?;
        warehouse_location.without_trailing_slash();

        let mut state = CatalogState::default();
        state.namespaces.insert(
            default_namespace.clone(),
            NamespaceEntry::new(Namespace::new(
                default_namespace.clone(),
                warehouse_location.clone(),
                HashMap::from([(
                    "comment".to_string(),
                    "Default database".to_string(),
                )]),
            )),
        );

        let table_states = Cache::builder()
            .max_capacity(config.cache.table_state.capacity)
            .initial_capacity(64)
            .build();

        tracing::info!(
            warehouse_location = %warehouse_location,
            default_namespace = %default_namespace,
            "Initialized catalog"
        );

        Ok(Self {
            inner: Arc::new(CatalogInner {
                config,
                policy,
                default_namespace,
                warehouse_location,
                state: RwLock::new(state),
                locks: TableLocks::default(),
                storage,
                writer,
                table_states,
            }),
        })
    }

    /// Start a new session in the default namespace.
    #[must_use]
    pub fn new_session(&self) -> Session {
        Session::new(self.inner.default_namespace.clone())
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    #[must_use]
    pub fn config(&self) -> &DynAppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.inner.default_namespace
    }

    #[must_use]
    pub fn warehouse_location(&self) -> &Location {
        &self.inner.warehouse_location
    }

    /// Normalized namespace an operation targets, explicit or from the session.
    pub(crate) fn resolve_namespace_name(
        &self,
        session: &Session,
        explicit: Option<&str>,
    ) -> String {
        self.inner
            .policy
            .normalize(session.resolve_namespace(explicit))
    }

    /// Resolve a table reference: validate the table name first, then require
    /// the namespace to exist. The table itself may or may not exist.
    pub(crate) fn resolve_table_name(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<QualifiedTableName, CatalogResolveTableError> {
        let name = self.inner.policy.validated(&ident.name)?;
        let namespace = self.resolve_namespace_name(session, ident.namespace.as_deref());
        if !self.inner.state.read().namespaces.contains_key(&namespace) {
            return Err(NamespaceNotFound::new(namespace).into());
        }
        Ok(QualifiedTableName::new(namespace, name))
    }

    /// Snapshot of an existing table's metadata.
    pub(crate) fn table_snapshot(
        &self,
        name: &QualifiedTableName,
    ) -> Result<TableSnapshot, CatalogLoadTableError> {
        let state = self.inner.state.read();
        let Some(namespace) = state.namespaces.get(&name.namespace) else {
            return Err(NamespaceNotFound::new(name.namespace.clone()).into());
        };
        namespace
            .tables
            .get(&name.name)
            .map(TableEntry::snapshot)
            .ok_or_else(|| TableNotFound::new(name.clone()).into())
    }

    pub(crate) async fn invalidate_table_state(&self, table_id: TableId) {
        tracing::debug!(%table_id, "Invalidating cached table state");
        self.inner.table_states.invalidate(&table_id).await;
    }
}
