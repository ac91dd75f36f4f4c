use std::{
    collections::{BTreeSet, HashMap},
    fmt::{Display, Formatter},
    sync::Arc,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lakeshelf_io::{IOError, LakeshelfStorage, Location};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::{
    Catalog, CatalogCreateTableError, CatalogDropTableError, CatalogGetNamespaceError,
    CatalogInsertIntoError, CatalogLoadTableError, CatalogWriteDataError, IncompatibleTable,
    InvalidLocation, InvalidPartitionSpec, NamespaceNotFound, PartitionEntry, PartitionSpec,
    QualifiedTableName, Session, StorageUnavailable, TableAlreadyExists, TableIdent,
    TableNotFound,
    catalog::{TableEntry, TableSnapshot},
    namespace::merge_properties,
};

/// Provider used when a request does not name one.
pub const DEFAULT_PROVIDER: &str = "parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::From)]
pub struct TableId(Uuid);

impl TableId {
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum TableKind {
    /// Location derived from the namespace. Dropping removes the data.
    Managed,
    /// Location supplied by the caller. Dropping keeps the data.
    External,
}

/// Behaviour of a create request when the table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    ErrorIfExists,
    /// Add data to the existing table, which must be compatible.
    Append,
    /// Replace data and metadata of the existing table.
    Overwrite,
    /// Leave the existing table untouched.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub table_id: TableId,
    pub namespace: String,
    pub name: String,
    pub kind: TableKind,
    pub provider: String,
    pub schema: Schema,
    /// Normalized, in declaration order.
    pub partition_columns: Vec<String>,
    pub location: Location,
    pub properties: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Table {
    #[must_use]
    pub fn qualified_name(&self) -> QualifiedTableName {
        QualifiedTableName::new(self.namespace.as_str(), self.name.as_str())
    }

    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        !self.partition_columns.is_empty()
    }
}

/// Rows handed to the data writer, opaque to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub payload: Bytes,
    /// Target partition. Required for partitioned tables.
    pub partition: Vec<(String, String)>,
}

impl TableData {
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            partition: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_partition(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.partition.push((column.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateTableRequest {
    pub ident: TableIdent,
    #[builder(default = DEFAULT_PROVIDER.to_string(), setter(into))]
    pub provider: String,
    #[builder(default)]
    pub schema: Schema,
    #[builder(default)]
    pub partition_columns: Vec<String>,
    #[builder(default)]
    pub properties: HashMap<String, String>,
    #[builder(default)]
    pub mode: WriteMode,
    #[builder(default, setter(strip_option))]
    pub data: Option<TableData>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateExternalTableRequest {
    pub ident: TableIdent,
    #[builder(setter(into))]
    pub location: String,
    #[builder(default = DEFAULT_PROVIDER.to_string(), setter(into))]
    pub provider: String,
    #[builder(default)]
    pub schema: Schema,
    #[builder(default)]
    pub partition_columns: Vec<String>,
    #[builder(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct InsertIntoRequest {
    pub ident: TableIdent,
    pub data: TableData,
    /// Replace the table's data, or the target partition's data.
    #[builder(default)]
    pub overwrite: bool,
}

impl<S: LakeshelfStorage> Catalog<S> {
    /// Create or write a managed table located at
    /// `<namespace location>/<table name>`.
    ///
    /// # Errors
    /// - `InvalidIdentifier` if the table name is invalid
    /// - `NamespaceNotFound` if the namespace does not exist
    /// - `TableAlreadyExists` in [`WriteMode::ErrorIfExists`]
    /// - `IncompatibleTable` when appending with a different provider, schema
    ///   or partitioning
    /// - `InvalidPartitionSpec` or `StorageUnavailable` if writing data fails
    pub async fn create_table(
        &self,
        session: &Session,
        request: CreateTableRequest,
    ) -> Result<Arc<Table>, CatalogCreateTableError> {
        let CreateTableRequest {
            ident,
            provider,
            schema,
            partition_columns,
            properties,
            mode,
            data,
        } = request;
        let name = self.resolve_table_name(session, &ident)?;
        let partition_columns =
            self.normalize_partition_columns(&name, &schema, &partition_columns)?;

        let _guard = self.inner.locks.lock(&name).await;
        let namespace_location = self.namespace_location(&name.namespace)?;
        let existing = self.inner.state.read().table(&name).map(TableEntry::snapshot);

        match (existing, mode) {
            (Some(_), WriteMode::ErrorIfExists) => Err(TableAlreadyExists::new(name).into()),
            (Some(existing), WriteMode::Ignore) => Ok(existing.table),
            (Some(existing), WriteMode::Append) => {
                check_compatible(&existing.table, &provider, &schema, &partition_columns)?;
                if let Some(data) = data {
                    self.write_and_register(&existing, &data, false).await?;
                }
                Ok(existing.table)
            }
            (existing, mode) => {
                let table = Table {
                    table_id: TableId::new_random(),
                    namespace: name.namespace.clone(),
                    name: name.name.clone(),
                    kind: TableKind::Managed,
                    provider,
                    schema,
                    partition_columns,
                    location: namespace_location.child(&name.name),
                    properties,
                    created_at: Utc::now(),
                };

                // Replaced files are deleted only after the new data is written.
                let stale_files = if mode == WriteMode::Overwrite {
                    let mut roots = vec![table.location.clone()];
                    if let Some(existing) = existing
                        .as_ref()
                        .filter(|existing| existing.table.kind == TableKind::Managed)
                    {
                        roots.push(existing.table.location.clone());
                        roots.extend(existing.partitions.iter().map(|p| p.location.clone()));
                    }
                    self.list_files(&roots)
                        .await
                        .map_err(StorageUnavailable::from)?
                } else {
                    BTreeSet::new()
                };

                let mut entry = TableEntry::new(Arc::new(table));
                if let Some(data) = data {
                    let (_, partition) = self.write_data(&entry.table, &[], &data, false).await?;
                    if let Some(partition) = partition {
                        entry.partitions.insert(partition.spec.clone(), partition);
                    }
                }
                self.delete_files(&stale_files)
                    .await
                    .map_err(StorageUnavailable::from)?;
                let table = entry.table.clone();

                {
                    let mut state = self.inner.state.write();
                    let Some(namespace) = state.namespaces.get_mut(&name.namespace) else {
                        return Err(NamespaceNotFound::new(name.namespace).into());
                    };
                    namespace.tables.insert(name.name.clone(), entry);
                }
                if let Some(existing) = existing {
                    self.invalidate_table_state(existing.table.table_id).await;
                }

                tracing::info!(table = %name, location = %table.location, ?mode, "Created managed table");
                Ok(table)
            }
        }
    }

    /// Register a table over data at a caller supplied location.
    ///
    /// # Errors
    /// - `InvalidIdentifier` if the table name is invalid
    /// - `NamespaceNotFound` if the namespace does not exist
    /// - `InvalidLocation` if the location is not absolute
    /// - `TableAlreadyExists` if the name is taken
    pub async fn create_external_table(
        &self,
        session: &Session,
        request: CreateExternalTableRequest,
    ) -> Result<Arc<Table>, CatalogCreateTableError> {
        let CreateExternalTableRequest {
            ident,
            location,
            provider,
            schema,
            partition_columns,
            properties,
        } = request;
        let name = self.resolve_table_name(session, &ident)?;
        let mut location = Location::parse(location).map_err(InvalidLocation::from)?;
        location.without_trailing_slash();
        let partition_columns =
            self.normalize_partition_columns(&name, &schema, &partition_columns)?;

        let _guard = self.inner.locks.lock(&name).await;
        let table = Arc::new(Table {
            table_id: TableId::new_random(),
            namespace: name.namespace.clone(),
            name: name.name.clone(),
            kind: TableKind::External,
            provider,
            schema,
            partition_columns,
            location,
            properties,
            created_at: Utc::now(),
        });

        let mut state = self.inner.state.write();
        let Some(namespace) = state.namespaces.get_mut(&name.namespace) else {
            return Err(NamespaceNotFound::new(name.namespace).into());
        };
        if namespace.tables.contains_key(&name.name) {
            return Err(TableAlreadyExists::new(name).into());
        }
        namespace
            .tables
            .insert(name.name.clone(), TableEntry::new(table.clone()));
        drop(state);

        tracing::info!(table = %name, location = %table.location, "Created external table");
        Ok(table)
    }

    /// Drop a table. Managed tables lose their data, external tables keep it.
    ///
    /// # Errors
    /// - `TableNotFound` if the table does not exist
    /// - `StorageUnavailable` if removing managed data fails. The table stays
    ///   registered in this case.
    pub async fn drop_table(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<Arc<Table>, CatalogDropTableError> {
        let name = self.resolve_table_name(session, ident)?;
        let _guard = self.inner.locks.lock(&name).await;
        let snapshot = self.table_snapshot(&name)?;

        if snapshot.table.kind == TableKind::Managed {
            self.remove_table_data(&snapshot.table.location, &snapshot.partitions)
                .await
                .map_err(StorageUnavailable::from)?;
        }

        if let Some(namespace) = self.inner.state.write().namespaces.get_mut(&name.namespace) {
            namespace.tables.remove(&name.name);
        }
        self.invalidate_table_state(snapshot.table.table_id).await;

        tracing::info!(table = %name, kind = %snapshot.table.kind, "Dropped table");
        Ok(snapshot.table)
    }

    /// # Errors
    /// - `InvalidIdentifier` if the table name is invalid
    /// - `NamespaceNotFound` if the namespace does not exist
    /// - `TableNotFound` if the table does not exist
    pub fn load_table(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<Arc<Table>, CatalogLoadTableError> {
        let name = self.resolve_table_name(session, ident)?;
        Ok(self.table_snapshot(&name)?.table)
    }

    /// # Errors
    /// Fails if the table name is invalid or its namespace does not exist.
    pub fn table_exists(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<bool, CatalogLoadTableError> {
        let name = self.resolve_table_name(session, ident)?;
        Ok(self.inner.state.read().table(&name).is_some())
    }

    /// Tables of a namespace, sorted by name. Without an explicit namespace
    /// the session's active namespace is listed.
    ///
    /// # Errors
    /// `NamespaceNotFound` if the namespace does not exist.
    pub fn list_tables(
        &self,
        session: &Session,
        namespace: Option<&str>,
    ) -> Result<Vec<Arc<Table>>, CatalogGetNamespaceError> {
        let namespace = self.resolve_namespace_name(session, namespace);
        let state = self.inner.state.read();
        let entry = state
            .namespaces
            .get(&namespace)
            .ok_or_else(|| NamespaceNotFound::new(namespace.as_str()))?;
        Ok(entry
            .tables
            .values()
            .map(|table| table.table.clone())
            .collect())
    }

    /// Write data into an existing table and return the written file.
    ///
    /// # Errors
    /// - `TableNotFound` if the table does not exist
    /// - `InvalidPartitionSpec` if the partition of the data does not match the table
    /// - `StorageUnavailable` if the write fails
    pub async fn insert_into(
        &self,
        session: &Session,
        request: InsertIntoRequest,
    ) -> Result<Location, CatalogInsertIntoError> {
        let InsertIntoRequest {
            ident,
            data,
            overwrite,
        } = request;
        let name = self.resolve_table_name(session, &ident)?;
        let _guard = self.inner.locks.lock(&name).await;
        let snapshot = self.table_snapshot(&name)?;
        let file = self.write_and_register(&snapshot, &data, overwrite).await?;
        tracing::debug!(table = %name, file = %file, overwrite, "Inserted into table");
        Ok(file)
    }

    /// # Errors
    /// Fails if the table cannot be resolved.
    pub async fn alter_table_properties(
        &self,
        session: &Session,
        ident: &TableIdent,
        set: HashMap<String, String>,
        unset: &[String],
    ) -> Result<Arc<Table>, CatalogLoadTableError> {
        let name = self.resolve_table_name(session, ident)?;
        let _guard = self.inner.locks.lock(&name).await;
        let mut state = self.inner.state.write();
        let Some(entry) = state.table_mut(&name) else {
            return Err(TableNotFound::new(name).into());
        };
        let mut table = entry.table.as_ref().clone();
        merge_properties(&mut table.properties, set, unset);
        entry.table = Arc::new(table);
        tracing::debug!(table = %name, "Altered table properties");
        Ok(entry.table.clone())
    }

    /// Write through the data writer. Returns the written file and the
    /// partition to register if the data targets an unknown partition.
    pub(crate) async fn write_data(
        &self,
        table: &Table,
        partitions: &[PartitionEntry],
        data: &TableData,
        overwrite: bool,
    ) -> Result<(Location, Option<PartitionEntry>), CatalogWriteDataError> {
        let (target, new_partition) = if table.is_partitioned() {
            if data.partition.is_empty() {
                return Err(InvalidPartitionSpec::new(
                    table.qualified_name(),
                    format!(
                        "Writing into a partitioned table requires values for all partition columns ({})",
                        table.partition_columns.join(", ")
                    ),
                )
                .into());
            }
            let spec = PartitionSpec::resolve(table, &data.partition, self.inner.policy)?;
            match partitions.iter().find(|p| p.spec == spec) {
                Some(partition) => (partition.location.clone(), None),
                None => {
                    let partition = PartitionEntry::derived(table, spec);
                    (partition.location.clone(), Some(partition))
                }
            }
        } else {
            if !data.partition.is_empty() {
                return Err(InvalidPartitionSpec::new(
                    table.qualified_name(),
                    "Table is not partitioned",
                )
                .into());
            }
            (table.location.clone(), None)
        };

        let stale_files = if overwrite {
            self.list_files(std::slice::from_ref(&target))
                .await
                .map_err(StorageUnavailable::from)?
        } else {
            BTreeSet::new()
        };
        let file = self
            .inner
            .writer
            .write(&target, &table.provider, data.payload.clone())
            .await
            .map_err(StorageUnavailable::from)?;
        self.delete_files(&stale_files)
            .await
            .map_err(StorageUnavailable::from)?;
        Ok((file, new_partition))
    }

    /// All files currently stored below any of `roots`.
    async fn list_files(&self, roots: &[Location]) -> Result<BTreeSet<Location>, IOError> {
        let listings = futures::future::try_join_all(
            roots.iter().map(|root| self.inner.storage.list(root)),
        )
        .await?;
        Ok(listings.into_iter().flatten().collect())
    }

    async fn delete_files(&self, files: &BTreeSet<Location>) -> Result<(), IOError> {
        futures::future::try_join_all(files.iter().map(|file| self.inner.storage.delete(file)))
            .await?;
        if !files.is_empty() {
            tracing::debug!(files = files.len(), "Deleted replaced data files");
        }
        Ok(())
    }

    /// Write into a registered table, register a new partition and
    /// invalidate the cached state so the write is visible on the next read.
    async fn write_and_register(
        &self,
        snapshot: &TableSnapshot,
        data: &TableData,
        overwrite: bool,
    ) -> Result<Location, CatalogWriteDataError> {
        let (file, partition) = self
            .write_data(&snapshot.table, &snapshot.partitions, data, overwrite)
            .await?;
        if let Some(partition) = partition {
            let mut state = self.inner.state.write();
            if let Some(entry) = state
                .table_mut(&partition.table)
                .filter(|entry| entry.table.table_id == snapshot.table.table_id)
            {
                entry.partitions.insert(partition.spec.clone(), partition);
            }
        }
        self.invalidate_table_state(snapshot.table.table_id).await;
        Ok(file)
    }

    /// Remove the data of a managed table, including partitions located
    /// outside the table location.
    pub(crate) async fn remove_table_data(
        &self,
        location: &Location,
        partitions: &[PartitionEntry],
    ) -> Result<(), IOError> {
        self.inner.storage.remove_all(location).await?;
        for partition in partitions {
            if !partition.location.is_sublocation_of(location) {
                self.inner.storage.remove_all(&partition.location).await?;
            }
        }
        tracing::debug!(location = %location, "Removed table data");
        Ok(())
    }

    fn normalize_partition_columns(
        &self,
        table: &QualifiedTableName,
        schema: &Schema,
        partition_columns: &[String],
    ) -> Result<Vec<String>, InvalidPartitionSpec> {
        let mut normalized: Vec<String> = Vec::with_capacity(partition_columns.len());
        for column in partition_columns {
            let column = self.inner.policy.normalize(column);
            if normalized.contains(&column) {
                return Err(InvalidPartitionSpec::new(
                    table.clone(),
                    format!("Partition column `{column}` is declared more than once"),
                ));
            }
            if !schema.is_empty()
                && !schema
                    .fields()
                    .iter()
                    .any(|field| self.inner.policy.normalize(&field.name) == column)
            {
                return Err(InvalidPartitionSpec::new(
                    table.clone(),
                    format!("Partition column `{column}` is not part of the schema"),
                ));
            }
            normalized.push(column);
        }
        Ok(normalized)
    }
}

fn check_compatible(
    existing: &Table,
    provider: &str,
    schema: &Schema,
    partition_columns: &[String],
) -> Result<(), IncompatibleTable> {
    let incompatible = |reason: String| IncompatibleTable::new(existing.qualified_name(), reason);
    if !existing.provider.eq_ignore_ascii_case(provider) {
        return Err(incompatible(format!(
            "Provider `{provider}` does not match the table's provider `{}`",
            existing.provider
        )));
    }
    if !schema.is_empty() && *schema != existing.schema {
        return Err(incompatible("Schema does not match the table's schema".to_string()));
    }
    if !partition_columns.is_empty() && partition_columns != existing.partition_columns {
        return Err(incompatible(format!(
            "Partition columns ({}) do not match the table's partition columns ({})",
            partition_columns.join(", "),
            existing.partition_columns.join(", ")
        )));
    }
    Ok(())
}
