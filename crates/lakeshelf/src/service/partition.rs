use std::fmt::{Display, Formatter};

use lakeshelf_io::{LakeshelfStorage, Location};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use typed_builder::TypedBuilder;

use super::{
    Catalog, CatalogAddPartitionError, CatalogDropPartitionError, CatalogLoadTableError,
    IdentifierPolicy, InvalidLocation, InvalidPartitionSpec, PartitionAlreadyExists,
    PartitionNotFound, QualifiedTableName, Session, StorageUnavailable, Table, TableIdent,
    TableKind, TableNotFound,
};

/// Directory name used for empty partition values.
pub const DEFAULT_PARTITION_NAME: &str = "__HIVE_DEFAULT_PARTITION__";

/// Characters escaped in partition path segments.
const PARTITION_PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'*')
    .add(b'/')
    .add(b':')
    .add(b'=')
    .add(b'?')
    .add(b'\\')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'{');

/// Escape a partition column name or value for use as a path segment.
#[must_use]
pub fn escape_path_segment(value: &str) -> String {
    if value.is_empty() {
        return DEFAULT_PARTITION_NAME.to_string();
    }
    utf8_percent_encode(value, PARTITION_PATH_ESCAPE).to_string()
}

/// Values of all partition columns of a table, in the table's column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionSpec(Vec<(String, String)>);

impl PartitionSpec {
    #[cfg(test)]
    pub(crate) fn new(values: Vec<(String, String)>) -> Self {
        Self(values)
    }

    /// Match caller supplied key/values against the partition columns of
    /// `table`. Keys may be given in any order, but every partition column
    /// must be given exactly once.
    pub(crate) fn resolve(
        table: &Table,
        key_values: &[(String, String)],
        policy: IdentifierPolicy,
    ) -> Result<Self, InvalidPartitionSpec> {
        let invalid = |reason: String| InvalidPartitionSpec::new(table.qualified_name(), reason);
        let expected = || table.partition_columns.join(", ");

        let mut normalized = Vec::with_capacity(key_values.len());
        for (key, value) in key_values {
            let key = policy.normalize(key);
            if normalized.iter().any(|(k, _): &(String, &String)| *k == key) {
                return Err(invalid(format!("Partition column `{key}` is given more than once")));
            }
            if !table.partition_columns.contains(&key) {
                return Err(invalid(format!(
                    "`{key}` is not a partition column. Partition columns: ({})",
                    expected()
                )));
            }
            normalized.push((key, value));
        }

        let mut values = Vec::with_capacity(table.partition_columns.len());
        for column in &table.partition_columns {
            let Some((_, value)) = normalized.iter().find(|(key, _)| key == column) else {
                return Err(invalid(format!(
                    "Missing value for partition column `{column}`. Partition columns: ({})",
                    expected()
                )));
            };
            values.push((column.clone(), (*value).clone()));
        }
        Ok(Self(values))
    }

    #[must_use]
    pub fn values(&self) -> &[(String, String)] {
        &self.0
    }

    /// Relative path `<col>=<value>/...` with escaped segments.
    #[must_use]
    pub fn path(&self) -> String {
        self.0
            .iter()
            .map(|(column, value)| {
                format!("{}={}", escape_path_segment(column), escape_path_segment(value))
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Display for PartitionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let values = self
            .0
            .iter()
            .map(|(column, value)| format!("{column}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({values})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionEntry {
    pub table: QualifiedTableName,
    pub spec: PartitionSpec,
    pub location: Location,
}

impl PartitionEntry {
    /// Entry at the conventional location below the table.
    pub(crate) fn derived(table: &Table, spec: PartitionSpec) -> Self {
        let location = table.location.child(&spec.path());
        Self {
            table: table.qualified_name(),
            spec,
            location,
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct AddPartitionRequest {
    pub ident: TableIdent,
    pub key_values: Vec<(String, String)>,
    /// Defaults to `<table location>/<col>=<value>/...`.
    #[builder(default, setter(strip_option, into))]
    pub location: Option<String>,
    #[builder(default)]
    pub if_not_exists: bool,
}

impl<S: LakeshelfStorage> Catalog<S> {
    /// Register a partition. Files already present at its location become
    /// visible only after the next refresh of the table.
    ///
    /// # Errors
    /// - `TableNotFound` if the table does not exist or has no partition columns
    /// - `InvalidPartitionSpec` if the keys do not match the partition columns
    /// - `PartitionAlreadyExists` unless `if_not_exists` is set
    pub async fn add_partition(
        &self,
        session: &Session,
        request: AddPartitionRequest,
    ) -> Result<PartitionEntry, CatalogAddPartitionError> {
        let AddPartitionRequest {
            ident,
            key_values,
            location,
            if_not_exists,
        } = request;
        let name = self.resolve_table_name(session, &ident)?;
        let _guard = self.inner.locks.lock(&name).await;
        let snapshot = self.table_snapshot(&name)?;
        let table = snapshot.table;
        if !table.is_partitioned() {
            return Err(TableNotFound::new(name)
                .append_detail("Table has no partition columns")
                .into());
        }

        let spec = PartitionSpec::resolve(&table, &key_values, self.inner.policy)?;
        let entry = match location {
            Some(location) => {
                let mut location = Location::parse(location).map_err(InvalidLocation::from)?;
                location.without_trailing_slash();
                PartitionEntry {
                    table: name.clone(),
                    spec,
                    location,
                }
            }
            None => PartitionEntry::derived(&table, spec),
        };

        let mut state = self.inner.state.write();
        let Some(table_entry) = state.table_mut(&name) else {
            return Err(TableNotFound::new(name).into());
        };
        if let Some(existing) = table_entry.partitions.get(&entry.spec) {
            if if_not_exists {
                return Ok(existing.clone());
            }
            return Err(PartitionAlreadyExists::new(name, entry.spec).into());
        }
        table_entry
            .partitions
            .insert(entry.spec.clone(), entry.clone());
        drop(state);

        tracing::info!(table = %name, partition = %entry.spec, location = %entry.location, "Added partition");
        Ok(entry)
    }

    /// Unregister a partition. The data of a managed table's partition is removed.
    ///
    /// # Errors
    /// - `InvalidPartitionSpec` if the keys do not match the partition columns
    /// - `PartitionNotFound` if no such partition is registered
    /// - `StorageUnavailable` if removing managed data fails
    pub async fn drop_partition(
        &self,
        session: &Session,
        ident: &TableIdent,
        key_values: &[(String, String)],
    ) -> Result<PartitionEntry, CatalogDropPartitionError> {
        let name = self.resolve_table_name(session, ident)?;
        let _guard = self.inner.locks.lock(&name).await;
        let snapshot = self.table_snapshot(&name)?;
        let table = snapshot.table;
        let spec = PartitionSpec::resolve(&table, key_values, self.inner.policy)?;
        let Some(entry) = snapshot.partitions.into_iter().find(|p| p.spec == spec) else {
            return Err(PartitionNotFound::new(name, spec).into());
        };

        if table.kind == TableKind::Managed {
            self.inner
                .storage
                .remove_all(&entry.location)
                .await
                .map_err(StorageUnavailable::from)?;
        }

        if let Some(table_entry) = self.inner.state.write().table_mut(&name) {
            table_entry.partitions.remove(&entry.spec);
        }
        self.invalidate_table_state(table.table_id).await;

        tracing::info!(table = %name, partition = %entry.spec, "Dropped partition");
        Ok(entry)
    }

    /// Registered partitions of a table, sorted by their values.
    ///
    /// # Errors
    /// Fails if the table cannot be resolved.
    pub fn partitions_of(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<Vec<PartitionEntry>, CatalogLoadTableError> {
        let name = self.resolve_table_name(session, ident)?;
        Ok(self.table_snapshot(&name)?.partitions)
    }
}
