use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use lakeshelf_io::{LakeshelfStorage, Location};
use typed_builder::TypedBuilder;

use super::{
    Catalog, CatalogCreateNamespaceError, CatalogDropNamespaceError, CatalogGetNamespaceError,
    InvalidLocation, NamespaceAlreadyExists, NamespaceNotEmpty, NamespaceNotFound,
    NamespaceProtected, QualifiedTableName, Session, StorageUnavailable, TableKind,
    catalog::NamespaceEntry,
};

/// Suffix of the directory of a namespace created without a location.
pub const NAMESPACE_LOCATION_SUFFIX: &str = ".db";

#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub name: String,
    /// Stored without a trailing slash.
    pub location: Location,
    pub properties: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    pub(crate) fn new(
        name: String,
        location: Location,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            name,
            location,
            properties,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateNamespaceRequest {
    #[builder(setter(into))]
    pub name: String,
    /// Defaults to `<warehouse_location>/<name>.db`.
    #[builder(default, setter(strip_option, into))]
    pub location: Option<String>,
    #[builder(default)]
    pub properties: HashMap<String, String>,
    /// Return the existing namespace instead of failing.
    #[builder(default)]
    pub if_not_exists: bool,
}

/// Merge `set` into `properties`, then remove `unset`.
pub(crate) fn merge_properties(
    properties: &mut HashMap<String, String>,
    set: HashMap<String, String>,
    unset: &[String],
) {
    properties.extend(set);
    for key in unset {
        properties.remove(key);
    }
}

impl<S: LakeshelfStorage> Catalog<S> {
    /// Create a namespace.
    ///
    /// # Errors
    /// - `InvalidIdentifier` if the name is not a valid identifier
    /// - `InvalidLocation` if a supplied location is not absolute
    /// - `NamespaceAlreadyExists` unless `if_not_exists` is set
    pub fn create_namespace(
        &self,
        request: CreateNamespaceRequest,
    ) -> Result<Arc<Namespace>, CatalogCreateNamespaceError> {
        let CreateNamespaceRequest {
            name,
            location,
            properties,
            if_not_exists,
        } = request;
        let name = self.inner.policy.validated(&name)?;
        let location = match location {
            Some(location) => {
                let mut location = Location::parse(location).map_err(InvalidLocation::from)?;
                location.without_trailing_slash();
                location
            }
            None => self
                .inner
                .warehouse_location
                .child(&format!("{name}{NAMESPACE_LOCATION_SUFFIX}")),
        };

        let mut state = self.inner.state.write();
        if let Some(existing) = state.namespaces.get(&name) {
            if if_not_exists {
                return Ok(existing.namespace.clone());
            }
            return Err(NamespaceAlreadyExists::new(name).into());
        }
        let entry = NamespaceEntry::new(Namespace::new(name.clone(), location, properties));
        let namespace = entry.namespace.clone();
        state.namespaces.insert(name, entry);
        drop(state);

        tracing::info!(namespace = %namespace.name, location = %namespace.location, "Created namespace");
        Ok(namespace)
    }

    /// Drop a namespace. With `cascade`, all of its tables are dropped first
    /// and the data of managed tables is removed.
    ///
    /// # Errors
    /// - `NamespaceProtected` for the default namespace
    /// - `NamespaceNotFound` if it does not exist
    /// - `NamespaceNotEmpty` if it contains tables and `cascade` is not set
    /// - `StorageUnavailable` if removing table data fails. Tables whose data
    ///   could not be removed stay registered.
    pub async fn drop_namespace(
        &self,
        name: &str,
        cascade: bool,
    ) -> Result<(), CatalogDropNamespaceError> {
        let name = self.inner.policy.normalize(name);
        if name == self.inner.default_namespace {
            return Err(NamespaceProtected::new(name).into());
        }

        let table_names = self.namespace_table_names(&name)?;
        if !cascade && !table_names.is_empty() {
            return Err(NamespaceNotEmpty::new(name).into());
        }

        let _guards = self.inner.locks.lock_all(table_names.clone()).await;
        for table_name in &table_names {
            let removed = {
                let state = self.inner.state.read();
                state.table(table_name).map(|entry| entry.snapshot())
            };
            let Some(snapshot) = removed else {
                continue;
            };
            if snapshot.table.kind == TableKind::Managed {
                self.remove_table_data(&snapshot.table.location, &snapshot.partitions)
                    .await
                    .map_err(|e| {
                        StorageUnavailable::from(e)
                            .append_detail(format!("Failed to remove data of table '{table_name}'"))
                    })?;
            }
            if let Some(namespace) = self.inner.state.write().namespaces.get_mut(&name) {
                namespace.tables.remove(&table_name.name);
            }
            self.invalidate_table_state(snapshot.table.table_id).await;
        }

        let mut state = self.inner.state.write();
        let Some(entry) = state.namespaces.get(&name) else {
            return Err(NamespaceNotFound::new(name).into());
        };
        if !entry.tables.is_empty() {
            // A table was created while the namespace was being dropped.
            return Err(NamespaceNotEmpty::new(name).into());
        }
        state.namespaces.remove(&name);
        drop(state);

        tracing::info!(namespace = %name, cascade, tables = table_names.len(), "Dropped namespace");
        Ok(())
    }

    /// # Errors
    /// `NamespaceNotFound` if the namespace does not exist.
    pub fn get_namespace(&self, name: &str) -> Result<Arc<Namespace>, CatalogGetNamespaceError> {
        let name = self.inner.policy.normalize(name);
        self.inner
            .state
            .read()
            .namespaces
            .get(&name)
            .map(|entry| entry.namespace.clone())
            .ok_or_else(|| NamespaceNotFound::new(name).into())
    }

    /// # Errors
    /// `NamespaceNotFound` if the namespace does not exist.
    pub fn namespace_location(&self, name: &str) -> Result<Location, CatalogGetNamespaceError> {
        self.get_namespace(name)
            .map(|namespace| namespace.location.clone())
    }

    #[must_use]
    pub fn namespace_exists(&self, name: &str) -> bool {
        let name = self.inner.policy.normalize(name);
        self.inner.state.read().namespaces.contains_key(&name)
    }

    /// Names of all namespaces, sorted.
    #[must_use]
    pub fn list_namespaces(&self) -> Vec<String> {
        let mut names = self
            .inner
            .state
            .read()
            .namespaces
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    /// # Errors
    /// `NamespaceNotFound` if the namespace does not exist.
    pub fn alter_namespace_properties(
        &self,
        name: &str,
        set: HashMap<String, String>,
        unset: &[String],
    ) -> Result<Arc<Namespace>, CatalogGetNamespaceError> {
        let name = self.inner.policy.normalize(name);
        let mut state = self.inner.state.write();
        let Some(entry) = state.namespaces.get_mut(&name) else {
            return Err(NamespaceNotFound::new(name).into());
        };
        let mut namespace = entry.namespace.as_ref().clone();
        merge_properties(&mut namespace.properties, set, unset);
        entry.namespace = Arc::new(namespace);
        tracing::debug!(namespace = %name, "Altered namespace properties");
        Ok(entry.namespace.clone())
    }

    /// Switch the active namespace of a session.
    ///
    /// # Errors
    /// `NamespaceNotFound` if the namespace does not exist. The session is
    /// left unchanged.
    pub fn use_namespace(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<(), CatalogGetNamespaceError> {
        let namespace = self.get_namespace(name)?;
        session.set_active_namespace(namespace.name.clone());
        Ok(())
    }

    fn namespace_table_names(
        &self,
        name: &str,
    ) -> Result<Vec<QualifiedTableName>, NamespaceNotFound> {
        let state = self.inner.state.read();
        let entry = state
            .namespaces
            .get(name)
            .ok_or_else(|| NamespaceNotFound::new(name))?;
        Ok(entry
            .tables
            .keys()
            .map(|table| QualifiedTableName::new(name, table.as_str()))
            .collect())
    }
}
