use std::{collections::BTreeSet, sync::Arc};

use bytes::Bytes;
use lakeshelf_io::{HIDDEN_FILE_PREFIXES, LakeshelfStorage, Location, is_hidden_file};

use super::{
    Catalog, CatalogRefreshTableError, CatalogScanTableError, OperationCancelled, PartitionEntry,
    QualifiedTableName, Session, StorageUnavailable, TableId, TableIdent, TableNotFound,
    catalog::TableSnapshot,
};

const REFRESH_OPERATION: &str = "refresh";
const SCAN_OPERATION: &str = "scan";

/// Files and partitions of a table as last observed in storage.
///
/// Derived state: it is rebuilt by [`Catalog::refresh_table`], dropped on
/// catalog-mediated writes and may be evicted at any time.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTableState {
    pub table: QualifiedTableName,
    pub table_id: TableId,
    pub known_partitions: Vec<PartitionEntry>,
    pub known_files: BTreeSet<Location>,
    /// Number of refreshes of the table when this state was built.
    pub generation: u64,
}

impl<S: LakeshelfStorage> Catalog<S> {
    /// Rebuild the cached state of a table from storage.
    ///
    /// Partitioned tables are listed per registered partition, other tables
    /// at their location. On success the table's generation is incremented
    /// and the new state replaces the cached one. On failure the cached state
    /// is left as it was.
    ///
    /// # Errors
    /// - `TableNotFound` if the table does not exist
    /// - `StorageUnavailable` if listing fails
    /// - `OperationCancelled` if the session is cancelled or listing times out
    pub async fn refresh_table(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<Arc<CachedTableState>, CatalogRefreshTableError> {
        let name = self.resolve_table_name(session, ident)?;
        let _guard = self.inner.locks.lock(&name).await;
        let snapshot = self.table_snapshot(&name)?;
        let known_files = self
            .list_table_files(session, &snapshot, REFRESH_OPERATION)
            .await?;

        let generation = {
            let mut state = self.inner.state.write();
            let Some(entry) = state
                .table_mut(&name)
                .filter(|entry| entry.table.table_id == snapshot.table.table_id)
            else {
                return Err(TableNotFound::new(name).into());
            };
            entry.generation += 1;
            entry.generation
        };

        let table_state = Arc::new(CachedTableState {
            table: name.clone(),
            table_id: snapshot.table.table_id,
            known_partitions: snapshot.partitions,
            known_files,
            generation,
        });
        self.inner
            .table_states
            .insert(table_state.table_id, table_state.clone())
            .await;

        tracing::info!(
            table = %name,
            generation,
            files = table_state.known_files.len(),
            partitions = table_state.known_partitions.len(),
            "Refreshed table"
        );
        Ok(table_state)
    }

    /// Cached state of a table, scanning storage if nothing is cached.
    ///
    /// A cold scan does not increment the generation.
    ///
    /// # Errors
    /// Same as [`Catalog::refresh_table`].
    pub async fn scan_table(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<Arc<CachedTableState>, CatalogScanTableError> {
        let name = self.resolve_table_name(session, ident)?;
        let table_id = self.table_snapshot(&name)?.table.table_id;
        if let Some(table_state) = self.inner.table_states.get(&table_id).await {
            tracing::debug!(table = %name, generation = table_state.generation, "Table state cache hit");
            return Ok(table_state);
        }

        let _guard = self.inner.locks.lock(&name).await;
        let snapshot = self.table_snapshot(&name)?;
        if let Some(table_state) = self
            .inner
            .table_states
            .get(&snapshot.table.table_id)
            .await
        {
            return Ok(table_state);
        }

        tracing::debug!(table = %name, "Table state cache miss, scanning storage");
        let known_files = self
            .list_table_files(session, &snapshot, SCAN_OPERATION)
            .await?;
        let table_state = Arc::new(CachedTableState {
            table: name,
            table_id: snapshot.table.table_id,
            known_partitions: snapshot.partitions,
            known_files,
            generation: snapshot.generation,
        });
        self.inner
            .table_states
            .insert(table_state.table_id, table_state.clone())
            .await;
        Ok(table_state)
    }

    /// Contents of every known file of a table, in path order.
    ///
    /// # Errors
    /// Same as [`Catalog::scan_table`]; reading a file fails with
    /// `StorageUnavailable`.
    pub async fn read_table(
        &self,
        session: &Session,
        ident: &TableIdent,
    ) -> Result<Vec<Bytes>, CatalogScanTableError> {
        let table_state = self.scan_table(session, ident).await?;
        let reads = table_state
            .known_files
            .iter()
            .map(|file| self.inner.storage.read(file));
        let contents = futures::future::try_join_all(reads)
            .await
            .map_err(StorageUnavailable::from)?;
        Ok(contents)
    }

    async fn list_table_files(
        &self,
        session: &Session,
        snapshot: &TableSnapshot,
        operation: &'static str,
    ) -> Result<BTreeSet<Location>, CatalogScanTableError> {
        let table = &snapshot.table;
        let roots = if table.is_partitioned() {
            snapshot
                .partitions
                .iter()
                .map(|partition| partition.location.clone())
                .collect::<Vec<_>>()
        } else {
            vec![table.location.clone()]
        };

        let storage = &self.inner.storage;
        let listing = futures::future::try_join_all(roots.iter().map(|root| async move {
            storage.list(root).await.map(|files| (root, files))
        }));
        let timeout = self.inner.config.storage.list_timeout();
        let result = tokio::select! {
            biased;
            () = session.cancellation_token().cancelled() => {
                return Err(OperationCancelled::new(
                    operation,
                    table.qualified_name(),
                    "Session was cancelled",
                )
                .into());
            }
            result = tokio::time::timeout(timeout, listing) => result,
        };
        let Ok(listings) = result else {
            return Err(OperationCancelled::new(
                operation,
                table.qualified_name(),
                format!("Listing files timed out after {}s", timeout.as_secs()),
            )
            .into());
        };
        let listings = listings.map_err(|e| {
            tracing::warn!(
                table = %table.qualified_name(),
                operation,
                error = %e,
                "Failed to list table files"
            );
            StorageUnavailable::from(e)
        })?;

        Ok(listings
            .into_iter()
            .flat_map(|(root, files)| {
                files
                    .into_iter()
                    .filter(move |file| !is_hidden_below(file, root))
            })
            .collect())
    }
}

/// A file is hidden if its name or any directory between `root` and the
/// file starts with a hidden prefix.
fn is_hidden_below(file: &Location, root: &Location) -> bool {
    if is_hidden_file(file) {
        return true;
    }
    file.as_str()
        .strip_prefix(root.as_str())
        .is_some_and(|relative| {
            relative
                .split('/')
                .any(|segment| segment.starts_with(|c| HIDDEN_FILE_PREFIXES.contains(&c)))
        })
}
