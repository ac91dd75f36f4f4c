use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{ErrorKind, IOError, LakeshelfStorage, Location};

/// Storage on the local filesystem.
///
/// Accepts absolute paths and `file:` URIs. Listings keep the location prefix
/// exactly as the caller passed it.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn to_path(location: &Location) -> Result<PathBuf, IOError> {
        match location.scheme() {
            None => Ok(PathBuf::from(location.as_str())),
            Some("file") => url::Url::parse(location.as_str())
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| {
                    IOError::new(
                        ErrorKind::InvalidLocation,
                        "Location is not a valid local file URI",
                        location.as_str(),
                    )
                }),
            Some(scheme) => Err(IOError::new(
                ErrorKind::UnsupportedScheme,
                format!("Scheme `{scheme}` is not supported by local storage"),
                location.as_str(),
            )),
        }
    }
}

async fn metadata_if_exists(path: &Path) -> Result<Option<std::fs::Metadata>, std::io::Error> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait::async_trait]
impl LakeshelfStorage for LocalStorage {
    async fn list(&self, location: &Location) -> Result<Vec<Location>, IOError> {
        let root = Self::to_path(location)?;
        let Some(metadata) = metadata_if_exists(&root)
            .await
            .map_err(|e| IOError::from_std(e, "stat location", location.as_str()))?
        else {
            return Ok(vec![]);
        };
        if metadata.is_file() {
            return Ok(vec![location.clone()]);
        }

        let mut files = Vec::new();
        // (directory, location of that directory)
        let mut pending = vec![(root, location.clone())];
        while let Some((dir, dir_location)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| IOError::from_std(e, "list directory", dir_location.as_str()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| IOError::from_std(e, "list directory", dir_location.as_str()))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = dir_location.child(&name);
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| IOError::from_std(e, "stat entry", child.as_str()))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), child));
                } else {
                    files.push(child);
                }
            }
        }
        files.sort();
        tracing::trace!(location = %location, files = files.len(), "Listed local location");
        Ok(files)
    }

    async fn read(&self, location: &Location) -> Result<Bytes, IOError> {
        let path = Self::to_path(location)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| IOError::from_std(e, "read file", location.as_str()))
    }

    async fn write(&self, location: &Location, data: Bytes) -> Result<(), IOError> {
        let path = Self::to_path(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IOError::from_std(e, "create parent directories", location.as_str()))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| IOError::from_std(e, "write file", location.as_str()))
    }

    async fn delete(&self, location: &Location) -> Result<(), IOError> {
        let path = Self::to_path(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IOError::from_std(e, "delete file", location.as_str())),
        }
    }

    async fn remove_all(&self, location: &Location) -> Result<(), IOError> {
        let path = Self::to_path(location)?;
        let Some(metadata) = metadata_if_exists(&path)
            .await
            .map_err(|e| IOError::from_std(e, "stat location", location.as_str()))?
        else {
            return Ok(());
        };
        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.map_err(|e| IOError::from_std(e, "remove location", location.as_str()))
    }
}
