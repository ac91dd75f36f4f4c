use std::{sync::LazyLock, time::Duration};

use serde::{Deserialize, Serialize};

pub static CONFIG: LazyLock<DynAppConfig> = LazyLock::new(get_config);

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct DynAppConfig {
    /// Location of the default namespace. Namespaces created without an
    /// explicit location are placed at `<warehouse_location>/<name>.db`.
    pub warehouse_location: String,
    /// Namespace every new session starts in.
    pub default_namespace: String,
    /// If `false`, identifiers are lowercased after validation.
    pub case_sensitive: bool,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

impl Default for DynAppConfig {
    fn default() -> Self {
        Self {
            warehouse_location: std::env::temp_dir()
                .join("lakeshelf-warehouse")
                .to_string_lossy()
                .into_owned(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            case_sensitive: false,
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct StorageConfig {
    /// Upper bound for listing a table's files during refresh or a cold scan.
    pub list_timeout_secs: u64,
}

impl StorageConfig {
    #[must_use]
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            list_timeout_secs: 300,
        }
    }
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Default)]
pub struct CacheConfig {
    pub table_state: TableStateCacheConfig,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct TableStateCacheConfig {
    pub capacity: u64,
}

impl Default for TableStateCacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

fn get_config() -> DynAppConfig {
    let defaults = figment::providers::Serialized::defaults(DynAppConfig::default());

    #[cfg(not(test))]
    let prefixes = &["LAKESHELF__"];
    #[cfg(test)]
    let prefixes = &["LAKESHELF_TEST__"];

    let mut config = figment::Figment::from(defaults);
    for prefix in prefixes {
        let env = figment::providers::Env::prefixed(prefix).split("__");
        config = config.merge(env);
    }

    match config.extract::<DynAppConfig>() {
        Ok(c) => c,
        Err(e) => {
            panic!("Failed to extract Lakeshelf config: {e}");
        }
    }
}
