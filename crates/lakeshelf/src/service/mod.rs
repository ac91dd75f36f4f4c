mod catalog;
pub mod error;
mod identifier;
mod namespace;
mod partition;
mod session;
mod table;
mod table_state;
mod writer;

pub use catalog::Catalog;
pub use error::*;
pub use identifier::{IdentifierPolicy, QualifiedTableName, TableIdent, validate_identifier};
pub use namespace::{CreateNamespaceRequest, NAMESPACE_LOCATION_SUFFIX, Namespace};
pub use partition::{
    AddPartitionRequest, DEFAULT_PARTITION_NAME, PartitionEntry, PartitionSpec,
    escape_path_segment,
};
pub use session::Session;
pub use table::{
    CreateExternalTableRequest, CreateTableRequest, DEFAULT_PROVIDER, Field, InsertIntoRequest,
    Schema, Table, TableData, TableId, TableKind, WriteMode,
};
pub use table_state::CachedTableState;
pub use writer::{DataWriter, StorageDataWriter};
