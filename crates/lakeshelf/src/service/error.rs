use lakeshelf_io::{IOError, InvalidLocationError};

use super::{QualifiedTableName, partition::PartitionSpec};

macro_rules! impl_error_stack_methods {
    ($error_type:ty) => {
        impl $error_type {
            #[must_use]
            pub fn append_details(mut self, details: impl IntoIterator<Item = String>) -> Self {
                self.stack.extend(details);
                self
            }

            #[must_use]
            pub fn append_detail(mut self, detail: impl Into<String>) -> Self {
                self.stack.push(detail.into());
                self
            }

            pub fn append_details_mut(&mut self, details: impl IntoIterator<Item = String>) {
                self.stack.extend(details);
            }

            pub fn append_detail_mut(&mut self, detail: impl Into<String>) {
                self.stack.push(detail.into());
            }

            #[must_use]
            pub fn stack(&self) -> &[String] {
                &self.stack
            }
        }
    };
}

macro_rules! impl_from_with_detail {
    ($from_type:ty => $to_type:ident::$variant:ident, $detail:expr) => {
        impl From<$from_type> for $to_type {
            fn from(err: $from_type) -> Self {
                $to_type::$variant(err.append_detail($detail))
            }
        }
    };
}

/// Defines a fully transparent error enum over error kinds of the catalog.
///
/// Every variant is named after the error struct it wraps, which is also the
/// name of its [`CatalogErrorKind`]. This macro generates:
/// - the enum with all variants marked as `#[error(transparent)]`
/// - `impl_from_with_detail!` for each variant to add stack context
/// - `append_detail` / `append_detail_mut` forwarding to the wrapped error
/// - `kind()` returning the [`CatalogErrorKind`] of the wrapped error
macro_rules! define_transparent_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $error_name:ident,
        stack_message: $stack_msg:expr,
        variants: [
            $($variant:ident),* $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(thiserror::Error, Debug)]
        $vis enum $error_name {
            $(
                #[error(transparent)]
                $variant($variant),
            )*
        }

        pastey::paste! {
            const [<$error_name:snake:upper _STACK>]: &str = $stack_msg;

            $(
                impl_from_with_detail!($variant => $error_name::$variant, [<$error_name:snake:upper _STACK>]);
            )*
        }

        impl $error_name {
            #[must_use]
            pub fn append_detail(mut self, detail: impl Into<String>) -> Self {
                self.append_detail_mut(detail);
                self
            }

            pub fn append_detail_mut(&mut self, detail: impl Into<String>) -> &mut Self {
                match self {
                    $(
                        $error_name::$variant(e) => {
                            e.append_detail_mut(detail);
                        }
                    )*
                }
                self
            }

            #[must_use]
            pub fn kind(&self) -> CatalogErrorKind {
                match self {
                    $(
                        $error_name::$variant(_) => CatalogErrorKind::$variant,
                    )*
                }
            }

            #[must_use]
            pub fn stack(&self) -> &[String] {
                match self {
                    $(
                        $error_name::$variant(e) => e.stack(),
                    )*
                }
            }
        }
    };
}

/// Converts one transparent error enum into another that contains all of its
/// variants.
macro_rules! impl_from_transparent_error {
    ($from_type:ident => $to_type:ident, [$($variant:ident),* $(,)?]) => {
        impl From<$from_type> for $to_type {
            fn from(err: $from_type) -> Self {
                match err {
                    $(
                        $from_type::$variant(e) => $to_type::from(e),
                    )*
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum CatalogErrorKind {
    InvalidIdentifier,
    InvalidLocation,
    NamespaceNotFound,
    NamespaceAlreadyExists,
    NamespaceNotEmpty,
    NamespaceProtected,
    TableNotFound,
    TableAlreadyExists,
    IncompatibleTable,
    PartitionNotFound,
    PartitionAlreadyExists,
    InvalidPartitionSpec,
    StorageUnavailable,
    OperationCancelled,
}

// --------------------------- IDENTIFIERS & LOCATIONS ---------------------------
#[derive(thiserror::Error, Debug, PartialEq)]
#[error(
    "`{token}` is not a valid name for tables/databases. Valid names only contain alphabet characters, numbers and _."
)]
pub struct InvalidIdentifier {
    pub token: String,
    pub stack: Vec<String>,
}
impl InvalidIdentifier {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(InvalidIdentifier);

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("{source}")]
pub struct InvalidLocation {
    pub source: InvalidLocationError,
    pub stack: Vec<String>,
}
impl_error_stack_methods!(InvalidLocation);
impl From<InvalidLocationError> for InvalidLocation {
    fn from(source: InvalidLocationError) -> Self {
        Self {
            source,
            stack: Vec::new(),
        }
    }
}

// --------------------------- NAMESPACES ---------------------------
macro_rules! define_simple_namespace_err {
    ($error_name:ident, $error_message:literal) => {
        #[derive(thiserror::Error, Debug, PartialEq)]
        #[error($error_message)]
        pub struct $error_name {
            pub namespace: String,
            pub stack: Vec<String>,
        }

        impl $error_name {
            #[must_use]
            pub fn new(namespace: impl Into<String>) -> Self {
                Self {
                    namespace: namespace.into(),
                    stack: Vec::new(),
                }
            }
        }

        impl_error_stack_methods!($error_name);
    };
}

define_simple_namespace_err!(NamespaceNotFound, "Database '{namespace}' not found");
define_simple_namespace_err!(NamespaceAlreadyExists, "Database '{namespace}' already exists");
define_simple_namespace_err!(
    NamespaceNotEmpty,
    "Database '{namespace}' is not empty. One or more tables exist."
);
define_simple_namespace_err!(
    NamespaceProtected,
    "Can not drop default database '{namespace}'"
);

// --------------------------- TABLES ---------------------------
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Table or view '{}' not found in database '{}'", .table.name, .table.namespace)]
pub struct TableNotFound {
    pub table: QualifiedTableName,
    pub stack: Vec<String>,
}
impl TableNotFound {
    #[must_use]
    pub fn new(table: QualifiedTableName) -> Self {
        Self {
            table,
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(TableNotFound);

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Table '{table}' already exists")]
pub struct TableAlreadyExists {
    pub table: QualifiedTableName,
    pub stack: Vec<String>,
}
impl TableAlreadyExists {
    #[must_use]
    pub fn new(table: QualifiedTableName) -> Self {
        Self {
            table,
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(TableAlreadyExists);

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Cannot write to existing table '{table}': {reason}")]
pub struct IncompatibleTable {
    pub table: QualifiedTableName,
    pub reason: String,
    pub stack: Vec<String>,
}
impl IncompatibleTable {
    #[must_use]
    pub fn new(table: QualifiedTableName, reason: impl Into<String>) -> Self {
        Self {
            table,
            reason: reason.into(),
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(IncompatibleTable);

// --------------------------- PARTITIONS ---------------------------
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Partition {partition} not found in table '{table}'")]
pub struct PartitionNotFound {
    pub table: QualifiedTableName,
    pub partition: PartitionSpec,
    pub stack: Vec<String>,
}
impl PartitionNotFound {
    #[must_use]
    pub fn new(table: QualifiedTableName, partition: PartitionSpec) -> Self {
        Self {
            table,
            partition,
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(PartitionNotFound);

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Partition {partition} already exists in table '{table}'")]
pub struct PartitionAlreadyExists {
    pub table: QualifiedTableName,
    pub partition: PartitionSpec,
    pub stack: Vec<String>,
}
impl PartitionAlreadyExists {
    #[must_use]
    pub fn new(table: QualifiedTableName, partition: PartitionSpec) -> Self {
        Self {
            table,
            partition,
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(PartitionAlreadyExists);

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Invalid partition spec for table '{table}': {reason}")]
pub struct InvalidPartitionSpec {
    pub table: QualifiedTableName,
    pub reason: String,
    pub stack: Vec<String>,
}
impl InvalidPartitionSpec {
    #[must_use]
    pub fn new(table: QualifiedTableName, reason: impl Into<String>) -> Self {
        Self {
            table,
            reason: reason.into(),
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(InvalidPartitionSpec);

// --------------------------- STORAGE ---------------------------
#[derive(thiserror::Error, Debug)]
#[error("Storage unavailable: {source}")]
pub struct StorageUnavailable {
    pub source: IOError,
    pub stack: Vec<String>,
}
impl_error_stack_methods!(StorageUnavailable);
impl From<IOError> for StorageUnavailable {
    fn from(source: IOError) -> Self {
        Self {
            source,
            stack: Vec::new(),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Operation '{operation}' on table '{table}' was cancelled: {reason}")]
pub struct OperationCancelled {
    pub operation: &'static str,
    pub table: QualifiedTableName,
    pub reason: String,
    pub stack: Vec<String>,
}
impl OperationCancelled {
    #[must_use]
    pub fn new(
        operation: &'static str,
        table: QualifiedTableName,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            table,
            reason: reason.into(),
            stack: Vec::new(),
        }
    }
}
impl_error_stack_methods!(OperationCancelled);

// --------------------------- OPERATION ERRORS ---------------------------
define_transparent_error! {
    pub enum CatalogInitError,
    stack_message: "Error initializing catalog",
    variants: [
        InvalidIdentifier,
        InvalidLocation,
    ]
}

define_transparent_error! {
    pub enum CatalogCreateNamespaceError,
    stack_message: "Error creating namespace in catalog",
    variants: [
        InvalidIdentifier,
        InvalidLocation,
        NamespaceAlreadyExists,
    ]
}

define_transparent_error! {
    pub enum CatalogDropNamespaceError,
    stack_message: "Error dropping namespace in catalog",
    variants: [
        NamespaceNotFound,
        NamespaceNotEmpty,
        NamespaceProtected,
        StorageUnavailable,
    ]
}

define_transparent_error! {
    pub enum CatalogGetNamespaceError,
    stack_message: "Error getting namespace in catalog",
    variants: [
        NamespaceNotFound,
    ]
}

define_transparent_error! {
    pub enum CatalogResolveTableError,
    stack_message: "Error resolving table name",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
    ]
}

define_transparent_error! {
    pub enum CatalogLoadTableError,
    stack_message: "Error loading table in catalog",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
        TableNotFound,
    ]
}

define_transparent_error! {
    pub enum CatalogCreateTableError,
    stack_message: "Error creating table in catalog",
    variants: [
        InvalidIdentifier,
        InvalidLocation,
        NamespaceNotFound,
        TableAlreadyExists,
        IncompatibleTable,
        InvalidPartitionSpec,
        StorageUnavailable,
    ]
}

define_transparent_error! {
    pub enum CatalogDropTableError,
    stack_message: "Error dropping table in catalog",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
        TableNotFound,
        StorageUnavailable,
    ]
}

define_transparent_error! {
    pub enum CatalogInsertIntoError,
    stack_message: "Error inserting into table",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
        TableNotFound,
        InvalidPartitionSpec,
        StorageUnavailable,
    ]
}

define_transparent_error! {
    pub enum CatalogAddPartitionError,
    stack_message: "Error adding partition in catalog",
    variants: [
        InvalidIdentifier,
        InvalidLocation,
        NamespaceNotFound,
        TableNotFound,
        InvalidPartitionSpec,
        PartitionAlreadyExists,
    ]
}

define_transparent_error! {
    pub enum CatalogDropPartitionError,
    stack_message: "Error dropping partition in catalog",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
        TableNotFound,
        InvalidPartitionSpec,
        PartitionNotFound,
        StorageUnavailable,
    ]
}

define_transparent_error! {
    pub enum CatalogRefreshTableError,
    stack_message: "Error refreshing cached table state",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
        TableNotFound,
        StorageUnavailable,
        OperationCancelled,
    ]
}

define_transparent_error! {
    pub enum CatalogScanTableError,
    stack_message: "Error scanning table files",
    variants: [
        InvalidIdentifier,
        NamespaceNotFound,
        TableNotFound,
        StorageUnavailable,
        OperationCancelled,
    ]
}

define_transparent_error! {
    pub enum CatalogWriteDataError,
    stack_message: "Error writing table data",
    variants: [
        InvalidPartitionSpec,
        StorageUnavailable,
    ]
}

impl_from_transparent_error!(CatalogResolveTableError => CatalogLoadTableError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogCreateTableError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogDropTableError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogInsertIntoError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogAddPartitionError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogDropPartitionError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogRefreshTableError, [InvalidIdentifier, NamespaceNotFound]);
impl_from_transparent_error!(CatalogResolveTableError => CatalogScanTableError, [InvalidIdentifier, NamespaceNotFound]);

impl_from_transparent_error!(CatalogGetNamespaceError => CatalogLoadTableError, [NamespaceNotFound]);
impl_from_transparent_error!(CatalogGetNamespaceError => CatalogCreateTableError, [NamespaceNotFound]);

impl_from_transparent_error!(CatalogLoadTableError => CatalogDropTableError, [InvalidIdentifier, NamespaceNotFound, TableNotFound]);
impl_from_transparent_error!(CatalogLoadTableError => CatalogInsertIntoError, [InvalidIdentifier, NamespaceNotFound, TableNotFound]);
impl_from_transparent_error!(CatalogLoadTableError => CatalogAddPartitionError, [InvalidIdentifier, NamespaceNotFound, TableNotFound]);
impl_from_transparent_error!(CatalogLoadTableError => CatalogDropPartitionError, [InvalidIdentifier, NamespaceNotFound, TableNotFound]);
impl_from_transparent_error!(CatalogLoadTableError => CatalogRefreshTableError, [InvalidIdentifier, NamespaceNotFound, TableNotFound]);
impl_from_transparent_error!(CatalogLoadTableError => CatalogScanTableError, [InvalidIdentifier, NamespaceNotFound, TableNotFound]);

impl_from_transparent_error!(CatalogScanTableError => CatalogRefreshTableError, [InvalidIdentifier, NamespaceNotFound, TableNotFound, StorageUnavailable, OperationCancelled]);
impl_from_transparent_error!(CatalogWriteDataError => CatalogCreateTableError, [InvalidPartitionSpec, StorageUnavailable]);
impl_from_transparent_error!(CatalogWriteDataError => CatalogInsertIntoError, [InvalidPartitionSpec, StorageUnavailable]);
