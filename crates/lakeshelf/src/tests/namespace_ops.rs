use maplit::hashmap;
use pretty_assertions::assert_eq;

use crate::{
    LakeshelfStorage, Location, TableIdent,
    service::{
        CatalogErrorKind, CreateExternalTableRequest, CreateNamespaceRequest, CreateTableRequest,
        TableData,
    },
    tests::memory_catalog,
};

#[tokio::test]
async fn test_create_namespace_default_location() {
    let catalog = memory_catalog();
    let namespace = catalog
        .create_namespace(CreateNamespaceRequest::builder().name("db1").build())
        .unwrap();
    assert_eq!(namespace.name, "db1");
    assert_eq!(namespace.location.as_str(), "/warehouse/db1.db");
    assert_eq!(
        catalog.namespace_location("db1").unwrap().as_str(),
        "/warehouse/db1.db"
    );
}

#[tokio::test]
async fn test_create_namespace_explicit_location_strips_trailing_slash() {
    let catalog = memory_catalog();
    let namespace = catalog
        .create_namespace(
            CreateNamespaceRequest::builder()
                .name("db1")
                .location("s3://bucket/somewhere/")
                .properties(hashmap! { "owner".to_string() => "me".to_string() })
                .build(),
        )
        .unwrap();
    assert_eq!(namespace.location.as_str(), "s3://bucket/somewhere");
    assert_eq!(namespace.properties["owner"], "me");
}

#[tokio::test]
async fn test_create_namespace_invalid() {
    let catalog = memory_catalog();
    let err = catalog
        .create_namespace(CreateNamespaceRequest::builder().name("d:b").build())
        .unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::InvalidIdentifier);
    assert_eq!(
        err.to_string(),
        "`d:b` is not a valid name for tables/databases. Valid names only contain alphabet characters, numbers and _."
    );

    let err = catalog
        .create_namespace(
            CreateNamespaceRequest::builder()
                .name("db1")
                .location("relative/path")
                .build(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::InvalidLocation);
    assert!(!catalog.namespace_exists("db1"));
}

#[tokio::test]
async fn test_create_namespace_twice() {
    let catalog = memory_catalog();
    let first = catalog
        .create_namespace(CreateNamespaceRequest::builder().name("db1").build())
        .unwrap();
    let err = catalog
        .create_namespace(CreateNamespaceRequest::builder().name("DB1").build())
        .unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::NamespaceAlreadyExists);
    assert_eq!(err.to_string(), "Database 'db1' already exists");

    let again = catalog
        .create_namespace(
            CreateNamespaceRequest::builder()
                .name("db1")
                .location("/elsewhere")
                .if_not_exists(true)
                .build(),
        )
        .unwrap();
    assert_eq!(again, first);
}

#[tokio::test]
async fn test_get_missing_namespace_names_it() {
    let catalog = memory_catalog();
    let err = catalog.get_namespace("d:b").unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::NamespaceNotFound);
    assert_eq!(err.to_string(), "Database 'd:b' not found");
}

#[tokio::test]
async fn test_list_namespaces_sorted() {
    let catalog = memory_catalog();
    for name in ["zeta", "alpha", "mid"] {
        catalog
            .create_namespace(CreateNamespaceRequest::builder().name(name).build())
            .unwrap();
    }
    assert_eq!(
        catalog.list_namespaces(),
        vec!["alpha", "default", "mid", "zeta"]
    );
}

#[tokio::test]
async fn test_alter_namespace_properties() {
    let catalog = memory_catalog();
    catalog
        .create_namespace(
            CreateNamespaceRequest::builder()
                .name("db1")
                .properties(hashmap! {
                    "a".to_string() => "1".to_string(),
                    "b".to_string() => "2".to_string(),
                })
                .build(),
        )
        .unwrap();
    let namespace = catalog
        .alter_namespace_properties(
            "db1",
            hashmap! { "c".to_string() => "3".to_string() },
            &["a".to_string()],
        )
        .unwrap();
    assert_eq!(
        namespace.properties,
        hashmap! {
            "b".to_string() => "2".to_string(),
            "c".to_string() => "3".to_string(),
        }
    );
    assert_eq!(catalog.get_namespace("db1").unwrap(), namespace);

    let err = catalog
        .alter_namespace_properties("missing", hashmap! {}, &[])
        .unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::NamespaceNotFound);
}

#[tokio::test]
async fn test_drop_namespace() {
    let catalog = memory_catalog();
    catalog
        .create_namespace(CreateNamespaceRequest::builder().name("db1").build())
        .unwrap();
    catalog.drop_namespace("db1", false).await.unwrap();
    assert!(!catalog.namespace_exists("db1"));

    let err = catalog.drop_namespace("db1", false).await.unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::NamespaceNotFound);
}

#[tokio::test]
async fn test_default_namespace_is_protected() {
    let catalog = memory_catalog();
    let err = catalog.drop_namespace("DEFAULT", true).await.unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::NamespaceProtected);
    assert!(catalog.namespace_exists("default"));
}

#[tokio::test]
async fn test_drop_non_empty_namespace() {
    let catalog = memory_catalog();
    let session = catalog.new_session();
    catalog
        .create_namespace(CreateNamespaceRequest::builder().name("db1").build())
        .unwrap();
    let managed = catalog
        .create_table(
            &session,
            CreateTableRequest::builder()
                .ident(TableIdent::qualified("db1", "managed"))
                .data(TableData::new("rows"))
                .build(),
        )
        .await
        .unwrap();
    catalog
        .storage()
        .write(
            &Location::parse("/external/x/part-0.parquet").unwrap(),
            "external rows".into(),
        )
        .await
        .unwrap();
    catalog
        .create_external_table(
            &session,
            CreateExternalTableRequest::builder()
                .ident(TableIdent::qualified("db1", "external"))
                .location("/external/x")
                .build(),
        )
        .await
        .unwrap();

    let err = catalog.drop_namespace("db1", false).await.unwrap_err();
    assert_eq!(err.kind(), CatalogErrorKind::NamespaceNotEmpty);
    assert_eq!(
        err.to_string(),
        "Database 'db1' is not empty. One or more tables exist."
    );
    assert_eq!(catalog.list_tables(&session, Some("db1")).unwrap().len(), 2);

    catalog.drop_namespace("db1", true).await.unwrap();
    assert!(!catalog.namespace_exists("db1"));
    let storage = catalog.storage();
    assert!(storage.list(&managed.location).await.unwrap().is_empty());
    assert_eq!(
        storage
            .list(&Location::parse("/external/x").unwrap())
            .await
            .unwrap()
            .len(),
        1
    );

    // Recreating the namespace starts empty.
    catalog
        .create_namespace(CreateNamespaceRequest::builder().name("db1").build())
        .unwrap();
    assert!(catalog.list_tables(&session, Some("db1")).unwrap().is_empty());
    let ident = TableIdent::qualified("db1", "managed");
    assert!(!catalog.table_exists(&session, &ident).unwrap());
}
