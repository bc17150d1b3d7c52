mod common;

use common::{repository, repository_with, row_count, Person, RecordingBuilder};
use repokit_core::{
    record_of, AsyncTransaction, CancellationToken, Entity, Filter, QueryField, QueryOptions,
    RepoError, RepositorySettings, Value,
};
use std::sync::Arc;

#[test]
fn update_by_table_name_uses_one_owned_connection() {
    let builder = Arc::new(RecordingBuilder::default());
    let (_dir, repo) =
        repository_with(RepositorySettings::default().with_statement_builder(builder.clone()));
    repo.insert_entity(&Person::new("Ada", "ada@example.com", 36), None, None)
        .unwrap();

    let payload = record_of([("name", "Ada Lovelace".to_string())]);
    let filter = Filter::from(QueryField::equal("email", "ada@example.com".to_string()));
    let updated = repo
        .update("Person", &payload, &filter, None, None)
        .unwrap();

    assert_eq!(updated, 1);
    assert_eq!(repo.factory().sync_counts(), (2, 2));
    let update = builder
        .calls()
        .into_iter()
        .find(|call| call.method == "update")
        .unwrap();
    assert_eq!(update.table, "Person");
    assert_eq!(update.records, vec![payload]);
    assert_eq!(update.filter, filter.to_group("Person", None).unwrap());
}

#[test]
fn owned_connection_is_released_when_the_operation_fails() {
    let (_dir, repo) = repository();

    let err = repo
        .update(
            "Missing",
            &record_of([("name", "x".to_string())]),
            &Filter::All,
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(repo.factory().sync_counts(), (1, 1));
}

#[test]
fn owned_connection_is_released_when_the_statement_builder_rejects_input() {
    let (_dir, repo) = repository();

    let err = repo
        .insert("Person; DROP TABLE Person", &record_of([("name", "x".to_string())]), None, None)
        .unwrap_err();

    assert!(matches!(err, RepoError::InvalidIdentifier(_)));
    assert_eq!(repo.factory().sync_counts(), (1, 1));
}

#[test]
fn transaction_connection_is_reused_and_never_released() {
    let (_dir, repo) = repository();
    let mut conn = repo.create_connection().unwrap();
    let tx = conn.transaction().unwrap();

    repo.insert_entity(&Person::new("Ada", "ada@example.com", 36), None, Some(&tx))
        .unwrap();
    let inside = repo.count_all(Person::TABLE, None, Some(&tx)).unwrap();
    tx.rollback().unwrap();

    assert_eq!(inside, 1);
    assert_eq!(repo.factory().sync_counts(), (1, 0));
    assert_eq!(row_count(&repo.factory().path(), "Person"), 0);
}

#[test]
fn batch_operation_joins_the_caller_transaction() {
    let (_dir, repo) = repository();
    let people = vec![
        Person::new("A", "a@example.com", 1),
        Person::new("B", "b@example.com", 2),
    ];

    let mut conn = repo.create_connection().unwrap();
    let tx = conn.transaction().unwrap();
    repo.insert_all_entities(&people, None, None, Some(&tx))
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(row_count(&repo.factory().path(), "Person"), 2);
}

#[test]
fn failed_batch_without_transaction_leaves_no_rows() {
    let (_dir, repo) = repository();
    let people = vec![
        Person::new("A", "same@example.com", 1),
        Person::new("B", "other@example.com", 2),
        Person::new("C", "same@example.com", 3),
    ];

    let err = repo
        .insert_all_entities(&people, Some(1), None, None)
        .unwrap_err();

    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(row_count(&repo.factory().path(), "Person"), 0);
    assert_eq!(repo.factory().sync_counts(), (1, 1));
}

#[tokio::test]
async fn async_call_without_transaction_releases_its_connection() {
    let (_dir, repo) = repository();
    let token = CancellationToken::new();

    let key = repo
        .insert_entity_async(&Person::new("Ada", "ada@example.com", 36), None, None, &token)
        .await
        .unwrap();
    let missing = repo
        .query_async("Missing", &Filter::All, &QueryOptions::default(), None, &token)
        .await;

    assert_eq!(key, Value::Integer(1));
    assert!(missing.is_err());
    assert_eq!(repo.factory().async_counts(), (2, 2));
    assert_eq!(repo.factory().sync_counts(), (0, 0));
}

#[tokio::test]
async fn async_transaction_connection_is_reused_and_never_released() {
    let (_dir, repo) = repository();
    let token = CancellationToken::new();
    let conn = repo.create_async_connection().await.unwrap();
    let tx = AsyncTransaction::begin(&conn).await.unwrap();

    repo.insert_entity_async(
        &Person::new("Ada", "ada@example.com", 36),
        None,
        Some(&tx),
        &token,
    )
    .await
    .unwrap();
    let inside = repo
        .count_all_async(Person::TABLE, None, Some(&tx), &token)
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(inside, 1);
    assert_eq!(repo.factory().async_counts(), (1, 0));
    assert_eq!(row_count(&repo.factory().path(), "Person"), 0);
    conn.close().await.unwrap();
}
