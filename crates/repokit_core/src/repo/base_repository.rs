//! Entity-bound repository.
//!
//! Fixes one [`Entity`] type and forwards every family to [`DbRepository`],
//! addressing `T::TABLE` keyed by `T::PRIMARY_KEY`. Holds no state of its
//! own beyond the façade.

use super::db_repository::{entity_table, DbRepository};
use super::db_repository_async::AggregateRequest;
use crate::db::{AsyncTransaction, ConnectionFactory, SqliteConnectionFactory};
use crate::model::field::Field;
use crate::model::options::{BatchQueryOptions, QueryOptions};
use crate::model::query::Filter;
use crate::model::record::Entity;
use crate::repo::error::RepoResult;
use crate::statement::Aggregate;
use rusqlite::types::Value;
use rusqlite::Transaction;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

pub struct BaseRepository<T: Entity, F: ConnectionFactory = SqliteConnectionFactory> {
    db: DbRepository<F>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, F: ConnectionFactory> BaseRepository<T, F> {
    pub fn new(db: DbRepository<F>) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub fn db(&self) -> &DbRepository<F> {
        &self.db
    }

    pub fn into_inner(self) -> DbRepository<F> {
        self.db
    }

    pub fn insert(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.db.insert_entity(entity, hints, transaction)
    }

    pub fn insert_all(
        &self,
        entities: &[T],
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db
            .insert_all_entities(entities, batch_size, hints, transaction)
    }

    pub fn update(
        &self,
        entity: &T,
        filter: Option<&Filter>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db.update_entity(entity, filter, hints, transaction)
    }

    pub fn update_all(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db
            .update_all_entities(entities, qualifiers, batch_size, hints, transaction)
    }

    pub fn delete(
        &self,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db
            .delete_in(entity_table::<T>(), filter, hints, transaction)
    }

    pub fn delete_entity(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db.delete_entity(entity, hints, transaction)
    }

    pub fn delete_all(
        &self,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db
            .delete_all_in(entity_table::<T>(), hints, transaction)
    }

    pub fn merge(
        &self,
        entity: &T,
        qualifiers: Option<&[Field]>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.db.merge_entity(entity, qualifiers, hints, transaction)
    }

    pub fn merge_all(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<usize> {
        self.db
            .merge_all_entities(entities, qualifiers, batch_size, hints, transaction)
    }

    pub fn query(
        &self,
        filter: &Filter,
        options: &QueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<T>> {
        self.db.query_entities(filter, options, transaction)
    }

    pub fn query_all(
        &self,
        options: &QueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<T>> {
        self.db.query_entities(&Filter::All, options, transaction)
    }

    pub fn batch_query(
        &self,
        filter: &Filter,
        options: &BatchQueryOptions,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Vec<T>> {
        self.db.batch_query_entities(filter, options, transaction)
    }

    pub fn count(
        &self,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<i64> {
        self.db
            .count_in(entity_table::<T>(), filter, hints, transaction)
    }

    pub fn count_all(
        &self,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<i64> {
        self.count(&Filter::All, hints, transaction)
    }

    pub fn sum(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.db.aggregate_in(
            entity_table::<T>(),
            Aggregate::Sum,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn sum_all(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.sum(field, &Filter::All, hints, transaction)
    }

    pub fn max(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.db.aggregate_in(
            entity_table::<T>(),
            Aggregate::Max,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn max_all(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.max(field, &Filter::All, hints, transaction)
    }

    pub fn min(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.db.aggregate_in(
            entity_table::<T>(),
            Aggregate::Min,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn min_all(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.min(field, &Filter::All, hints, transaction)
    }

    pub fn average(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.db.aggregate_in(
            entity_table::<T>(),
            Aggregate::Average,
            field,
            filter,
            hints,
            transaction,
        )
    }

    pub fn average_all(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<Value> {
        self.average(field, &Filter::All, hints, transaction)
    }

    pub fn exists(
        &self,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&Transaction<'_>>,
    ) -> RepoResult<bool> {
        self.db
            .exists_in(entity_table::<T>(), filter, hints, transaction)
    }

    pub fn truncate(&self, transaction: Option<&Transaction<'_>>) -> RepoResult<usize> {
        self.db.truncate_in(entity_table::<T>(), transaction)
    }

    pub async fn insert_async(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.db
            .insert_entity_async(entity, hints, transaction, cancellation)
            .await
    }

    pub async fn insert_all_async(
        &self,
        entities: &[T],
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .insert_all_entities_async(entities, batch_size, hints, transaction, cancellation)
            .await
    }

    pub async fn update_async(
        &self,
        entity: &T,
        filter: Option<&Filter>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .update_entity_async(entity, filter, hints, transaction, cancellation)
            .await
    }

    pub async fn update_all_async(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .update_all_entities_async(
                entities,
                qualifiers,
                batch_size,
                hints,
                transaction,
                cancellation,
            )
            .await
    }

    pub async fn delete_async(
        &self,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .delete_in_async(entity_table::<T>(), filter, hints, transaction, cancellation)
            .await
    }

    pub async fn delete_entity_async(
        &self,
        entity: &T,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .delete_entity_async(entity, hints, transaction, cancellation)
            .await
    }

    pub async fn delete_all_async(
        &self,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .delete_all_in_async(entity_table::<T>(), hints, transaction, cancellation)
            .await
    }

    pub async fn merge_async(
        &self,
        entity: &T,
        qualifiers: Option<&[Field]>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.db
            .merge_entity_async(entity, qualifiers, hints, transaction, cancellation)
            .await
    }

    pub async fn merge_all_async(
        &self,
        entities: &[T],
        qualifiers: Option<&[Field]>,
        batch_size: Option<usize>,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .merge_all_entities_async(
                entities,
                qualifiers,
                batch_size,
                hints,
                transaction,
                cancellation,
            )
            .await
    }

    pub async fn query_async(
        &self,
        filter: &Filter,
        options: &QueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        self.db
            .query_entities_async(filter, options, transaction, cancellation)
            .await
    }

    pub async fn query_all_async(
        &self,
        options: &QueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        self.db
            .query_entities_async(&Filter::All, options, transaction, cancellation)
            .await
    }

    pub async fn batch_query_async(
        &self,
        filter: &Filter,
        options: &BatchQueryOptions,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Vec<T>> {
        self.db
            .batch_query_entities_async(filter, options, transaction, cancellation)
            .await
    }

    pub async fn count_async(
        &self,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<i64> {
        self.db
            .count_in_async(entity_table::<T>(), filter, hints, transaction, cancellation)
            .await
    }

    pub async fn count_all_async(
        &self,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<i64> {
        self.count_async(&Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn sum_async(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request =
            AggregateRequest::new(entity_table::<T>(), Aggregate::Sum, field, filter, hints);
        self.db
            .aggregate_async(request, transaction, cancellation)
            .await
    }

    pub async fn sum_all_async(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.sum_async(field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn max_async(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request =
            AggregateRequest::new(entity_table::<T>(), Aggregate::Max, field, filter, hints);
        self.db
            .aggregate_async(request, transaction, cancellation)
            .await
    }

    pub async fn max_all_async(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.max_async(field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn min_async(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request =
            AggregateRequest::new(entity_table::<T>(), Aggregate::Min, field, filter, hints);
        self.db
            .aggregate_async(request, transaction, cancellation)
            .await
    }

    pub async fn min_all_async(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.min_async(field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn average_async(
        &self,
        field: &Field,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        let request =
            AggregateRequest::new(entity_table::<T>(), Aggregate::Average, field, filter, hints);
        self.db
            .aggregate_async(request, transaction, cancellation)
            .await
    }

    pub async fn average_all_async(
        &self,
        field: &Field,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<Value> {
        self.average_async(field, &Filter::All, hints, transaction, cancellation)
            .await
    }

    pub async fn exists_async(
        &self,
        filter: &Filter,
        hints: Option<&str>,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<bool> {
        self.db
            .exists_in_async(entity_table::<T>(), filter, hints, transaction, cancellation)
            .await
    }

    pub async fn truncate_async(
        &self,
        transaction: Option<&AsyncTransaction>,
        cancellation: &CancellationToken,
    ) -> RepoResult<usize> {
        self.db
            .truncate_in_async(entity_table::<T>(), transaction, cancellation)
            .await
    }
}
