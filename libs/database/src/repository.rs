//! Generic SeaORM repository wrapper shared by domain crates.
//!
//! Each domain's `Pg*Repository` wraps one of these instead of hand-writing
//! insert/find/update/delete against `sea_orm::EntityTrait` directly.

use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, PrimaryKeyTrait};
use std::marker::PhantomData;

/// Marker for entities keyed by a `Uuid` primary key. Most domain entities in
/// this codebase use `Uuid::now_v7()` ids; this lets call sites that need to
/// be generic over "the usual kind of entity" say so without repeating the
/// `PrimaryKeyTrait` bound.
pub trait UuidEntity: EntityTrait {}

/// Thin wrapper around a `DatabaseConnection` scoped to one entity.
pub struct BaseRepository<E: EntityTrait> {
    db: DatabaseConnection,
    _entity: PhantomData<E>,
}

impl<E: EntityTrait> BaseRepository<E> {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn find_by_id<V>(&self, id: V) -> Result<Option<E::Model>, DbErr>
    where
        V: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        E::find_by_id(id).one(&self.db).await
    }

    pub async fn insert(&self, model: E::ActiveModel) -> Result<E::Model, DbErr>
    where
        E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    {
        model.insert(&self.db).await
    }

    pub async fn update(&self, model: E::ActiveModel) -> Result<E::Model, DbErr>
    where
        E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    {
        model.update(&self.db).await
    }

    pub async fn delete_by_id<V>(&self, id: V) -> Result<u64, DbErr>
    where
        V: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        let result = E::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }
}

impl<E: EntityTrait> Clone for BaseRepository<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _entity: PhantomData,
        }
    }
}
