use core_proc_macros::SeaOrmResource;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, SeaOrmResource)]
#[sea_orm(table_name = "story_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub story_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::PersistedJobRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            story_id: model.story_id,
            user_id: model.user_id,
            status: model.status.parse().unwrap_or(crate::models::JobStatus::Failed),
            updated_at: model.updated_at.into(),
        }
    }
}

/// Builds the `Set`-wrapped `ActiveModel` for a brand new, `pending` row.
pub fn new_active_model(story_id: Uuid, user_id: Uuid, user_email: String) -> ActiveModel {
    let now = chrono::Utc::now().into();
    ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        story_id: Set(story_id),
        user_id: Set(user_id),
        user_email: Set(user_email),
        status: Set(crate::models::JobStatus::Pending.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
}
