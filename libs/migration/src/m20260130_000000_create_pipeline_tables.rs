use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create the stories table
        manager
            .create_table(
                Table::create()
                    .table(Stories::Table)
                    .if_not_exists()
                    .col(pk_uuid(Stories::Id))
                    .col(ColumnDef::new(Stories::UserId).uuid().not_null())
                    .col(ColumnDef::new(Stories::Preferences).text().not_null())
                    .col(text_null(Stories::Content))
                    .col(
                        timestamp_with_time_zone(Stories::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Stories::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stories_user")
                            .from(Stories::Table, Stories::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create the story_jobs table
        manager
            .create_table(
                Table::create()
                    .table(StoryJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoryJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoryJobs::StoryId).uuid().not_null())
                    .col(ColumnDef::new(StoryJobs::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(StoryJobs::UserEmail)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoryJobs::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        timestamp_with_time_zone(StoryJobs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(StoryJobs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_jobs_story")
                            .from(StoryJobs::Table, StoryJobs::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_jobs_user")
                            .from(StoryJobs::Table, StoryJobs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create the email_jobs table
        manager
            .create_table(
                Table::create()
                    .table(EmailJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailJobs::StoryId).uuid().not_null())
                    .col(ColumnDef::new(EmailJobs::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmailJobs::UserEmail)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailJobs::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        timestamp_with_time_zone(EmailJobs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(EmailJobs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_jobs_story")
                            .from(EmailJobs::Table, EmailJobs::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_jobs_user")
                            .from(EmailJobs::Table, EmailJobs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_stories_user_id")
                    .table(Stories::Table)
                    .col(Stories::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_story_jobs_story_id")
                    .table(StoryJobs::Table)
                    .col(StoryJobs::StoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_story_jobs_status")
                    .table(StoryJobs::Table)
                    .col(StoryJobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_jobs_story_id")
                    .table(EmailJobs::Table)
                    .col(EmailJobs::StoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_jobs_status")
                    .table(EmailJobs::Table)
                    .col(EmailJobs::Status)
                    .to_owned(),
            )
            .await?;

        // Add updated_at triggers
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER stories_touch_updated_at
                    BEFORE UPDATE ON stories
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER story_jobs_touch_updated_at
                    BEFORE UPDATE ON story_jobs
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER email_jobs_touch_updated_at
                    BEFORE UPDATE ON email_jobs
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS email_jobs_touch_updated_at ON email_jobs")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS story_jobs_touch_updated_at ON story_jobs")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS stories_touch_updated_at ON stories")
            .await?;

        manager
            .drop_table(Table::drop().table(EmailJobs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StoryJobs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Stories::Table).to_owned())
            .await?;

        Ok(())
    }
}

/// Reference to users table for foreign keys.
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Stories {
    Table,
    Id,
    UserId,
    Preferences,
    Content,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StoryJobs {
    Table,
    Id,
    StoryId,
    UserId,
    UserEmail,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmailJobs {
    Table,
    Id,
    StoryId,
    UserId,
    UserEmail,
    Status,
    CreatedAt,
    UpdatedAt,
}
