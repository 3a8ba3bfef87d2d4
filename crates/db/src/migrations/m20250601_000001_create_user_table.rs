//! Create user table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(User::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(User::Username).string_len(128).not_null())
                    .col(ColumnDef::new(User::UsernameLower).string_len(128).not_null())
                    .col(ColumnDef::new(User::Host).string_len(256))
                    .col(ColumnDef::new(User::Uri).string_len(512).unique_key())
                    .col(ColumnDef::new(User::Inbox).string_len(512))
                    .col(ColumnDef::new(User::SharedInbox).string_len(512))
                    .col(ColumnDef::new(User::IsLocked).boolean().not_null().default(false))
                    .col(ColumnDef::new(User::IsBot).boolean().not_null().default(false))
                    .col(ColumnDef::new(User::MovedToUri).string_len(512))
                    .col(ColumnDef::new(User::AlsoKnownAs).json_binary())
                    .col(ColumnDef::new(User::FollowersCount).integer().not_null().default(0))
                    .col(ColumnDef::new(User::FollowingCount).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(User::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Unique index: (username_lower, host) - one account per name per origin
        manager
            .create_index(
                Index::create()
                    .name("idx_user_username_lower_host")
                    .table(User::Table)
                    .col(User::UsernameLower)
                    .col(User::Host)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: moved_to_uri (migrated-counterpart filtering in recounts)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_moved_to_uri")
                    .table(User::Table)
                    .col(User::MovedToUri)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum User {
    Table,
    Id,
    Username,
    UsernameLower,
    Host,
    Uri,
    Inbox,
    SharedInbox,
    IsLocked,
    IsBot,
    MovedToUri,
    AlsoKnownAs,
    FollowersCount,
    FollowingCount,
    CreatedAt,
    UpdatedAt,
}
