//! Instance repository for per-host follow statistics.

use std::sync::Arc;

use super::clamped_add;
use crate::entities::{Instance, instance};
use relgraph_common::{AppError, AppResult, IdGenerator};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::{Expr, OnConflict},
};

/// Instance repository for database operations.
#[derive(Clone)]
pub struct InstanceRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl InstanceRepository {
    /// Create a new instance repository.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Find an instance by hostname.
    pub async fn find_by_host(&self, host: &str) -> AppResult<Option<instance::Model>> {
        Instance::find()
            .filter(instance::Column::Host.eq(host.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Make sure a row exists for `host`.
    ///
    /// Concurrent first contacts from the same host race on the unique host
    /// column; the loser's insert is a no-op.
    pub async fn ensure(&self, host: &str) -> AppResult<()> {
        let model = instance::ActiveModel {
            id: Set(self.id_gen.generate()),
            host: Set(host.to_lowercase()),
            created_at: Set(chrono::Utc::now().fixed_offset()),
            ..Default::default()
        };

        Instance::insert(model)
            .on_conflict(
                OnConflict::column(instance::Column::Host)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Adjust the count of edges from this host's users to local users.
    pub async fn adjust_following_count(&self, host: &str, delta: i32) -> AppResult<()> {
        self.ensure(host).await?;
        Instance::update_many()
            .col_expr(
                instance::Column::FollowingCount,
                clamped_add("following_count", delta),
            )
            .col_expr(
                instance::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(instance::Column::Host.eq(host.to_lowercase()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Adjust the count of edges from local users to this host's users.
    pub async fn adjust_followers_count(&self, host: &str, delta: i32) -> AppResult<()> {
        self.ensure(host).await?;
        Instance::update_many()
            .col_expr(
                instance::Column::FollowersCount,
                clamped_add("followers_count", delta),
            )
            .col_expr(
                instance::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(instance::Column::Host.eq(host.to_lowercase()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
