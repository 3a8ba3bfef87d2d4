//! User repository.

use std::sync::Arc;

use super::clamped_add;
use crate::entities::{User, UserProfile, user, user_profile};
use relgraph_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IdenStatic,
    QueryFilter, TransactionTrait, sea_query::Expr,
};

/// A user row together with its follow-approval profile, if one exists.
pub type UserWithProfile = (user::Model, Option<user_profile::Model>);

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user and its profile by ID.
    pub async fn find_with_profile(&self, id: &str) -> AppResult<Option<UserWithProfile>> {
        User::find_by_id(id)
            .find_also_related(UserProfile)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user and its profile by `ActivityPub` URI.
    pub async fn find_by_uri_with_profile(&self, uri: &str) -> AppResult<Option<UserWithProfile>> {
        User::find()
            .filter(user::Column::Uri.eq(uri))
            .find_also_related(UserProfile)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move the follower's following count and the followee's followers
    /// count together in one transaction.
    pub async fn adjust_follow_counts(
        &self,
        follower_id: &str,
        followee_id: &str,
        delta: i32,
    ) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        adjust_count(&txn, user::Column::FollowingCount, follower_id, delta).await?;
        adjust_count(&txn, user::Column::FollowersCount, followee_id, delta).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite following count with a recomputed value.
    pub async fn set_following_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        User::update_many()
            .col_expr(user::Column::FollowingCount, Expr::value(count))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Overwrite followers count with a recomputed value.
    pub async fn set_followers_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        User::update_many()
            .col_expr(user::Column::FollowersCount, Expr::value(count))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

async fn adjust_count<C: ConnectionTrait>(
    conn: &C,
    column: user::Column,
    user_id: &str,
    delta: i32,
) -> AppResult<()> {
    User::update_many()
        .col_expr(column, clamped_add(column.as_str(), delta))
        .filter(user::Column::Id.eq(user_id))
        .exec(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
