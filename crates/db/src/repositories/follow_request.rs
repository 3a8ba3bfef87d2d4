//! Follow request repository.

use std::sync::Arc;

use crate::entities::{FollowRequest, Following, follow_request, following};
use relgraph_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::OnConflict,
};

/// Result of inserting a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestInsert {
    /// The row was written.
    Inserted,
    /// A request for the pair was already pending.
    AlreadyPending,
    /// The pair already has a following edge; nothing was written.
    AlreadyFollowing,
}

/// Follow request repository for database operations.
#[derive(Clone)]
pub struct FollowRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRequestRepository {
    /// Create a new follow request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow request by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        FollowRequest::find()
            .filter(follow_request::Column::FollowerId.eq(follower_id))
            .filter(follow_request::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a follow request unless the pair already has a request or an
    /// edge.
    ///
    /// The edge lookup and the insert share a transaction.
    pub async fn insert(
        &self,
        model: follow_request::ActiveModel,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<RequestInsert> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let edge = Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if edge.is_some() {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(RequestInsert::AlreadyFollowing);
        }

        let rows = FollowRequest::insert(model)
            .on_conflict(
                OnConflict::columns([
                    follow_request::Column::FollowerId,
                    follow_request::Column::FolloweeId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(if rows > 0 {
            RequestInsert::Inserted
        } else {
            RequestInsert::AlreadyPending
        })
    }

    /// Delete a follow request by pair. Returns whether a row was removed.
    pub async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let result = FollowRequest::delete_many()
            .filter(follow_request::Column::FollowerId.eq(follower_id))
            .filter(follow_request::Column::FolloweeId.eq(followee_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Every pending request addressed to `followee_id`, oldest first.
    pub async fn find_by_followee(&self, followee_id: &str) -> AppResult<Vec<follow_request::Model>> {
        FollowRequest::find()
            .filter(follow_request::Column::FolloweeId.eq(followee_id))
            .order_by_asc(follow_request::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
