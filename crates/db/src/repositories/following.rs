//! Following repository.

use std::sync::Arc;

use crate::entities::{FollowRequest, Following, follow_request, following, user};
use relgraph_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, TransactionTrait, sea_query::OnConflict,
};

/// Result of inserting a following edge.
#[derive(Debug, Clone)]
pub struct EdgeInsert {
    /// False when the pair already had an edge and nothing was written.
    pub inserted: bool,
    /// Pending request for the same pair, removed in the same transaction.
    pub superseded_request: Option<follow_request::Model>,
}

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a following relationship by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followee_id).await?.is_some())
    }

    /// Insert an edge and drop any pending request for the same pair.
    ///
    /// Both writes share a transaction. The unique pair index decides races:
    /// a conflicting insert writes nothing and reports `inserted: false`.
    pub async fn insert_superseding_request(
        &self,
        model: following::ActiveModel,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<EdgeInsert> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let rows = Following::insert(model)
            .on_conflict(
                OnConflict::columns([
                    following::Column::FollowerId,
                    following::Column::FolloweeId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let request = FollowRequest::find()
            .filter(follow_request::Column::FollowerId.eq(follower_id))
            .filter(follow_request::Column::FolloweeId.eq(followee_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if let Some(request) = &request {
            FollowRequest::delete_by_id(request.id.clone())
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(EdgeInsert {
            inserted: rows > 0,
            superseded_request: request,
        })
    }

    /// Delete the edge for a pair, returning the removed row.
    ///
    /// Returns `None` when there was no edge, including when a concurrent
    /// delete won the race between lookup and removal.
    pub async fn delete_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        let Some(edge) = self.find_by_pair(follower_id, followee_id).await? else {
            return Ok(None);
        };

        let result = Following::delete_by_id(edge.id.clone())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((result.rows_affected > 0).then_some(edge))
    }

    /// Ids of every user `follower_id` follows.
    pub async fn followee_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        Following::find()
            .select_only()
            .column(following::Column::FolloweeId)
            .filter(following::Column::FollowerId.eq(follower_id))
            .order_by_asc(following::Column::Id)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count edges from `user_id` whose followee has not moved away.
    pub async fn count_following_not_moved(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .join(JoinType::InnerJoin, following::Relation::Followee.def())
            .filter(following::Column::FollowerId.eq(user_id))
            .filter(user::Column::MovedToUri.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count edges into `user_id` whose follower has not moved away.
    pub async fn count_followers_not_moved(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .join(JoinType::InnerJoin, following::Relation::Follower.def())
            .filter(following::Column::FolloweeId.eq(user_id))
            .filter(user::Column::MovedToUri.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
