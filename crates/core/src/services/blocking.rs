//! Blocking oracle.

use std::sync::Arc;

use async_trait::async_trait;
use relgraph_common::AppResult;
use relgraph_db::repositories::BlockingRepository;

/// Answers whether one actor blocks another.
#[async_trait]
pub trait BlockingOracle: Send + Sync {
    /// Whether `blocker_id` is blocking `blockee_id`. Direction matters.
    async fn is_blocked(&self, blocker_id: &str, blockee_id: &str) -> AppResult<bool>;

    /// Remove a block. Missing blocks are not an error.
    async fn unblock(&self, blocker_id: &str, blockee_id: &str) -> AppResult<()>;
}

/// Type alias for a shared blocking oracle.
pub type BlockingOracleService = Arc<dyn BlockingOracle>;

/// Blocking service backed by the `blocking` table.
#[derive(Clone)]
pub struct BlockingService {
    blocking_repo: BlockingRepository,
}

impl BlockingService {
    /// Create a new blocking service.
    #[must_use]
    pub const fn new(blocking_repo: BlockingRepository) -> Self {
        Self { blocking_repo }
    }
}

#[async_trait]
impl BlockingOracle for BlockingService {
    async fn is_blocked(&self, blocker_id: &str, blockee_id: &str) -> AppResult<bool> {
        self.blocking_repo.is_blocking(blocker_id, blockee_id).await
    }

    async fn unblock(&self, blocker_id: &str, blockee_id: &str) -> AppResult<()> {
        if self.blocking_repo.delete_by_pair(blocker_id, blockee_id).await? {
            tracing::info!(blocker_id = %blocker_id, blockee_id = %blockee_id, "Block removed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_unblock_missing_block_is_ok() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let service = BlockingService::new(BlockingRepository::new(db));
        service.unblock("alice", "bob").await.unwrap();
    }

    #[tokio::test]
    async fn test_is_blocked_false_without_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<relgraph_db::entities::blocking::Model>::new()])
                .into_connection(),
        );

        let service = BlockingService::new(BlockingRepository::new(db));
        assert!(!service.is_blocked("alice", "bob").await.unwrap());
    }
}
