//! Repositories over the relationship tables.

mod blocking;
mod follow_request;
mod following;
mod instance;
mod user;

pub use blocking::BlockingRepository;
pub use follow_request::{FollowRequestRepository, RequestInsert};
pub use following::{EdgeInsert, FollowingRepository};
pub use instance::InstanceRepository;
pub use user::UserRepository;

use sea_orm::sea_query::{Expr, SimpleExpr};

/// Expression adding `delta` to an integer column without going below zero.
pub(crate) fn clamped_add(column: &str, delta: i32) -> SimpleExpr {
    if delta >= 0 {
        Expr::cust(format!("{column} + {delta}"))
    } else {
        Expr::cust(format!("GREATEST({column} - {}, 0)", delta.unsigned_abs()))
    }
}
