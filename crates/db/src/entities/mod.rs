//! Database entities.

#![allow(missing_docs)]

pub mod blocking;
pub mod follow_request;
pub mod following;
pub mod instance;
pub mod user;
pub mod user_profile;

pub use blocking::Entity as Blocking;
pub use follow_request::Entity as FollowRequest;
pub use following::Entity as Following;
pub use instance::Entity as Instance;
pub use user::Entity as User;
pub use user_profile::Entity as UserProfile;
