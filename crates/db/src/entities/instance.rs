//! Instance entity (per-host federation statistics).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The hostname of this instance (lowercase, unique).
    #[sea_orm(unique)]
    pub host: String,

    /// Number of follow edges from users of this instance to local users.
    #[sea_orm(default_value = 0)]
    pub following_count: i32,

    /// Number of follow edges from local users to users of this instance.
    #[sea_orm(default_value = 0)]
    pub followers_count: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
