//! Client state: one row per `(book_id, client_name)` (spec §3 "Client state").

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "client_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub book_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub client_name: String,
    /// Monotonic wall-clock, seconds since epoch.
    pub last_updated: i64,
    /// 0.0-1.0 when meaningful.
    pub percentage: Option<f64>,
    /// Seconds into audio, for audiobook clients.
    pub timestamp_seconds: Option<f64>,
    /// Opaque key->value locator payload (xpath, css, fragment, cfi, ...).
    pub locator_json: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mapping::Entity",
        from = "Column::BookId",
        to = "super::mapping::Column::BookId"
    )]
    Mapping,
}

impl Related<super::mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mapping.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
