//! Suggestion (spec §3): a candidate mapping surfaced by a client's polling
//! edge, referenced only at the boundary of the trigger layer (C7).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "suggestion")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub source_client: String,
    pub external_id: String,
    pub candidate_book_id: String,
    pub confidence: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
