//! Alignment map anchors (spec §3 "Alignment map"): ordered, monotonic in
//! both `char_offset` and `audio_timestamp_seconds`, one row per anchor.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alignment_anchor")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub book_id: String,
    /// Position within the anchor sequence; anchors are read back ordered by this.
    pub ordinal: i32,
    pub char_offset: i64,
    pub audio_timestamp_seconds: f64,
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
