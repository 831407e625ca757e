//! Per-client external identifiers for a mapping (spec §3 Book mapping
//! invariant: "external identifiers must be unique per client namespace").

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "external_identifier")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub book_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub client_name: String,
    pub external_id: String,
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
