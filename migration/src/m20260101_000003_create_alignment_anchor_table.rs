use crate::m20260101_000001_create_mapping_table::Mapping;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AlignmentAnchor::Table)
                    .if_not_exists()
                    .col(pk_auto(AlignmentAnchor::Id))
                    .col(string(AlignmentAnchor::BookId))
                    .col(integer(AlignmentAnchor::Ordinal))
                    .col(big_integer(AlignmentAnchor::CharOffset))
                    .col(double(AlignmentAnchor::AudioTimestampSeconds))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alignment_anchor_book_id")
                            .from(AlignmentAnchor::Table, AlignmentAnchor::BookId)
                            .to(Mapping::Table, Mapping::BookId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_alignment_anchor_book_ordinal")
                    .table(AlignmentAnchor::Table)
                    .col(AlignmentAnchor::BookId)
                    .col(AlignmentAnchor::Ordinal)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AlignmentAnchor::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AlignmentAnchor {
    Table,
    Id,
    BookId,
    Ordinal,
    CharOffset,
    AudioTimestampSeconds,
}
