use sea_orm_migration::prelude::*;

/// Single-row table holding the `lastUpdated` marker of the ledger.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LedgerMeta::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerMeta::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LedgerMeta::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerMeta::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum LedgerMeta {
    Table,
    Id,
    LastUpdated,
}
