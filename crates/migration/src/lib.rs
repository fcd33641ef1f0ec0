pub use sea_orm_migration::prelude::*;

mod m20261001_000001_accounts;
mod m20261001_000002_ledger_meta;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_accounts::Migration),
            Box::new(m20261001_000002_ledger_meta::Migration),
        ]
    }
}
