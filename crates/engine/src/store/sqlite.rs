//! SQLite backend through sea-orm. The schema is created by the `migration`
//! crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseConnection, EntityTrait, QueryOrder, TransactionTrait,
    sea_query::OnConflict,
};

use super::{AccountRecord, LedgerSnapshot, Store};
use crate::ResultEngine;

const META_ROW_ID: i32 = 1;

pub(crate) mod accounts {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "accounts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: String,
        pub balance: i64,
        pub last_daily_claim_at: Option<DateTimeUtc>,
        pub daily_claims: i64,
        pub position: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub(crate) mod ledger_meta {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "ledger_meta")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub last_updated: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl From<accounts::Model> for AccountRecord {
    fn from(model: accounts::Model) -> Self {
        Self {
            user_id: model.user_id,
            balance: model.balance,
            last_daily_claim_at: model.last_daily_claim_at,
            daily_claims: model.daily_claims,
            position: model.position,
        }
    }
}

impl From<&AccountRecord> for accounts::ActiveModel {
    fn from(record: &AccountRecord) -> Self {
        Self {
            user_id: ActiveValue::Set(record.user_id.clone()),
            balance: ActiveValue::Set(record.balance),
            last_daily_claim_at: ActiveValue::Set(record.last_daily_claim_at),
            daily_claims: ActiveValue::Set(record.daily_claims),
            position: ActiveValue::Set(record.position),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    database: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load(&self) -> ResultEngine<Option<LedgerSnapshot>> {
        let models = accounts::Entity::find()
            .order_by_asc(accounts::Column::Position)
            .all(&self.database)
            .await?;
        let meta = ledger_meta::Entity::find_by_id(META_ROW_ID)
            .one(&self.database)
            .await?;

        if models.is_empty() && meta.is_none() {
            return Ok(None);
        }

        Ok(Some(LedgerSnapshot {
            accounts: models.into_iter().map(AccountRecord::from).collect(),
            last_updated: meta.map(|m| m.last_updated),
        }))
    }

    async fn save_accounts(
        &self,
        accounts: &[AccountRecord],
        updated_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let db_tx = self.database.begin().await?;

        for record in accounts {
            accounts::Entity::insert(accounts::ActiveModel::from(record))
                .on_conflict(
                    OnConflict::column(accounts::Column::UserId)
                        .update_columns([
                            accounts::Column::Balance,
                            accounts::Column::LastDailyClaimAt,
                            accounts::Column::DailyClaims,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;
        }

        let meta = ledger_meta::ActiveModel {
            id: ActiveValue::Set(META_ROW_ID),
            last_updated: ActiveValue::Set(updated_at),
        };
        ledger_meta::Entity::insert(meta)
            .on_conflict(
                OnConflict::column(ledger_meta::Column::Id)
                    .update_column(ledger_meta::Column::LastUpdated)
                    .to_owned(),
            )
            .exec_without_returning(&db_tx)
            .await?;

        db_tx.commit().await?;
        Ok(())
    }
}
