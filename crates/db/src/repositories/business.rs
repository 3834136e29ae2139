use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use parchi_core::domain::business::{Business, BusinessId};

use super::{BusinessRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBusinessRepository {
    pool: DbPool,
}

impl SqlBusinessRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BusinessRepository for SqlBusinessRepository {
    async fn get_or_create(
        &self,
        name: &str,
        owner_name: &str,
    ) -> Result<Business, RepositoryError> {
        let existing = sqlx::query("SELECT id, name, owner_name FROM businesses WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            return business_from_row(row);
        }

        let inserted =
            sqlx::query("INSERT INTO businesses (name, owner_name, created_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(owner_name)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;

        Ok(Business {
            id: BusinessId(inserted.last_insert_rowid()),
            name: name.to_owned(),
            owner_name: owner_name.to_owned(),
        })
    }

    async fn find_default(&self) -> Result<Option<Business>, RepositoryError> {
        let row =
            sqlx::query("SELECT id, name, owner_name FROM businesses ORDER BY id ASC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        row.map(business_from_row).transpose()
    }
}

fn business_from_row(row: SqliteRow) -> Result<Business, RepositoryError> {
    Ok(Business {
        id: BusinessId(row.try_get("id")?),
        name: row.try_get("name")?,
        owner_name: row.try_get("owner_name")?,
    })
}
