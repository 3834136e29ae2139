use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use parchi_core::domain::customer::{Customer, CustomerId};

use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, phone FROM customers WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(customer_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, phone FROM customers ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(customer_from_row).collect()
    }

    async fn get_or_create(&self, name: &str) -> Result<Customer, RepositoryError> {
        let existing = sqlx::query("SELECT id, name, phone FROM customers WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            return customer_from_row(row);
        }

        let inserted =
            sqlx::query("INSERT INTO customers (name, phone, created_at) VALUES (?, NULL, ?)")
                .bind(name)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;

        Ok(Customer {
            id: CustomerId(inserted.last_insert_rowid()),
            name: name.to_owned(),
            phone: None,
        })
    }
}

pub(crate) fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
    })
}
