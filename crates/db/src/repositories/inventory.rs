use sqlx::{sqlite::SqliteRow, Row};

use parchi_core::domain::inventory::{InventoryItem, ProductId};

use super::{parse_decimal, InventoryRepository, RepositoryError};
use crate::DbPool;

/// Read side of the catalog. The conversational engine resolves and
/// prices against these rows; writes happen only through seeding.
pub struct SqlInventoryRepository {
    pool: DbPool,
}

impl SqlInventoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InventoryRepository for SqlInventoryRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, unit_price, stock_quantity, requires_prescription, used_for
             FROM inventory_items
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(inventory_item_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<InventoryItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, unit_price, stock_quantity, requires_prescription, used_for
             FROM inventory_items
             ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(inventory_item_from_row).collect()
    }
}

fn inventory_item_from_row(row: SqliteRow) -> Result<InventoryItem, RepositoryError> {
    Ok(InventoryItem {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        stock_quantity: row.try_get("stock_quantity")?,
        requires_prescription: row.try_get::<i64, _>("requires_prescription")? != 0,
        used_for: row.try_get("used_for")?,
    })
}
