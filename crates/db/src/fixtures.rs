use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_CUSTOMER_IDS: &[i64] = &[1, 2];
const SEED_INVOICE_IDS: &[i64] = &[1];
const SEED_LEDGER_IDS: &[i64] = &[1, 2, 3];

/// One catalog row the fixture promises to exist. The demo, the smoke
/// test and the docs all lean on these exact ids and prices.
#[derive(Debug, Clone, Copy)]
pub struct SeedItemContract {
    pub id: i64,
    pub name: &'static str,
    pub unit_price: &'static str,
    pub requires_prescription: bool,
}

/// Demo pharmacy dataset: a 34-item catalog plus two ledger customers,
/// one of them with an overdue balance for the reminder scanner to find.
pub struct SeedCatalog;

impl SeedCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_catalog.sql");

    pub const ITEMS: &'static [SeedItemContract] = &[
        SeedItemContract { id: 1, name: "Paracetamol 500mg", unit_price: "2.50", requires_prescription: false },
        SeedItemContract { id: 2, name: "Dolo 650", unit_price: "3.00", requires_prescription: false },
        SeedItemContract { id: 3, name: "Crocin Advance", unit_price: "4.50", requires_prescription: false },
        SeedItemContract { id: 4, name: "Azithromycin 500mg", unit_price: "15.00", requires_prescription: false },
        SeedItemContract { id: 5, name: "Amoxicillin 500mg", unit_price: "8.00", requires_prescription: false },
        SeedItemContract { id: 6, name: "Cetirizine 10mg", unit_price: "1.50", requires_prescription: false },
        SeedItemContract { id: 7, name: "Pan 40 (Pantoprazole)", unit_price: "6.00", requires_prescription: false },
        SeedItemContract { id: 8, name: "Omez (Omeprazole)", unit_price: "4.50", requires_prescription: false },
        SeedItemContract { id: 9, name: "Ranitidine 150mg", unit_price: "2.00", requires_prescription: false },
        SeedItemContract { id: 10, name: "Metformin 500mg", unit_price: "1.00", requires_prescription: false },
        SeedItemContract { id: 11, name: "Glimepiride 1mg", unit_price: "3.50", requires_prescription: false },
        SeedItemContract { id: 12, name: "Atorvastatin 10mg", unit_price: "4.00", requires_prescription: false },
        SeedItemContract { id: 13, name: "Amlodipine 5mg", unit_price: "2.50", requires_prescription: false },
        SeedItemContract { id: 14, name: "Combiflam", unit_price: "5.00", requires_prescription: false },
        SeedItemContract { id: 15, name: "Voveran (Diclofenac)", unit_price: "6.50", requires_prescription: false },
        SeedItemContract { id: 16, name: "Brufen (Ibuprofen) 400mg", unit_price: "3.50", requires_prescription: false },
        SeedItemContract { id: 17, name: "Disprin (Aspirin)", unit_price: "1.50", requires_prescription: false },
        SeedItemContract { id: 18, name: "Ciprofloxacin 500mg", unit_price: "7.00", requires_prescription: false },
        SeedItemContract { id: 19, name: "Norflox TZ", unit_price: "12.00", requires_prescription: false },
        SeedItemContract { id: 20, name: "Montelukast 10mg", unit_price: "8.50", requires_prescription: false },
        SeedItemContract { id: 21, name: "Levocetrizine 5mg", unit_price: "3.00", requires_prescription: false },
        SeedItemContract { id: 22, name: "Allegra 120mg (Fexofenadine)", unit_price: "9.00", requires_prescription: false },
        SeedItemContract { id: 23, name: "Digene Gel", unit_price: "25.00", requires_prescription: false },
        SeedItemContract { id: 24, name: "Gelusil Syrup", unit_price: "45.00", requires_prescription: false },
        SeedItemContract { id: 25, name: "ORS (Electral)", unit_price: "8.00", requires_prescription: false },
        SeedItemContract { id: 26, name: "Calpol 250mg Syrup", unit_price: "55.00", requires_prescription: false },
        SeedItemContract { id: 27, name: "Ascoril LS Syrup", unit_price: "85.00", requires_prescription: false },
        SeedItemContract { id: 28, name: "Benadryl Cough Syrup", unit_price: "95.00", requires_prescription: false },
        SeedItemContract { id: 29, name: "Vitamin D3 60K", unit_price: "35.00", requires_prescription: false },
        SeedItemContract { id: 30, name: "Vitamin B Complex", unit_price: "18.00", requires_prescription: false },
        SeedItemContract { id: 31, name: "Calcium + Vitamin D3", unit_price: "75.00", requires_prescription: false },
        SeedItemContract { id: 32, name: "Codeine Phosphate 30mg", unit_price: "120.00", requires_prescription: true },
        SeedItemContract { id: 33, name: "Alprazolam 0.5mg", unit_price: "85.00", requires_prescription: true },
        SeedItemContract { id: 34, name: "Tramadol 50mg", unit_price: "95.00", requires_prescription: true },
    ];

    /// Load the demo dataset. Safe to call repeatedly; fixed ids make
    /// the inserts replace rather than duplicate.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            items_seeded: Self::ITEMS.len(),
            customers_seeded: SEED_CUSTOMER_IDS.len(),
        })
    }

    /// Verify the loaded rows against the contract table.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let item_ids = sql_array_from_ids(&Self::ITEMS.iter().map(|i| i.id).collect::<Vec<_>>());
        let catalog_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM inventory_items WHERE id IN {item_ids}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("catalog-count", catalog_count == Self::ITEMS.len() as i64));

        for item in Self::ITEMS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM inventory_items
                 WHERE id = ?1 AND name = ?2 AND unit_price = ?3 AND requires_prescription = ?4)",
            )
            .bind(item.id)
            .bind(item.name)
            .bind(item.unit_price)
            .bind(i64::from(item.requires_prescription))
            .fetch_one(pool)
            .await?;
            checks.push((item.name, present == 1));
        }

        let controlled_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM inventory_items WHERE id IN {item_ids} AND requires_prescription = 1"
        ))
        .fetch_one(pool)
        .await?;
        let expected_controlled =
            Self::ITEMS.iter().filter(|i| i.requires_prescription).count() as i64;
        checks.push(("prescription-flags", controlled_count == expected_controlled));

        let rahul: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM customers
             WHERE id = 1 AND name = 'Rahul' AND phone = '+919876543210')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("customer-rahul", rahul == 1));

        let priya: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE id = 2 AND name = 'Priya' AND phone IS NULL)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("customer-priya", priya == 1));

        let invoice: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM invoices
             WHERE id = 1 AND customer_id = 1 AND amount = '350.00' AND status = 'sent')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("invoice-rahul-sent", invoice == 1));

        // Timestamps compare as text, so the cutoff must use the same
        // RFC3339 shape the fixture writes.
        let overdue: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ledger_entries
             WHERE id = 1 AND customer_id = 1 AND debit = '350.00'
               AND created_at < strftime('%Y-%m-%dT%H:%M:%SZ', 'now', '-30 days'))",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("ledger-rahul-overdue", overdue == 1));

        let priya_settled: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE id = 2 AND (
                 SELECT COALESCE(SUM(CAST(debit AS REAL)) - SUM(CAST(credit AS REAL)), 0)
                 FROM ledger_entries WHERE customer_id = 2
             ) = 0)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("ledger-priya-settled", priya_settled == 1));

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove every seeded row from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let ledger_ids = sql_array_from_ids(SEED_LEDGER_IDS);
        let invoice_ids = sql_array_from_ids(SEED_INVOICE_IDS);
        let customer_ids = sql_array_from_ids(SEED_CUSTOMER_IDS);
        let item_ids = sql_array_from_ids(&Self::ITEMS.iter().map(|i| i.id).collect::<Vec<_>>());

        sqlx::query(&format!("DELETE FROM ledger_entries WHERE id IN {ledger_ids}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM invoices WHERE id IN {invoice_ids}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM customers WHERE id IN {customer_ids}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM inventory_items WHERE id IN {item_ids}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub items_seeded: usize,
    pub customers_seeded: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
