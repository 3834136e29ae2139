use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use parchi_core::domain::business::BusinessId;
use parchi_core::domain::customer::CustomerId;
use parchi_core::domain::draft::{
    DraftAction, DraftActionId, DraftPayload, DraftStatus, NewDraftAction,
};

use super::{parse_timestamp, DraftActionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDraftActionRepository {
    pool: DbPool,
}

impl SqlDraftActionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, business_id, intent, payload_json, status, explanation, created_at
     FROM agent_actions";

#[async_trait::async_trait]
impl DraftActionRepository for SqlDraftActionRepository {
    async fn insert(&self, draft: NewDraftAction) -> Result<DraftAction, RepositoryError> {
        let payload_json = serde_json::to_string(&draft.payload)
            .map_err(|error| RepositoryError::Decode(format!("unserializable payload: {error}")))?;
        let created_at = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO agent_actions
                (business_id, intent, payload_json, status, explanation, created_at)
             VALUES (?, ?, ?, 'DRAFT', ?, ?)",
        )
        .bind(draft.business_id.0)
        .bind(draft.payload.intent())
        .bind(payload_json)
        .bind(&draft.explanation)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(DraftAction {
            id: DraftActionId(inserted.last_insert_rowid()),
            business_id: draft.business_id,
            payload: draft.payload,
            status: DraftStatus::Draft,
            explanation: draft.explanation,
            created_at,
        })
    }

    async fn find_by_id(
        &self,
        id: &DraftActionId,
    ) -> Result<Option<DraftAction>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(draft_action_from_row).transpose()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<DraftAction>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(draft_action_from_row).collect()
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<DraftAction>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('DRAFT', 'APPROVED') ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(draft_action_from_row).collect()
    }

    async fn has_open_reminder(&self, customer_id: &CustomerId) -> Result<bool, RepositoryError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM agent_actions
                WHERE intent = 'send_payment_reminder'
                  AND status IN ('DRAFT', 'APPROVED')
                  AND json_extract(payload_json, '$.customer_id') = ?
             )",
        )
        .bind(customer_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists == 1)
    }
}

pub(crate) fn draft_action_from_row(row: SqliteRow) -> Result<DraftAction, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = DraftStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown draft status `{status_raw}`")))?;

    let payload_json = row.try_get::<String, _>("payload_json")?;
    let payload: DraftPayload = serde_json::from_str(&payload_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid payload_json: {error}")))?;

    // The intent column is derived from the payload kind; disagreement
    // means the row was tampered with or written by broken code.
    let intent = row.try_get::<String, _>("intent")?;
    if intent != payload.intent() {
        return Err(RepositoryError::Decode(format!(
            "intent column `{intent}` does not match payload kind `{}`",
            payload.intent()
        )));
    }

    Ok(DraftAction {
        id: DraftActionId(row.try_get("id")?),
        business_id: BusinessId(row.try_get("business_id")?),
        payload,
        status,
        explanation: row.try_get("explanation")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
