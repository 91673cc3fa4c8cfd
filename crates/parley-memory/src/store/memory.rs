//! Per-user and per-chat memory fields.

use std::collections::BTreeMap;

use super::SqliteStore;
use chrono::{DateTime, Utc};
use parley_core::{
    error::ParleyError,
    model::{MemoryField, MemoryScope},
};

type FieldRow = (String, String, Option<String>, String);

fn field_from_row(row: FieldRow) -> Result<(String, MemoryField), ParleyError> {
    let (field_id, value, previous_value, updated_at) = row;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| ParleyError::Store(format!("bad timestamp on {field_id}: {e}")))?
        .with_timezone(&Utc);
    Ok((
        field_id,
        MemoryField {
            value,
            updated_at,
            previous_value,
        },
    ))
}

impl SqliteStore {
    pub async fn get_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
    ) -> Result<Option<MemoryField>, ParleyError> {
        let row: Option<FieldRow> = sqlx::query_as(
            "SELECT field_id, value, previous_value, updated_at FROM memory_fields \
             WHERE scope = ? AND owner_id = ? AND field_id = ?",
        )
        .bind(scope.as_str())
        .bind(owner_id)
        .bind(field_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("get memory field failed: {e}")))?;

        row.map(field_from_row)
            .transpose()
            .map(|opt| opt.map(|(_, field)| field))
    }

    /// Upsert one field.
    pub async fn set_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
        field: &MemoryField,
    ) -> Result<(), ParleyError> {
        sqlx::query(
            "INSERT INTO memory_fields (scope, owner_id, field_id, value, previous_value, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(scope, owner_id, field_id) DO UPDATE SET \
             value = excluded.value, previous_value = excluded.previous_value, \
             updated_at = excluded.updated_at",
        )
        .bind(scope.as_str())
        .bind(owner_id)
        .bind(field_id)
        .bind(&field.value)
        .bind(&field.previous_value)
        .bind(field.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("set memory field failed: {e}")))?;
        Ok(())
    }

    pub async fn delete_memory_field(
        &self,
        scope: MemoryScope,
        owner_id: &str,
        field_id: &str,
    ) -> Result<(), ParleyError> {
        sqlx::query("DELETE FROM memory_fields WHERE scope = ? AND owner_id = ? AND field_id = ?")
            .bind(scope.as_str())
            .bind(owner_id)
            .bind(field_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Store(format!("delete memory field failed: {e}")))?;
        Ok(())
    }

    pub async fn get_all_memory(
        &self,
        scope: MemoryScope,
        owner_id: &str,
    ) -> Result<BTreeMap<String, MemoryField>, ParleyError> {
        let rows: Vec<FieldRow> = sqlx::query_as(
            "SELECT field_id, value, previous_value, updated_at FROM memory_fields \
             WHERE scope = ? AND owner_id = ? ORDER BY field_id",
        )
        .bind(scope.as_str())
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Store(format!("get memory failed: {e}")))?;

        rows.into_iter().map(field_from_row).collect()
    }
}
