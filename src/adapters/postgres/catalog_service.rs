use crate::domain::value_objects::BookId;
use crate::ports::{BookStatus, CatalogItem, CatalogService as CatalogServiceTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use super::loan_repository::invalid_data;

/// PostgreSQL implementation of CatalogService
///
/// Copy counters are only ever changed by single conditional UPDATE
/// statements, so concurrent loans cannot drive `available_copies` below zero.
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn copies(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}

#[async_trait]
impl CatalogServiceTrait for CatalogService {
    async fn find_book(&self, book_id: BookId) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(
            r#"
            SELECT book_id, title, total_copies, available_copies, status
            FROM books
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_str: &str = row.try_get("status")?;
        Ok(Some(CatalogItem {
            book_id: BookId::from_uuid(row.try_get("book_id")?),
            title: row.try_get("title")?,
            total_copies: copies(row.try_get("total_copies")?, "total_copies")?,
            available_copies: copies(row.try_get("available_copies")?, "available_copies")?,
            status: BookStatus::from_str(status_str).map_err(invalid_data)?,
        }))
    }

    async fn decrement_available(&self, book_id: BookId) -> Result<Option<u32>> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books SET
                available_copies = available_copies - 1,
                status = CASE
                    WHEN available_copies - 1 = 0 AND status = 'available' THEN 'borrowed'
                    ELSE status
                END,
                updated_at = NOW()
            WHERE book_id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        remaining
            .map(|value| copies(value, "available_copies"))
            .transpose()
    }

    async fn increment_available(&self, book_id: BookId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                available_copies = available_copies + 1,
                status = CASE WHEN status = 'borrowed' THEN 'available' ELSE status END,
                updated_at = NOW()
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("Book {} not found in catalog", book_id).into());
        }
        Ok(())
    }

    async fn mark_lost(&self, book_id: BookId, remove_copy: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                available_copies = CASE
                    WHEN $2 THEN GREATEST(available_copies - 1, 0)
                    ELSE available_copies
                END,
                status = 'lost',
                updated_at = NOW()
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.value())
        .bind(remove_copy)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("Book {} not found in catalog", book_id).into());
        }
        Ok(())
    }
}
