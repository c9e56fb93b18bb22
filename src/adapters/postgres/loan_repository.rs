use crate::domain::{
    events::DomainEvent,
    loan::LoanRecord,
    value_objects::{BookId, LoanId, LoanStatus, MemberId, Money, RenewalCount, StaffId},
};
use crate::ports::{
    BoxError, LoanFilter, LoanRepository as LoanRepositoryTrait, Page, Pagination, Result,
    SaveError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction, postgres::PgRow};
use std::str::FromStr;

/// Name of the partial unique index on open (member, book) pairs
const OPEN_PAIR_CONSTRAINT: &str = "loans_open_pair";

pub(super) const LOAN_COLUMNS: &str = r#"
    loan_id,
    book_id,
    member_id,
    loaned_at,
    due_date,
    returned_at,
    last_renewed_at,
    renewal_count,
    status,
    fine_amount,
    fine_paid,
    fine_paid_at,
    notes,
    processed_by,
    created_at,
    updated_at,
    version
"#;

pub(super) fn invalid_data(message: String) -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// Convert a NUMERIC column into Money
pub(super) fn money_column(row: &PgRow, column: &str) -> Result<Money> {
    let amount: Decimal = row.try_get(column)?;
    Ok(Money::new(amount)?)
}

/// PostgreSQLの行データをLoanRecordに変換する
///
/// renewal_count（INT2）、version（INT4）、status（文字列）、fine_amount（NUMERIC）の
/// 変換でエラーハンドリングを行う。
fn map_row_to_loan(row: &PgRow) -> Result<LoanRecord> {
    let renewal_count_i16: i16 = row.try_get("renewal_count")?;
    let renewal_count = u8::try_from(renewal_count_i16)
        .ok()
        .and_then(|count| RenewalCount::try_from(count).ok())
        .ok_or_else(|| {
            invalid_data(format!("renewal_count out of range: {}", renewal_count_i16))
        })?;

    let status_str: &str = row.try_get("status")?;
    let status = LoanStatus::from_str(status_str).map_err(invalid_data)?;

    let version_i32: i32 = row.try_get("version")?;
    let version = u32::try_from(version_i32)
        .map_err(|_| invalid_data(format!("version out of range: {}", version_i32)))?;

    Ok(LoanRecord {
        loan_id: LoanId::from_uuid(row.try_get("loan_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        member_id: MemberId::from_uuid(row.try_get("member_id")?),
        loaned_at: row.try_get("loaned_at")?,
        due_date: row.try_get("due_date")?,
        returned_at: row.try_get("returned_at")?,
        last_renewed_at: row.try_get("last_renewed_at")?,
        renewal_count,
        status,
        fine_amount: money_column(row, "fine_amount")?,
        fine_paid: row.try_get("fine_paid")?,
        fine_paid_at: row.try_get("fine_paid_at")?,
        notes: row.try_get("notes")?,
        processed_by: StaffId::from_uuid(row.try_get("processed_by")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version,
    })
}

/// Append `WHERE` conditions for a LoanFilter
pub(super) fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &LoanFilter) {
    builder.push(" WHERE TRUE");

    if let Some(member_id) = filter.member_id {
        builder.push(" AND member_id = ").push_bind(member_id.value());
    }
    if let Some(book_id) = filter.book_id {
        builder.push(" AND book_id = ").push_bind(book_id.value());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.loaned_from {
        builder.push(" AND loaned_at >= ").push_bind(from);
    }
    if let Some(to) = filter.loaned_to {
        builder.push(" AND loaned_at <= ").push_bind(to);
    }
    if let Some(fine_paid) = filter.fine_paid {
        builder.push(" AND fine_paid = ").push_bind(fine_paid);
    }
}

/// Translate a write failure into the save contract
fn map_write_error(err: sqlx::Error, loan: &LoanRecord) -> SaveError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return if db_err.constraint() == Some(OPEN_PAIR_CONSTRAINT) {
            SaveError::DuplicateOpenLoan {
                member_id: loan.member_id,
                book_id: loan.book_id,
            }
        } else {
            // loan_id primary key: another writer created the same loan first
            SaveError::VersionConflict {
                loan_id: loan.loan_id,
                expected_version: loan.version,
            }
        };
    }
    SaveError::Storage(Box::new(err))
}

fn storage_error(err: impl Into<BoxError>) -> SaveError {
    SaveError::Storage(err.into())
}

/// PostgreSQL implementation of LoanRepository
///
/// Loan records live in the `loans` table; every save also appends its
/// domain events to `loan_events` within the same transaction.
pub struct LoanRepository {
    pool: PgPool,
}

impl LoanRepository {
    /// Create a new LoanRepository with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        loan: &LoanRecord,
    ) -> std::result::Result<u32, SaveError> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                loan_id,
                book_id,
                member_id,
                loaned_at,
                due_date,
                returned_at,
                last_renewed_at,
                renewal_count,
                status,
                fine_amount,
                fine_paid,
                fine_paid_at,
                notes,
                processed_by,
                created_at,
                updated_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 1)
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.book_id.value())
        .bind(loan.member_id.value())
        .bind(loan.loaned_at)
        .bind(loan.due_date)
        .bind(loan.returned_at)
        .bind(loan.last_renewed_at)
        .bind(loan.renewal_count.value() as i16)
        .bind(loan.status.as_str())
        .bind(loan.fine_amount.amount())
        .bind(loan.fine_paid)
        .bind(loan.fine_paid_at)
        .bind(loan.notes.as_deref())
        .bind(loan.processed_by.value())
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, loan))?;

        Ok(1)
    }

    /// Compare-and-set update on `version`
    async fn update(
        tx: &mut Transaction<'_, Postgres>,
        loan: &LoanRecord,
    ) -> std::result::Result<u32, SaveError> {
        let new_version = loan.version + 1;

        let result = sqlx::query(
            r#"
            UPDATE loans SET
                due_date = $2,
                returned_at = $3,
                last_renewed_at = $4,
                renewal_count = $5,
                status = $6,
                fine_amount = $7,
                fine_paid = $8,
                fine_paid_at = $9,
                notes = $10,
                processed_by = $11,
                updated_at = $12,
                version = $13
            WHERE loan_id = $1 AND version = $14
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.due_date)
        .bind(loan.returned_at)
        .bind(loan.last_renewed_at)
        .bind(loan.renewal_count.value() as i16)
        .bind(loan.status.as_str())
        .bind(loan.fine_amount.amount())
        .bind(loan.fine_paid)
        .bind(loan.fine_paid_at)
        .bind(loan.notes.as_deref())
        .bind(loan.processed_by.value())
        .bind(loan.updated_at)
        .bind(new_version as i32)
        .bind(loan.version as i32)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, loan))?;

        if result.rows_affected() == 0 {
            return Err(SaveError::VersionConflict {
                loan_id: loan.loan_id,
                expected_version: loan.version,
            });
        }

        Ok(new_version)
    }

    /// Append events to the audit trail
    ///
    /// Uses batch INSERT with UNNEST. All events of one save share the
    /// record version they produced.
    async fn append_events(
        tx: &mut Transaction<'_, Postgres>,
        loan_id: LoanId,
        loan_version: u32,
        events: &[DomainEvent],
    ) -> std::result::Result<(), SaveError> {
        if events.is_empty() {
            return Ok(());
        }

        let versions = vec![loan_version as i32; events.len()];
        let mut event_types = Vec::with_capacity(events.len());
        let mut event_data_list = Vec::with_capacity(events.len());
        let mut occurred_at_list = Vec::with_capacity(events.len());

        for event in events {
            event_types.push(event.event_type());
            event_data_list.push(serde_json::to_value(event).map_err(storage_error)?);
            occurred_at_list.push(event.occurred_at());
        }

        sqlx::query(
            r#"
            INSERT INTO loan_events (
                loan_id,
                loan_version,
                event_type,
                event_data,
                occurred_at
            )
            SELECT $1, * FROM UNNEST($2::int4[], $3::varchar[], $4::jsonb[], $5::timestamptz[])
            "#,
        )
        .bind(loan_id.value())
        .bind(&versions)
        .bind(&event_types)
        .bind(&event_data_list)
        .bind(&occurred_at_list)
        .execute(&mut **tx)
        .await
        .map_err(storage_error)?;

        Ok(())
    }
}

#[async_trait]
impl LoanRepositoryTrait for LoanRepository {
    async fn load(&self, loan_id: LoanId) -> Result<Option<LoanRecord>> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1");
        let row = sqlx::query(&sql)
            .bind(loan_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn save(
        &self,
        loan: &LoanRecord,
        events: &[DomainEvent],
    ) -> std::result::Result<u32, SaveError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let new_version = if loan.version == 0 {
            Self::insert(&mut tx, loan).await?
        } else {
            Self::update(&mut tx, loan).await?
        };

        Self::append_events(&mut tx, loan.loan_id, new_version, events).await?;

        tx.commit().await.map_err(storage_error)?;

        tracing::debug!(
            loan_id = %loan.loan_id,
            version = new_version,
            events = events.len(),
            "Loan saved"
        );
        Ok(new_version)
    }

    async fn find_open_loan(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Option<LoanRecord>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loans \
             WHERE member_id = $1 AND book_id = $2 AND status IN ('active', 'overdue')"
        );
        let row = sqlx::query(&sql)
            .bind(member_id.value())
            .bind(book_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn has_overdue_loans(&self, member_id: MemberId, now: DateTime<Utc>) -> Result<bool> {
        let has_overdue: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM loans
                WHERE member_id = $1
                  AND (status = 'overdue' OR (status = 'active' AND due_date < $2))
            )
            "#,
        )
        .bind(member_id.value())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(has_overdue)
    }

    async fn find(
        &self,
        filter: &LoanFilter,
        pagination: Option<Pagination>,
    ) -> Result<Page<LoanRecord>> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM loans");
        push_filter(&mut count_query, filter);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select_query =
            QueryBuilder::<Postgres>::new(format!("SELECT {LOAN_COLUMNS} FROM loans"));
        push_filter(&mut select_query, filter);
        select_query.push(" ORDER BY loaned_at DESC, loan_id");
        if let Some(page) = pagination {
            select_query
                .push(" LIMIT ")
                .push_bind(i64::from(page.limit))
                .push(" OFFSET ")
                .push_bind(i64::from(page.offset));
        }

        let rows = select_query.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_row_to_loan).collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<LoanRecord>> {
        let sql = format!(
            "SELECT {LOAN_COLUMNS} FROM loans \
             WHERE status = 'active' AND due_date < $1 \
             ORDER BY due_date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    async fn load_events(&self, loan_id: LoanId) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_data
            FROM loan_events
            WHERE loan_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(loan_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: serde_json::Value = row.try_get("event_data")?;
            let event: DomainEvent = serde_json::from_value(event_data)?;
            events.push(event);
        }

        Ok(events)
    }
}
