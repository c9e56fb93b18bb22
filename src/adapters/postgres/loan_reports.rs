use crate::domain::value_objects::MemberId;
use crate::ports::{
    LoanFilter, LoanReports as LoanReportsTrait, LoanSummary, MemberLoanStats, MonthlyLoanStats,
    Result,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};

use super::loan_repository::{invalid_data, money_column, push_filter};

const SUMMARY_COLUMNS: &str = r#"
    COUNT(*) AS total,
    COUNT(*) FILTER (WHERE status = 'active') AS active,
    COUNT(*) FILTER (WHERE status = 'overdue') AS overdue,
    COUNT(*) FILTER (WHERE status = 'returned') AS returned,
    COUNT(*) FILTER (WHERE status = 'lost') AS lost,
    COALESCE(SUM(fine_amount), 0) AS total_fine_amount,
    COALESCE(SUM(fine_amount) FILTER (WHERE fine_paid), 0) AS paid_fine_amount,
    COALESCE(SUM(fine_amount) FILTER (WHERE NOT fine_paid), 0) AS unpaid_fine_amount
"#;

fn count_column(row: &PgRow, column: &str) -> Result<u64> {
    let count: i64 = row.try_get(column)?;
    u64::try_from(count).map_err(|_| invalid_data(format!("{} out of range: {}", column, count)))
}

fn map_row_to_summary(row: &PgRow) -> Result<LoanSummary> {
    Ok(LoanSummary {
        total: count_column(row, "total")?,
        active: count_column(row, "active")?,
        overdue: count_column(row, "overdue")?,
        returned: count_column(row, "returned")?,
        lost: count_column(row, "lost")?,
        total_fine_amount: money_column(row, "total_fine_amount")?,
        paid_fine_amount: money_column(row, "paid_fine_amount")?,
        unpaid_fine_amount: money_column(row, "unpaid_fine_amount")?,
    })
}

/// PostgreSQL implementation of LoanReports
///
/// Aggregates are computed by the database over the `loans` table.
pub struct LoanReports {
    pool: PgPool,
}

impl LoanReports {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanReportsTrait for LoanReports {
    async fn summary(&self, filter: &LoanFilter) -> Result<LoanSummary> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {SUMMARY_COLUMNS} FROM loans"));
        push_filter(&mut query, filter);

        let row = query.build().fetch_one(&self.pool).await?;
        map_row_to_summary(&row)
    }

    async fn by_member(&self, filter: &LoanFilter) -> Result<Vec<MemberLoanStats>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT member_id, {SUMMARY_COLUMNS} FROM loans"
        ));
        push_filter(&mut query, filter);
        query.push(" GROUP BY member_id ORDER BY total DESC, member_id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<MemberLoanStats> {
                Ok(MemberLoanStats {
                    member_id: MemberId::from_uuid(row.try_get("member_id")?),
                    summary: map_row_to_summary(row)?,
                })
            })
            .collect()
    }

    async fn monthly(&self, year: i32) -> Result<Vec<MonthlyLoanStats>> {
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| invalid_data(format!("invalid year: {}", year)))?;
        let end = Utc
            .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| invalid_data(format!("invalid year: {}", year)))?;

        let rows = sqlx::query(
            r#"
            SELECT
                EXTRACT(MONTH FROM loaned_at AT TIME ZONE 'UTC')::INT4 AS month,
                COUNT(*) AS loans,
                COALESCE(SUM(fine_amount), 0) AS total_fine_amount
            FROM loans
            WHERE loaned_at >= $1 AND loaned_at < $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<MonthlyLoanStats> {
                let month: i32 = row.try_get("month")?;
                Ok(MonthlyLoanStats {
                    month: u32::try_from(month)
                        .map_err(|_| invalid_data(format!("month out of range: {}", month)))?,
                    loans: count_column(row, "loans")?,
                    total_fine_amount: money_column(row, "total_fine_amount")?,
                })
            })
            .collect()
    }
}
