use crate::domain::{
    events::DomainEvent,
    loan::LoanRecord,
    value_objects::{BookId, LoanId, LoanStatus, MemberId, Money},
};
use crate::ports::{
    LoanFilter, LoanReports, LoanRepository, LoanSummary, MemberLoanStats, MonthlyLoanStats, Page,
    Pagination, Result, SaveError,
};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    loans: HashMap<LoanId, LoanRecord>,
    events: Vec<DomainEvent>,
}

/// In-memory implementation of LoanRepository and LoanReports
///
/// Used by the `memory` storage backend and by the integration tests.
/// Enforces the same save contract as the PostgreSQL adapter: version
/// compare-and-set and at most one open loan per (member, book) pair.
#[derive(Default)]
pub struct InMemoryLoanStore {
    state: RwLock<State>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn has_other_open_loan(state: &State, loan: &LoanRecord) -> bool {
    state.loans.values().any(|other| {
        other.loan_id != loan.loan_id
            && other.member_id == loan.member_id
            && other.book_id == loan.book_id
            && other.status.is_open()
    })
}

fn summarize<'a>(loans: impl IntoIterator<Item = &'a LoanRecord>) -> LoanSummary {
    let mut summary = LoanSummary::default();

    for loan in loans {
        summary.total += 1;
        match loan.status {
            LoanStatus::Active => summary.active += 1,
            LoanStatus::Overdue => summary.overdue += 1,
            LoanStatus::Returned => summary.returned += 1,
            LoanStatus::Lost => summary.lost += 1,
        }
        summary.total_fine_amount = summary.total_fine_amount + loan.fine_amount;
        if loan.fine_paid {
            summary.paid_fine_amount = summary.paid_fine_amount + loan.fine_amount;
        } else {
            summary.unpaid_fine_amount = summary.unpaid_fine_amount + loan.fine_amount;
        }
    }

    summary
}

#[async_trait]
impl LoanRepository for InMemoryLoanStore {
    async fn load(&self, loan_id: LoanId) -> Result<Option<LoanRecord>> {
        Ok(self.state.read().await.loans.get(&loan_id).cloned())
    }

    async fn save(
        &self,
        loan: &LoanRecord,
        events: &[DomainEvent],
    ) -> std::result::Result<u32, SaveError> {
        let mut state = self.state.write().await;

        let stored_version = state.loans.get(&loan.loan_id).map(|stored| stored.version);
        if stored_version.unwrap_or(0) != loan.version {
            return Err(SaveError::VersionConflict {
                loan_id: loan.loan_id,
                expected_version: loan.version,
            });
        }

        if loan.status.is_open() && has_other_open_loan(&state, loan) {
            return Err(SaveError::DuplicateOpenLoan {
                member_id: loan.member_id,
                book_id: loan.book_id,
            });
        }

        let new_version = loan.version + 1;
        let mut stored = loan.clone();
        stored.version = new_version;
        state.loans.insert(loan.loan_id, stored);
        state.events.extend_from_slice(events);

        Ok(new_version)
    }

    async fn find_open_loan(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Option<LoanRecord>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .values()
            .find(|loan| {
                loan.member_id == member_id && loan.book_id == book_id && loan.status.is_open()
            })
            .cloned())
    }

    async fn has_overdue_loans(&self, member_id: MemberId, now: DateTime<Utc>) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.loans.values().any(|loan| {
            loan.member_id == member_id
                && (loan.status == LoanStatus::Overdue
                    || (loan.status == LoanStatus::Active && loan.due_date < now))
        }))
    }

    async fn find(
        &self,
        filter: &LoanFilter,
        pagination: Option<Pagination>,
    ) -> Result<Page<LoanRecord>> {
        let state = self.state.read().await;

        let mut loans: Vec<LoanRecord> = state
            .loans
            .values()
            .filter(|loan| filter.matches(loan))
            .cloned()
            .collect();
        loans.sort_by(|a, b| {
            b.loaned_at
                .cmp(&a.loaned_at)
                .then_with(|| a.loan_id.value().cmp(&b.loan_id.value()))
        });

        let total = loans.len() as u64;
        let items = match pagination {
            Some(page) => loans
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect(),
            None => loans,
        };

        Ok(Page { items, total })
    }

    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<LoanRecord>> {
        let state = self.state.read().await;

        let mut loans: Vec<LoanRecord> = state
            .loans
            .values()
            .filter(|loan| loan.status == LoanStatus::Active && loan.due_date < cutoff)
            .cloned()
            .collect();
        loans.sort_by_key(|loan| loan.due_date);

        Ok(loans)
    }

    async fn load_events(&self, loan_id: LoanId) -> Result<Vec<DomainEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|event| event.loan_id() == loan_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LoanReports for InMemoryLoanStore {
    async fn summary(&self, filter: &LoanFilter) -> Result<LoanSummary> {
        let state = self.state.read().await;
        Ok(summarize(
            state.loans.values().filter(|loan| filter.matches(loan)),
        ))
    }

    async fn by_member(&self, filter: &LoanFilter) -> Result<Vec<MemberLoanStats>> {
        let state = self.state.read().await;

        let mut groups: HashMap<MemberId, Vec<&LoanRecord>> = HashMap::new();
        for loan in state.loans.values().filter(|loan| filter.matches(loan)) {
            groups.entry(loan.member_id).or_default().push(loan);
        }

        let mut stats: Vec<MemberLoanStats> = groups
            .into_iter()
            .map(|(member_id, loans)| MemberLoanStats {
                member_id,
                summary: summarize(loans),
            })
            .collect();
        stats.sort_by(|a, b| {
            b.summary
                .total
                .cmp(&a.summary.total)
                .then_with(|| a.member_id.value().cmp(&b.member_id.value()))
        });

        Ok(stats)
    }

    async fn monthly(&self, year: i32) -> Result<Vec<MonthlyLoanStats>> {
        let state = self.state.read().await;

        let mut months: BTreeMap<u32, (u64, Money)> = BTreeMap::new();
        for loan in state.loans.values().filter(|loan| loan.loaned_at.year() == year) {
            let entry = months
                .entry(loan.loaned_at.month())
                .or_insert((0, Money::zero()));
            entry.0 += 1;
            entry.1 = entry.1 + loan.fine_amount;
        }

        Ok(months
            .into_iter()
            .map(|(month, (loans, total_fine_amount))| MonthlyLoanStats {
                month,
                loans,
                total_fine_amount,
            })
            .collect())
    }
}
