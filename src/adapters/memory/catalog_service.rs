use crate::domain::value_objects::BookId;
use crate::ports::{BookStatus, CatalogItem, CatalogService, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of CatalogService
///
/// Each counter update runs under a single write lock, which gives the same
/// atomicity as the conditional UPDATE of the PostgreSQL adapter.
#[derive(Default)]
pub struct InMemoryCatalogService {
    books: RwLock<HashMap<BookId, CatalogItem>>,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a book with all copies available
    pub async fn add_book(&self, book_id: BookId, title: &str, copies: u32) {
        let item = CatalogItem {
            book_id,
            title: title.to_string(),
            total_copies: copies,
            available_copies: copies,
            status: if copies > 0 {
                BookStatus::Available
            } else {
                BookStatus::Borrowed
            },
        };
        self.books.write().await.insert(book_id, item);
    }

    /// Override the status of a registered book (e.g. withdraw it for maintenance)
    pub async fn set_status(&self, book_id: BookId, status: BookStatus) {
        if let Some(item) = self.books.write().await.get_mut(&book_id) {
            item.status = status;
        }
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn find_book(&self, book_id: BookId) -> Result<Option<CatalogItem>> {
        Ok(self.books.read().await.get(&book_id).cloned())
    }

    async fn decrement_available(&self, book_id: BookId) -> Result<Option<u32>> {
        let mut books = self.books.write().await;
        let Some(item) = books.get_mut(&book_id) else {
            return Ok(None);
        };
        if item.available_copies == 0 {
            return Ok(None);
        }

        item.available_copies -= 1;
        if item.available_copies == 0 && item.status == BookStatus::Available {
            item.status = BookStatus::Borrowed;
        }
        Ok(Some(item.available_copies))
    }

    async fn increment_available(&self, book_id: BookId) -> Result<()> {
        let mut books = self.books.write().await;
        let item = books
            .get_mut(&book_id)
            .ok_or_else(|| format!("Book {} not found in catalog", book_id))?;

        item.available_copies += 1;
        if item.status == BookStatus::Borrowed {
            item.status = BookStatus::Available;
        }
        Ok(())
    }

    async fn mark_lost(&self, book_id: BookId, remove_copy: bool) -> Result<()> {
        let mut books = self.books.write().await;
        let item = books
            .get_mut(&book_id)
            .ok_or_else(|| format!("Book {} not found in catalog", book_id))?;

        item.status = BookStatus::Lost;
        if remove_copy {
            item.available_copies = item.available_copies.saturating_sub(1);
        }
        Ok(())
    }
}
