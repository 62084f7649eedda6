use crate::models::{ClickEvent, Link, NewLink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::DatabaseErrorKind;
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryDb;
pub use postgres::PostgresDb;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    General(String),
    #[error("Duplicate Id Error")]
    DuplicateId,
    #[error("Link not found")]
    NotFound,
}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                DbError::DuplicateId
            }
            _ => DbError::General(e.to_string()),
        }
    }
}

impl From<deadpool::managed::PoolError<diesel_async::pooled_connection::PoolError>> for DbError {
    fn from(e: deadpool::managed::PoolError<diesel_async::pooled_connection::PoolError>) -> Self {
        DbError::General(e.to_string())
    }
}

/// Narrow persistence interface of the link engine.
///
/// Every method is a single atomic operation on the backing store; callers
/// compose them without holding locks of their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinksDB: Send + Sync {
    /// Inserts a new record. Fails with [`DbError::DuplicateId`] if the code is
    /// taken by a live record or has been retired.
    async fn create(&self, link: &NewLink) -> Result<Link, DbError>;
    async fn get(&self, code: &str) -> Result<Option<Link>, DbError>;
    /// Atomically bumps the click counter and sets the last-click time,
    /// optionally appending to the click-event log in the same step.
    async fn record_click(
        &self,
        code: &str,
        at: DateTime<Utc>,
        log_event: bool,
    ) -> Result<(), DbError>;
    /// Removes the record only if it is owned by `owner_id`, returning the
    /// number of removed rows. With `retire` the code is never handed out again.
    async fn delete_if_owner(
        &self,
        code: &str,
        owner_id: &str,
        retire: bool,
    ) -> Result<usize, DbError>;
    /// Newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Link>, DbError>;
    /// Newest first, at most `limit` entries.
    async fn recent_clicks(&self, code: &str, limit: i64) -> Result<Vec<ClickEvent>, DbError>;
}
