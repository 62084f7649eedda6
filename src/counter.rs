use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::db::{DbError, LinksDB};

/// Records one click per successful resolution.
///
/// Every call goes straight to the store as a single atomic update; nothing is
/// buffered in process, so concurrent resolutions of the same code are never lost.
#[derive(Clone)]
pub struct ClickAccountant {
    db: Arc<dyn LinksDB>,
    log_events: bool,
}

impl ClickAccountant {
    pub fn new(db: Arc<dyn LinksDB>, log_events: bool) -> Self {
        Self { db, log_events }
    }

    pub async fn record(&self, code: &str) -> Result<(), DbError> {
        self.db.record_click(code, Utc::now(), self.log_events).await?;

        debug!(code, "click recorded");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDb, MockLinksDB};
    use crate::models::NewLink;
    use mockall::predicate::{always, eq};

    #[tokio::test]
    async fn test_record_passes_event_flag() {
        let mut db = MockLinksDB::new();
        db.expect_record_click()
            .with(eq("abc"), always(), eq(false))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let accountant = ClickAccountant::new(Arc::new(db), false);

        accountant.record("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_records_are_all_counted() {
        let db = Arc::new(MemoryDb::new());
        db.create(&NewLink {
            code: String::from("k"),
            target_url: String::from("example.com"),
            owner_id: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let accountant = ClickAccountant::new(db.clone(), true);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let accountant = accountant.clone();
                tokio::spawn(async move { accountant.record("k").await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(db.get("k").await.unwrap().unwrap().click_count, 50);
        assert_eq!(db.recent_clicks("k", 100).await.unwrap().len(), 50);
    }
}
