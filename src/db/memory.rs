use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    db::{DbError, LinksDB},
    models::{ClickEvent, Link, NewLink},
};

#[derive(Debug, Default)]
struct State {
    links: HashMap<String, Link>,
    events: HashMap<String, Vec<ClickEvent>>,
    retired: HashSet<String>,
    next_event_id: i64,
}

/// Process-local store used when no database is configured.
///
/// Each method holds the lock for its whole body, which gives every
/// operation the same atomicity the Postgres backend gets from a transaction.
#[derive(Debug, Default)]
pub struct MemoryDb {
    state: Mutex<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinksDB for MemoryDb {
    async fn create(&self, link: &NewLink) -> Result<Link, DbError> {
        let mut state = self.state.lock().await;

        if state.links.contains_key(&link.code) || state.retired.contains(&link.code) {
            return Err(DbError::DuplicateId);
        }

        let created = Link::from_new(link);
        state.links.insert(link.code.clone(), created.clone());

        Ok(created)
    }

    async fn get(&self, code: &str) -> Result<Option<Link>, DbError> {
        Ok(self.state.lock().await.links.get(code).cloned())
    }

    async fn record_click(
        &self,
        code: &str,
        at: DateTime<Utc>,
        log_event: bool,
    ) -> Result<(), DbError> {
        let mut state = self.state.lock().await;

        let link = state.links.get_mut(code).ok_or(DbError::NotFound)?;
        link.click_count += 1;
        link.last_clicked_at = Some(at);

        if log_event {
            state.next_event_id += 1;
            let id = state.next_event_id;
            state
                .events
                .entry(code.to_string())
                .or_default()
                .push(ClickEvent {
                    id,
                    code: code.to_string(),
                    clicked_at: at,
                });
        }

        Ok(())
    }

    async fn delete_if_owner(
        &self,
        code: &str,
        owner_id: &str,
        retire: bool,
    ) -> Result<usize, DbError> {
        let mut state = self.state.lock().await;

        let owned = state
            .links
            .get(code)
            .is_some_and(|link| link.owner_id.as_deref() == Some(owner_id));

        if !owned {
            return Ok(0);
        }

        state.links.remove(code);
        state.events.remove(code);

        if retire {
            state.retired.insert(code.to_string());
        }

        Ok(1)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Link>, DbError> {
        let state = self.state.lock().await;

        let mut links: Vec<Link> = state
            .links
            .values()
            .filter(|link| link.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();

        links.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.code.cmp(&a.code))
        });

        Ok(links)
    }

    async fn recent_clicks(&self, code: &str, limit: i64) -> Result<Vec<ClickEvent>, DbError> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(state
            .events
            .get(code)
            .map(|events| events.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_link(code: &str, owner: Option<&str>) -> NewLink {
        NewLink {
            code: code.to_string(),
            target_url: String::from("example.com"),
            owner_id: owner.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_taken_code() {
        let db = MemoryDb::new();

        db.create(&new_link("abc", Some("u1"))).await.unwrap();
        let res = db.create(&new_link("abc", Some("u2"))).await;

        assert!(matches!(res, Err(DbError::DuplicateId)));
        assert_eq!(
            db.get("abc").await.unwrap().unwrap().owner_id.as_deref(),
            Some("u1")
        );
    }

    #[tokio::test]
    async fn test_record_click_on_missing_code() {
        let db = MemoryDb::new();

        let res = db.record_click("nope", Utc::now(), true).await;

        assert!(matches!(res, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_clicks_match_event_log() {
        let db = Arc::new(MemoryDb::new());
        db.create(&new_link("hot", Some("u1"))).await.unwrap();

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.record_click("hot", Utc::now(), true).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let link = db.get("hot").await.unwrap().unwrap();
        assert_eq!(link.click_count, 100);
        assert_eq!(db.recent_clicks("hot", 1000).await.unwrap().len(), 100);
        assert_eq!(db.recent_clicks("hot", 5).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_delete_requires_matching_owner() {
        let db = MemoryDb::new();
        db.create(&new_link("mine", Some("u1"))).await.unwrap();
        db.create(&new_link("anon", None)).await.unwrap();

        assert_eq!(db.delete_if_owner("mine", "u2", false).await.unwrap(), 0);
        assert_eq!(db.delete_if_owner("anon", "u1", false).await.unwrap(), 0);
        assert_eq!(db.delete_if_owner("mine", "u1", false).await.unwrap(), 1);
        assert_eq!(db.delete_if_owner("mine", "u1", false).await.unwrap(), 0);

        // returned to the pool
        db.create(&new_link("mine", Some("u3"))).await.unwrap();
    }

    #[tokio::test]
    async fn test_retired_codes_stay_taken() {
        let db = MemoryDb::new();
        db.create(&new_link("old", Some("u1"))).await.unwrap();

        assert_eq!(db.delete_if_owner("old", "u1", true).await.unwrap(), 1);

        let res = db.create(&new_link("old", Some("u1"))).await;
        assert!(matches!(res, Err(DbError::DuplicateId)));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = MemoryDb::new();
        let base = Utc::now();

        for (i, code) in ["a", "b", "c"].into_iter().enumerate() {
            let mut link = new_link(code, Some("u1"));
            link.created_at = base + chrono::Duration::seconds(i as i64);
            db.create(&link).await.unwrap();
        }
        db.create(&new_link("other", Some("u2"))).await.unwrap();

        let codes: Vec<_> = db
            .list_by_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.code)
            .collect();

        assert_eq!(codes, vec!["c", "b", "a"]);
    }
}
