use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;

use crate::{
    db::{DbError, LinksDB},
    db_pool::DbPool,
    models::{ClickEvent, Link, NewClickEvent, NewLink, RetiredCode},
    schema,
};

#[derive(Clone)]
pub struct PostgresDb {
    db: DbPool,
}

impl PostgresDb {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LinksDB for PostgresDb {
    async fn create(&self, link: &NewLink) -> Result<Link, DbError> {
        use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, dsl::exists, select};
        use diesel_async::RunQueryDsl;

        let mut conn = self.db.0.get().await?;

        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let retired: bool = select(exists(
                    schema::retired_codes::table
                        .filter(schema::retired_codes::code.eq(&link.code)),
                ))
                .get_result(conn)
                .await?;

                if retired {
                    return Err(DbError::DuplicateId);
                }

                Ok(diesel::insert_into(schema::links::table)
                    .values(link)
                    .returning(Link::as_returning())
                    .get_result(conn)
                    .await?)
            }
            .scope_boxed()
        })
        .await
    }

    async fn get(&self, code: &str) -> Result<Option<Link>, DbError> {
        use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
        use diesel_async::RunQueryDsl;

        Ok(schema::links::table
            .filter(schema::links::code.eq(code))
            .select(Link::as_select())
            .first(&mut self.db.0.get().await?)
            .await
            .optional()?)
    }

    async fn record_click(
        &self,
        code: &str,
        at: DateTime<Utc>,
        log_event: bool,
    ) -> Result<(), DbError> {
        use diesel::{ExpressionMethods, QueryDsl};
        use diesel_async::RunQueryDsl;

        let mut conn = self.db.0.get().await?;

        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let affected = diesel::update(
                    schema::links::table.filter(schema::links::code.eq(code)),
                )
                .set((
                    schema::links::click_count.eq(schema::links::click_count + 1_i64),
                    schema::links::last_clicked_at.eq(Some(at)),
                ))
                .execute(conn)
                .await?;

                if affected == 0 {
                    return Err(DbError::NotFound);
                }

                if log_event {
                    diesel::insert_into(schema::click_events::table)
                        .values(&NewClickEvent {
                            code: code.to_string(),
                            clicked_at: at,
                        })
                        .execute(conn)
                        .await?;
                }

                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn delete_if_owner(
        &self,
        code: &str,
        owner_id: &str,
        retire: bool,
    ) -> Result<usize, DbError> {
        use diesel::{ExpressionMethods, QueryDsl};
        use diesel_async::RunQueryDsl;

        let mut conn = self.db.0.get().await?;

        conn.transaction::<_, DbError, _>(|conn| {
            async move {
                let affected = diesel::delete(
                    schema::links::table
                        .filter(schema::links::code.eq(code))
                        .filter(schema::links::owner_id.eq(owner_id)),
                )
                .execute(conn)
                .await?;

                if affected > 0 && retire {
                    diesel::insert_into(schema::retired_codes::table)
                        .values(&RetiredCode {
                            code: code.to_string(),
                            retired_at: Utc::now(),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;
                }

                Ok(affected)
            }
            .scope_boxed()
        })
        .await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Link>, DbError> {
        use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
        use diesel_async::RunQueryDsl;

        Ok(schema::links::table
            .filter(schema::links::owner_id.eq(owner_id))
            .order((
                schema::links::created_at.desc(),
                schema::links::code.desc(),
            ))
            .select(Link::as_select())
            .load(&mut self.db.0.get().await?)
            .await?)
    }

    async fn recent_clicks(&self, code: &str, limit: i64) -> Result<Vec<ClickEvent>, DbError> {
        use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
        use diesel_async::RunQueryDsl;

        Ok(schema::click_events::table
            .filter(schema::click_events::code.eq(code))
            .order((
                schema::click_events::clicked_at.desc(),
                schema::click_events::id.desc(),
            ))
            .limit(limit)
            .select(ClickEvent::as_select())
            .load(&mut self.db.0.get().await?)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db_pool::init_crypto_provider, migrations::run_migrations};
    use testcontainers::{ContainerAsync, runners::AsyncRunner};
    use testcontainers_modules::postgres::Postgres;

    async fn get_postgres_testcontainer() -> (ContainerAsync<Postgres>, String) {
        let c = Postgres::default().start().await.unwrap();

        let host_port = c.get_host_port_ipv4(5432).await.unwrap();
        let host = c.get_host().await.unwrap();

        let db_url = format!("postgres://postgres:postgres@{host}:{host_port}/postgres",);

        (c, db_url)
    }

    async fn setup() -> (ContainerAsync<Postgres>, PostgresDb) {
        init_crypto_provider();

        let (container, dburl) = get_postgres_testcontainer().await;

        run_migrations(&dburl).unwrap();

        let pool = DbPool::build(&dburl, 4).await.unwrap();

        (container, PostgresDb::new(pool))
    }

    fn new_link(code: &str, owner: &str) -> NewLink {
        NewLink {
            code: code.to_string(),
            target_url: String::from("example.com/x"),
            owner_id: Some(owner.to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_duplicate_code_is_reported() {
        let (_container, db) = setup().await;

        let created = db.create(&new_link("abc123", "u1")).await.unwrap();
        assert_eq!(created.click_count, 0);
        assert_eq!(created.last_clicked_at, None);

        let res = db.create(&new_link("abc123", "u2")).await;
        assert!(matches!(res, Err(DbError::DuplicateId)));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_concurrent_clicks_are_not_lost() {
        let (_container, db) = setup().await;
        let db = std::sync::Arc::new(db);

        db.create(&new_link("hot", "u1")).await.unwrap();

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.record_click("hot", Utc::now(), true).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let link = db.get("hot").await.unwrap().unwrap();
        assert_eq!(link.click_count, 40);
        assert!(link.last_clicked_at.is_some());
        assert_eq!(db.recent_clicks("hot", 100).await.unwrap().len(), 40);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_conditional_delete_and_retire() {
        let (_container, db) = setup().await;

        db.create(&new_link("gone", "u1")).await.unwrap();
        db.record_click("gone", Utc::now(), true).await.unwrap();

        assert_eq!(db.delete_if_owner("gone", "u2", true).await.unwrap(), 0);
        assert!(db.get("gone").await.unwrap().is_some());

        assert_eq!(db.delete_if_owner("gone", "u1", true).await.unwrap(), 1);
        assert_eq!(db.delete_if_owner("gone", "u1", true).await.unwrap(), 0);
        assert!(db.get("gone").await.unwrap().is_none());
        assert!(matches!(
            db.record_click("gone", Utc::now(), false).await,
            Err(DbError::NotFound)
        ));

        let res = db.create(&new_link("gone", "u1")).await;
        assert!(matches!(res, Err(DbError::DuplicateId)));
    }
}
