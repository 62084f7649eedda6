use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tinylink_rs::LinkInfo;

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewLink {
    pub code: String,
    pub target_url: String,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Clone, PartialEq, Eq, Debug)]
#[diesel(table_name = crate::schema::links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Link {
    pub code: String,
    pub target_url: String,
    pub owner_id: Option<String>,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Link {
    /// The state of a freshly allocated record.
    pub fn from_new(link: &NewLink) -> Self {
        Self {
            code: link.code.clone(),
            target_url: link.target_url.clone(),
            owner_id: link.owner_id.clone(),
            click_count: 0,
            last_clicked_at: None,
            created_at: link.created_at,
        }
    }
}

impl From<Link> for LinkInfo {
    fn from(link: Link) -> Self {
        Self {
            code: link.code,
            target_url: link.target_url,
            owner_id: link.owner_id,
            click_count: link.click_count,
            last_clicked_at: link.last_clicked_at,
            created_at: link.created_at,
        }
    }
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::click_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewClickEvent {
    pub code: String,
    pub clicked_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Clone, PartialEq, Eq, Debug)]
#[diesel(table_name = crate::schema::click_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClickEvent {
    pub id: i64,
    pub code: String,
    pub clicked_at: DateTime<Utc>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::retired_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RetiredCode {
    pub code: String,
    pub retired_at: DateTime<Utc>,
}
