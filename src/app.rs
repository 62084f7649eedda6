use crate::{
    auth::Identity,
    codegen::{CodeGenerator, RandomSource},
    counter::ClickAccountant,
    db::{DbError, LinksDB},
    error::LinkError,
    models::NewLink,
};
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use tinylink_rs::{CreateLinkRequest, CreatedLinkResponse, LinkInfo, LinkStatsResponse};
use tracing::{error, info, instrument, warn};

/// Clicks reported by the stats lookup.
const RECENT_CLICKS_LIMIT: i64 = 50;

/// Engine tunables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base address short URLs are built from.
    pub prefix: String,
    pub code_length: usize,
    pub max_attempts: u32,
    /// Whether links may be created without an identity.
    pub allow_anonymous: bool,
    /// Whether a deleted code returns to the pool of allocatable codes.
    pub reuse_deleted_codes: bool,
    pub record_click_events: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefix: String::from("http://localhost:8080"),
            code_length: crate::codegen::DEFAULT_CODE_LENGTH,
            max_attempts: 10,
            allow_anonymous: false,
            reuse_deleted_codes: true,
            record_click_events: true,
        }
    }
}

/// Trims the stored target, defaults the scheme to https and checks that the
/// result is an absolute URL with a host.
///
/// The returned string is used verbatim as the `Location` header, so control
/// characters the URL parser would strip or escape make the target unusable.
fn normalize_target(stored: &str) -> Option<String> {
    let trimmed = stored.trim();

    if trimmed.chars().any(char::is_control) {
        return None;
    }

    let has_scheme = ["http://", "https://"].iter().any(|scheme| {
        trimmed
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });

    let target = if has_scheme {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&target).ok()?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return None;
    }

    Some(target)
}

#[derive(Clone)]
pub struct App {
    db: Arc<dyn LinksDB>,
    clicks: ClickAccountant,
    generator: CodeGenerator,
    random: Arc<dyn RandomSource>,
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig, db: Arc<dyn LinksDB>, random: Arc<dyn RandomSource>) -> Arc<Self> {
        Arc::new(Self {
            clicks: ClickAccountant::new(Arc::clone(&db), config.record_click_events),
            generator: CodeGenerator::new(config.code_length),
            db,
            random,
            config,
        })
    }

    #[cfg(test)]
    fn with_generator(mut self: Arc<Self>, generator: CodeGenerator) -> Arc<Self> {
        Arc::make_mut(&mut self).generator = generator;
        self
    }

    /// Allocates a fresh code for `payload.url` owned by `owner`.
    #[instrument(skip(self, owner), fields(owner = owner.map(|o| o.id.as_str())), err)]
    pub async fn create_link(
        &self,
        owner: Option<&Identity>,
        payload: CreateLinkRequest,
    ) -> Result<CreatedLinkResponse, LinkError> {
        if owner.is_none() && !self.config.allow_anonymous {
            return Err(LinkError::Unauthorized);
        }

        let Some(url) = payload.url.as_deref().filter(|url| !url.trim().is_empty()) else {
            return Err(LinkError::Validation(String::from("URL is required")));
        };

        for attempt in 1..=self.config.max_attempts {
            let code = self.generator.generate(self.random.as_ref());

            let new_link = NewLink {
                code,
                target_url: url.to_string(),
                owner_id: owner.map(|o| o.id.clone()),
                created_at: Utc::now(),
            };

            match self.db.create(&new_link).await {
                Ok(link) => {
                    info!(code = link.code, attempt, "link created");

                    return Ok(CreatedLinkResponse::new(
                        &self.config.prefix,
                        LinkInfo::from(link),
                    ));
                }
                Err(DbError::DuplicateId) => {
                    warn!(code = new_link.code, attempt, "code collision");
                }
                Err(e) => {
                    error!("db error: {e}");
                    return Err(e.into());
                }
            }
        }

        error!(
            attempts = self.config.max_attempts,
            space = self.generator.space_size(),
            "code space exhausted"
        );

        Err(LinkError::AllocationExhausted {
            attempts: self.config.max_attempts,
        })
    }

    /// Resolves `code` to its redirect target and counts the click.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn redirect(&self, code: &str) -> Result<String, LinkError> {
        let Some(link) = self.db.get(code).await? else {
            return Err(LinkError::NotFound);
        };

        let Some(target) = normalize_target(&link.target_url) else {
            warn!(code, "stored target is not a usable url");
            return Err(LinkError::NotFound);
        };

        match self.clicks.record(code).await {
            Ok(()) => {}
            // deleted between lookup and accounting
            Err(DbError::NotFound) => return Err(LinkError::NotFound),
            Err(e) => return Err(e.into()),
        }

        info!(code, "redirect");

        Ok(target)
    }

    /// All links owned by the caller, newest first.
    #[instrument(skip(self, owner), err)]
    pub async fn list_links(&self, owner: Option<&Identity>) -> Result<Vec<LinkInfo>, LinkError> {
        let owner = owner.ok_or(LinkError::Unauthorized)?;

        let links = self.db.list_by_owner(&owner.id).await?;

        Ok(links.into_iter().map(LinkInfo::from).collect())
    }

    /// Click statistics of a link, visible to its owner only.
    #[instrument(skip(self, caller), err)]
    pub async fn link_stats(
        &self,
        code: &str,
        caller: Option<&Identity>,
    ) -> Result<LinkStatsResponse, LinkError> {
        let caller = caller.ok_or(LinkError::Unauthorized)?;

        let Some(link) = self.db.get(code).await? else {
            return Err(LinkError::NotFound);
        };

        if link.owner_id.as_deref() != Some(caller.id.as_str()) {
            return Err(LinkError::Forbidden);
        }

        let recent_clicks = self
            .db
            .recent_clicks(code, RECENT_CLICKS_LIMIT)
            .await?
            .into_iter()
            .map(|event| event.clicked_at)
            .collect();

        Ok(LinkStatsResponse {
            link: link.into(),
            recent_clicks,
        })
    }

    /// Deletes `code` if `caller` owns it.
    #[instrument(skip(self, caller), fields(caller = caller.map(|c| c.id.as_str())), err)]
    pub async fn delete_link(&self, code: &str, caller: Option<&Identity>) -> Result<(), LinkError> {
        let caller = caller.ok_or(LinkError::Unauthorized)?;

        let Some(link) = self.db.get(code).await? else {
            return Err(LinkError::NotFound);
        };

        if link.owner_id.as_deref() != Some(caller.id.as_str()) {
            warn!(code, "delete by non-owner");
            return Err(LinkError::Forbidden);
        }

        let deleted = self
            .db
            .delete_if_owner(code, &caller.id, !self.config.reuse_deleted_codes)
            .await?;

        if deleted == 0 {
            // a concurrent delete by the owner won the race
            info!(code, "link already deleted");
        } else {
            info!(code, "link deleted");
        }

        Ok(())
    }
}
