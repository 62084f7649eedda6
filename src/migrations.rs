use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/// Brings the links schema up to date before the pool is built.
pub fn run_migrations(url: &str) -> Result<(), anyhow::Error> {
    let mut db = PgConnection::establish(url)?;
    let applied = db
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    for version in &applied {
        info!(%version, "applied migration");
    }

    info!("ran migrations: {}", applied.len());

    Ok(())
}
