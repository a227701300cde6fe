//! Embedded database migration management.
//!
//! Migrations ship inside the binary via `embed_migrations!` and run through
//! the blocking diesel harness on a pooled connection moved into a blocking
//! task. The [`PgClientExt`] trait exposes this on [`PgClient`] without
//! widening the core client surface.

use std::time::{Duration, Instant};

use diesel::migration::{Migration, MigrationSource};
use diesel::pg::Pg;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::MigrationHarness;
use tokio::task::spawn_blocking;

use crate::{MIGRATIONS, PgClient, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Versions applied during this run, in application order.
    pub applied: Vec<String>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl MigrationResult {
    /// Returns whether this run had any migrations to apply.
    pub fn applied_any(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Applied/pending breakdown of the embedded migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Versions already recorded in the database.
    pub applied: Vec<String>,
    /// Embedded versions not yet applied.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Returns whether the database schema is up to date.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Runs all pending embedded migrations on the database.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn run_pending_migrations(pg: &PgClient) -> PgResult<MigrationResult> {
    tracing::info!(target: TRACING_TARGET_MIGRATION, "Starting database migration process");

    let start_time = Instant::now();
    let conn = pg.get_pooled_connection().await?;
    let mut conn: AsyncConnectionWrapper<_> = conn.into();

    let results = spawn_blocking(move || {
        let applied = conn.run_pending_migrations(MIGRATIONS).map(|versions| {
            versions
                .into_iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
        });
        drop(conn);
        applied
    })
    .await;

    let duration = start_time.elapsed();
    let applied = results
        .map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET_MIGRATION,
                duration = ?duration,
                error = %err,
                "Migration task panicked, join error occurred"
            );
            PgError::Migration(err.into())
        })?
        .map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET_MIGRATION,
                duration = ?duration,
                error = &err,
                "Database migration process failed"
            );
            PgError::Migration(err)
        })?;

    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?duration,
        migrations_count = applied.len(),
        "Database migration process completed successfully"
    );

    Ok(MigrationResult { applied, duration })
}

/// Gets the applied/pending breakdown of the embedded migrations.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn get_migration_status(pg: &PgClient) -> PgResult<MigrationStatus> {
    let conn = pg.get_pooled_connection().await?;
    let mut conn: AsyncConnectionWrapper<_> = conn.into();

    let applied = spawn_blocking(move || {
        let applied = conn.applied_migrations().map(|versions| {
            versions
                .into_iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
        });
        drop(conn);
        applied
    })
    .await
    .map_err(|err| PgError::Migration(err.into()))?
    .map_err(PgError::Migration)?;

    let pending = MigrationSource::<Pg>::migrations(&MIGRATIONS)
        .map_err(PgError::Migration)?
        .iter()
        .map(|m| m.name().version().to_string())
        .filter(|version| !applied.contains(version))
        .collect();

    Ok(MigrationStatus { applied, pending })
}

/// Extension trait providing migration functionality for [`PgClient`].
pub trait PgClientExt {
    /// Runs all pending database migrations.
    ///
    /// Applies any unapplied embedded migrations to bring the schema up to
    /// date. Safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails to apply or if there are
    /// connectivity issues with the database.
    fn run_pending_migrations(&self) -> impl Future<Output = PgResult<MigrationResult>>;

    /// Gets the current migration status of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if there are connectivity issues or if the migration
    /// table cannot be accessed.
    fn migration_status(&self) -> impl Future<Output = PgResult<MigrationStatus>>;
}

impl PgClientExt for PgClient {
    async fn run_pending_migrations(&self) -> PgResult<MigrationResult> {
        run_pending_migrations(self).await
    }

    async fn migration_status(&self) -> PgResult<MigrationStatus> {
        get_migration_status(self).await
    }
}
