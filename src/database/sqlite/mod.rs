use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{NewUser, User};
use crate::database::sqlite::queries::UserQueries;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// User account store
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Open the database at `path`, creating its parent directory if needed
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        info!("Opening user database at {}", path.display());
        Self::new(path).await
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // User operations
    #[inline]
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        UserQueries::create(&self.pool, new_user).await
    }

    #[inline]
    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        UserQueries::get_by_id(&self.pool, id).await
    }

    #[inline]
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserQueries::get_by_email(&self.pool, email).await
    }

    #[inline]
    pub async fn mark_user_verified(&self, id: i64) -> Result<Option<User>> {
        UserQueries::mark_verified(&self.pool, id).await
    }
}
