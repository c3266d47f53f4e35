mod employees;
mod memory;
mod partners;
mod roles;
pub mod seed;

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use promo_admin_core::{EmployeeRepository, Partner, Repository, RepositoryError, Role};

pub use employees::SqliteEmployeeRepository;
pub use memory::InMemoryRepository;
pub use partners::SqlitePartnerRepository;
pub use roles::SqliteRoleRepository;

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Inserts the fixture roles, employees and partners.
    ///
    /// Rows that already exist are left alone so the call is safe on every start.
    pub async fn seed_defaults(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        for role in seed::roles() {
            roles::insert_or_ignore(&mut tx, &role).await?;
        }
        for employee in seed::employees() {
            employees::insert_or_ignore(&mut tx, &employee).await?;
        }
        for partner in seed::partners() {
            partners::insert_or_ignore(&mut tx, &partner).await?;
        }

        tx.commit().await?;
        info!(stage = "storage", "seed data applied");
        Ok(())
    }

    /// Returns a handle for the employee table and its role assignments.
    pub fn employees(&self) -> SqliteEmployeeRepository {
        SqliteEmployeeRepository::new(self.pool.clone())
    }

    /// Returns a handle for the role table.
    pub fn roles(&self) -> SqliteRoleRepository {
        SqliteRoleRepository::new(self.pool.clone())
    }

    /// Returns a handle for partners and their promo-code limits.
    pub fn partners(&self) -> SqlitePartnerRepository {
        SqlitePartnerRepository::new(self.pool.clone())
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// Repository handles the HTTP layer depends on, independent of the backend.
#[derive(Clone)]
pub struct Repositories {
    pub employees: Arc<dyn EmployeeRepository>,
    pub roles: Arc<dyn Repository<Role>>,
    pub partners: Arc<dyn Repository<Partner>>,
}

impl Repositories {
    /// Repositories backed by the SQLite database.
    pub fn sqlite(database: &Database) -> Self {
        Self {
            employees: Arc::new(database.employees()),
            roles: Arc::new(database.roles()),
            partners: Arc::new(database.partners()),
        }
    }

    /// Process-local repositories, optionally prefilled with the fixture data.
    pub fn in_memory(seeded: bool) -> Self {
        if seeded {
            Self {
                employees: Arc::new(InMemoryRepository::with_data(seed::employees())),
                roles: Arc::new(InMemoryRepository::with_data(seed::roles())),
                partners: Arc::new(InMemoryRepository::with_data(seed::partners())),
            }
        } else {
            Self {
                employees: Arc::new(InMemoryRepository::new()),
                roles: Arc::new(InMemoryRepository::new()),
                partners: Arc::new(InMemoryRepository::new()),
            }
        }
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("failed to decode column {column}: {reason}")]
    Decode {
        column: &'static str,
        reason: String,
    },
    #[error("limit {limit_id} belongs to a partner other than {partner_id}")]
    ForeignLimit { limit_id: Uuid, partner_id: Uuid },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ForeignLimit { .. } => RepositoryError::Conflict {
                kind: "partner promo-code limit",
                field: "id",
            },
            other => RepositoryError::backend(other),
        }
    }
}

/// SQLite extended result code for a violated UNIQUE constraint.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_uuid(column: &'static str, raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|err| StorageError::Decode {
        column,
        reason: err.to_string(),
    })
}

fn parse_timestamp(column: &'static str, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| StorageError::Decode {
            column,
            reason: err.to_string(),
        })
}

fn parse_optional_timestamp(
    column: &'static str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    raw.map(|value| parse_timestamp(column, &value)).transpose()
}
