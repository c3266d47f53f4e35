use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::Employee;

/// Record with a stable identifier that repositories can store.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Name used in logs and error messages.
    const KIND: &'static str;
    /// Name of the field backing [`Entity::unique_key`].
    const UNIQUE_FIELD: &'static str = "key";

    fn id(&self) -> Uuid;

    /// Returns the entity re-keyed under `id`.
    fn with_id(self, id: Uuid) -> Self;

    /// Returns the entity under a newly generated identifier, as stored by `create`.
    ///
    /// Entities owning child records also re-key those children.
    fn with_fresh_ids(self) -> Self {
        self.with_id(Uuid::new_v4())
    }

    /// Value that must be unique across all stored entities of this kind.
    fn unique_key(&self) -> Option<&str> {
        None
    }
}

/// Generic CRUD contract shared by the SQLite and in-memory stores.
///
/// Lookups that miss return `Ok(None)` so callers can decide whether absence
/// is an error for their use case.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_all(&self) -> Result<Vec<T>, RepositoryError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, RepositoryError>;

    /// Persists `entity` under a freshly generated identifier.
    async fn create(&self, entity: T) -> Result<T, RepositoryError>;

    /// Replaces the entity stored under `id`, keeping that identifier.
    async fn update(&self, id: Uuid, entity: T) -> Result<Option<T>, RepositoryError>;

    /// Removes the entity stored under `id` and returns it.
    async fn delete(&self, id: Uuid) -> Result<Option<T>, RepositoryError>;
}

/// Employee lookups beyond plain CRUD.
#[async_trait]
pub trait EmployeeRepository: Repository<Employee> {
    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError>;
}

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{kind} with the same {field} already exists")]
    Conflict {
        kind: &'static str,
        field: &'static str,
    },
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    pub fn conflict<T: Entity>() -> Self {
        Self::Conflict {
            kind: T::KIND,
            field: T::UNIQUE_FIELD,
        }
    }

    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
