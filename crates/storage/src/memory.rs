use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use promo_admin_core::{Employee, EmployeeRepository, Entity, Repository, RepositoryError};

/// Process-local repository backed by a lock-guarded map.
///
/// Clones share the same map, so every handle observes writes made through
/// any other handle.
pub struct InMemoryRepository<T> {
    entries: Arc<RwLock<BTreeMap<Uuid, T>>>,
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Builds a repository holding `data` under the identifiers it already carries.
    pub fn with_data(data: impl IntoIterator<Item = T>) -> Self {
        let entries = data
            .into_iter()
            .map(|entity| (entity.id(), entity))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Uuid, T>>, RepositoryError> {
        self.entries
            .read()
            .map_err(|_| RepositoryError::backend(PoisonedStore))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Uuid, T>>, RepositoryError> {
        self.entries
            .write()
            .map_err(|_| RepositoryError::backend(PoisonedStore))
    }
}

fn key_taken<T: Entity>(entries: &BTreeMap<Uuid, T>, candidate: &T, except: Option<Uuid>) -> bool {
    let Some(key) = candidate.unique_key() else {
        return false;
    };
    entries
        .values()
        .filter(|existing| Some(existing.id()) != except)
        .any(|existing| existing.unique_key() == Some(key))
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn get_all(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, RepositoryError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn create(&self, entity: T) -> Result<T, RepositoryError> {
        let mut entries = self.write()?;
        if key_taken(&entries, &entity, None) {
            return Err(RepositoryError::conflict::<T>());
        }

        let entity = entity.with_fresh_ids();
        entries.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: Uuid, entity: T) -> Result<Option<T>, RepositoryError> {
        let mut entries = self.write()?;
        if !entries.contains_key(&id) {
            return Ok(None);
        }
        if key_taken(&entries, &entity, Some(id)) {
            return Err(RepositoryError::conflict::<T>());
        }

        let entity = entity.with_id(id);
        entries.insert(id, entity.clone());
        Ok(Some(entity))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<T>, RepositoryError> {
        Ok(self.write()?.remove(&id))
    }
}

#[async_trait]
impl EmployeeRepository for InMemoryRepository<Employee> {
    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError> {
        Ok(self
            .read()?
            .values()
            .find(|employee| employee.email == email)
            .cloned())
    }
}

#[derive(Debug, Error)]
#[error("in-memory store lock poisoned")]
struct PoisonedStore;

#[cfg(test)]
mod tests {
    use super::*;
    use promo_admin_core::Role;

    fn employee(email: &str) -> Employee {
        Employee::new(email, "Ivan", "Sergeev")
    }

    #[tokio::test]
    async fn create_assigns_identifier_and_persists() {
        let repo = InMemoryRepository::new();

        let created = repo
            .create(employee("ivan@example.com"))
            .await
            .expect("create succeeds");
        assert!(!created.id.is_nil());

        let fetched = repo
            .get_by_id(created.id)
            .await
            .expect("lookup")
            .expect("entity was stored");
        assert_eq!(fetched, created);
        assert_eq!(repo.get_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn create_rekeys_partner_limits() {
        let repo = InMemoryRepository::with_data(crate::seed::partners());
        let template = crate::seed::partners().remove(0);

        let created = repo.create(template.clone()).await.expect("create succeeds");
        assert_ne!(created.id, template.id);
        assert_ne!(created.limits[0].id, template.limits[0].id);
        assert_eq!(created.limits[0].partner_id, created.id);

        let original = repo
            .get_by_id(template.id)
            .await
            .expect("lookup")
            .expect("template partner kept");
        assert_eq!(original, template);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_without_mutation() {
        let repo = InMemoryRepository::new();
        repo.create(employee("ivan@example.com"))
            .await
            .expect("first create");

        let err = repo
            .create(employee("ivan@example.com"))
            .await
            .expect_err("duplicate must fail");
        assert!(err.is_conflict());
        assert_eq!(repo.get_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_entity_and_keeps_id() {
        let repo = InMemoryRepository::new();
        let created = repo
            .create(employee("ivan@example.com"))
            .await
            .expect("create");

        let updated = repo
            .update(created.id, Employee::new("petr@example.com", "Petr", "Andreev"))
            .await
            .expect("update")
            .expect("entity exists");
        assert_eq!(updated.id, created.id);

        let stored = repo
            .get_by_id(created.id)
            .await
            .expect("lookup")
            .expect("entity exists");
        assert_eq!(stored.email, "petr@example.com");
        assert_eq!(repo.get_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn update_allows_keeping_own_email_but_not_anothers() {
        let repo = InMemoryRepository::new();
        let ivan = repo.create(employee("ivan@example.com")).await.expect("ivan");
        repo.create(employee("petr@example.com")).await.expect("petr");

        repo.update(ivan.id, employee("ivan@example.com"))
            .await
            .expect("same email is fine")
            .expect("entity exists");

        let err = repo
            .update(ivan.id, employee("petr@example.com"))
            .await
            .expect_err("taken email must fail");
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn update_and_delete_missing_return_none() {
        let repo: InMemoryRepository<Employee> = InMemoryRepository::new();
        let missing = Uuid::new_v4();

        assert!(repo
            .update(missing, employee("ivan@example.com"))
            .await
            .expect("update")
            .is_none());
        assert!(repo.delete(missing).await.expect("delete").is_none());
        assert!(repo.get_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn delete_removes_and_returns_entity() {
        let repo = InMemoryRepository::new();
        let created = repo
            .create(employee("ivan@example.com"))
            .await
            .expect("create");

        let deleted = repo
            .delete(created.id)
            .await
            .expect("delete")
            .expect("entity existed");
        assert_eq!(deleted.id, created.id);
        assert!(repo.get_by_id(created.id).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn clones_share_the_same_store() {
        let repo = InMemoryRepository::new();
        let handle = repo.clone();
        let role = repo
            .create(Role {
                id: Uuid::nil(),
                name: "Admin".to_string(),
                description: "Administrator".to_string(),
            })
            .await
            .expect("create");

        assert!(handle.get_by_id(role.id).await.expect("lookup").is_some());
    }

    #[tokio::test]
    async fn get_by_email_finds_employee() {
        let repo = InMemoryRepository::with_data(crate::seed::employees());
        let found = repo
            .get_by_email("owner@somemail.ru")
            .await
            .expect("lookup")
            .expect("seeded employee");
        assert_eq!(found.id, crate::seed::ADMIN_EMPLOYEE_ID);
        assert!(repo
            .get_by_email("nobody@example.com")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn concurrent_creates_are_all_kept() {
        let repo = InMemoryRepository::new();
        let mut tasks = Vec::new();
        for idx in 0..16 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.create(employee(&format!("user{idx}@example.com"))).await
            }));
        }
        for task in tasks {
            task.await.expect("join").expect("create");
        }
        assert_eq!(repo.get_all().await.expect("list").len(), 16);
    }
}
