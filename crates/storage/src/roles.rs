use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use promo_admin_core::{Entity, Repository, RepositoryError, Role};

use crate::{parse_uuid, StorageError};

/// Repository for the `roles` table.
#[derive(Clone)]
pub struct SqliteRoleRepository {
    pool: SqlitePool,
}

impl SqliteRoleRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn role_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Role, StorageError> {
    let id: String = row.try_get("id")?;
    Ok(Role {
        id: parse_uuid("roles.id", &id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

pub(crate) async fn insert_or_ignore(
    tx: &mut Transaction<'_, Sqlite>,
    role: &Role,
) -> Result<(), StorageError> {
    sqlx::query("INSERT OR IGNORE INTO roles (id, name, description) VALUES (?, ?, ?)")
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(&role.description)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl Repository<Role> for SqliteRoleRepository {
    async fn get_all(&self) -> Result<Vec<Role>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let roles = rows
            .iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(roles)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.as_ref().map(role_from_row).transpose()?)
    }

    async fn create(&self, role: Role) -> Result<Role, RepositoryError> {
        let role = role.with_fresh_ids();
        sqlx::query("INSERT INTO roles (id, name, description) VALUES (?, ?, ?)")
            .bind(role.id.to_string())
            .bind(&role.name)
            .bind(&role.description)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(role)
    }

    async fn update(&self, id: Uuid, role: Role) -> Result<Option<Role>, RepositoryError> {
        let result = sqlx::query("UPDATE roles SET name = ?, description = ? WHERE id = ?")
            .bind(&role.name)
            .bind(&role.description)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Role { id, ..role }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        let Some(role) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Some(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    fn role(name: &str) -> Role {
        Role {
            id: Uuid::nil(),
            name: name.to_string(),
            description: format!("{name} role"),
        }
    }

    #[tokio::test]
    async fn create_and_list_roles() {
        let db = setup_db().await;
        let repo = db.roles();

        let created = repo.create(role("Auditor")).await.expect("create");
        assert!(!created.id.is_nil());

        let roles = repo.get_all().await.expect("list");
        assert_eq!(roles, vec![created]);
    }

    #[tokio::test]
    async fn update_and_delete_roles() {
        let db = setup_db().await;
        let repo = db.roles();
        let created = repo.create(role("Auditor")).await.expect("create");

        let updated = repo
            .update(created.id, role("Reviewer"))
            .await
            .expect("update")
            .expect("role exists");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Reviewer");

        let deleted = repo
            .delete(created.id)
            .await
            .expect("delete")
            .expect("role existed");
        assert_eq!(deleted.name, "Reviewer");
        assert!(repo.get_by_id(created.id).await.expect("lookup").is_none());
        assert!(repo
            .update(created.id, role("Ghost"))
            .await
            .expect("update")
            .is_none());
    }
}
