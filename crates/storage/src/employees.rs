use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use promo_admin_core::{
    Employee, EmployeeRepository, Entity, Repository, RepositoryError, Role,
};

use crate::{is_unique_violation, parse_uuid, roles::role_from_row, StorageError};

const EMPLOYEE_COLUMNS: &str =
    "id, email, first_name, last_name, applied_promocodes_count";

/// Repository for employees and their role assignments.
#[derive(Clone)]
pub struct SqliteEmployeeRepository {
    pool: SqlitePool,
}

impl SqliteEmployeeRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Loads role assignments, optionally restricted to a single employee.
    async fn load_roles(
        &self,
        employee_id: Option<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<Role>>, StorageError> {
        let mut sql = String::from(
            "SELECT er.employee_id, r.id, r.name, r.description \
               FROM employee_roles AS er \
               JOIN roles AS r ON r.id = er.role_id",
        );
        if employee_id.is_some() {
            sql.push_str(" WHERE er.employee_id = ?");
        }
        sql.push_str(" ORDER BY r.name");

        let mut query = sqlx::query(&sql);
        if let Some(id) = employee_id {
            query = query.bind(id.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut roles: HashMap<Uuid, Vec<Role>> = HashMap::new();
        for row in &rows {
            let owner: String = row.try_get("employee_id")?;
            let owner = parse_uuid("employee_roles.employee_id", &owner)?;
            roles.entry(owner).or_default().push(role_from_row(row)?);
        }
        Ok(roles)
    }

    async fn fetch_one(&self, sql: &str, value: String) -> Result<Option<Employee>, StorageError> {
        let row = sqlx::query(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut employee = employee_from_row(&row)?;
        employee.roles = self
            .load_roles(Some(employee.id))
            .await?
            .remove(&employee.id)
            .unwrap_or_default();
        Ok(Some(employee))
    }
}

fn employee_from_row(row: &SqliteRow) -> Result<Employee, StorageError> {
    let id: String = row.try_get("id")?;
    let applied: i64 = row.try_get("applied_promocodes_count")?;
    Ok(Employee {
        id: parse_uuid("employees.id", &id)?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        roles: Vec::new(),
        applied_promocodes_count: applied as u32,
    })
}

async fn write_employee(
    tx: &mut Transaction<'_, Sqlite>,
    employee: &Employee,
    or_ignore: bool,
) -> Result<bool, sqlx::Error> {
    let verb = if or_ignore {
        "INSERT OR IGNORE"
    } else {
        "INSERT"
    };
    let result = sqlx::query(&format!(
        "{verb} INTO employees ({EMPLOYEE_COLUMNS}) VALUES (?, ?, ?, ?, ?)"
    ))
    .bind(employee.id.to_string())
    .bind(&employee.email)
    .bind(&employee.first_name)
    .bind(&employee.last_name)
    .bind(employee.applied_promocodes_count as i64)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn write_role_links(
    tx: &mut Transaction<'_, Sqlite>,
    employee: &Employee,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM employee_roles WHERE employee_id = ?")
        .bind(employee.id.to_string())
        .execute(&mut **tx)
        .await?;

    for role in &employee.roles {
        sqlx::query("INSERT INTO employee_roles (employee_id, role_id) VALUES (?, ?)")
            .bind(employee.id.to_string())
            .bind(role.id.to_string())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub(crate) async fn insert_or_ignore(
    tx: &mut Transaction<'_, Sqlite>,
    employee: &Employee,
) -> Result<(), StorageError> {
    if write_employee(tx, employee, true).await? {
        write_role_links(tx, employee).await?;
    }
    Ok(())
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::conflict::<Employee>()
    } else {
        StorageError::from(err).into()
    }
}

#[async_trait]
impl Repository<Employee> for SqliteEmployeeRepository {
    async fn get_all(&self) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY last_name, first_name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        let mut roles = self.load_roles(None).await?;
        let mut employees = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut employee = employee_from_row(row)?;
            employee.roles = roles.remove(&employee.id).unwrap_or_default();
            employees.push(employee);
        }
        Ok(employees)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Employee>, RepositoryError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        Ok(self.fetch_one(&sql, id.to_string()).await?)
    }

    async fn create(&self, employee: Employee) -> Result<Employee, RepositoryError> {
        let employee = employee.with_fresh_ids();
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        write_employee(&mut tx, &employee, false)
            .await
            .map_err(map_write_error)?;
        write_role_links(&mut tx, &employee)
            .await
            .map_err(StorageError::from)?;

        tx.commit().await.map_err(StorageError::from)?;
        Ok(employee)
    }

    async fn update(
        &self,
        id: Uuid,
        employee: Employee,
    ) -> Result<Option<Employee>, RepositoryError> {
        let employee = employee.with_id(id);
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        let result = sqlx::query(
            "UPDATE employees \
                SET email = ?, first_name = ?, last_name = ?, applied_promocodes_count = ? \
              WHERE id = ?",
        )
        .bind(&employee.email)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(employee.applied_promocodes_count as i64)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        write_role_links(&mut tx, &employee)
            .await
            .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(Some(employee))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Employee>, RepositoryError> {
        let Some(employee) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Some(employee))
    }
}

#[async_trait]
impl EmployeeRepository for SqliteEmployeeRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<Employee>, RepositoryError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = ?");
        Ok(self.fetch_one(&sql, email.to_string()).await?)
    }
}
