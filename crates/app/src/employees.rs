use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use promo_admin_core::{Employee, EmployeeRepository, Repository, Role};

use crate::problem::{ApiJson, ApiPath, ProblemResponse};
use crate::router::AppState;
use crate::telemetry::record_api_result;

const RESOURCE: &str = "employees";

/// Counts a failed request under the label matching its status class.
fn failed(problem: ProblemResponse) -> ProblemResponse {
    record_api_result(RESOURCE, problem.result_label());
    problem
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeShortResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<RoleItemResponse>,
    pub full_name: String,
    pub applied_promocodes_count: u32,
}

#[derive(Debug, Serialize)]
pub struct RoleItemResponse {
    pub name: String,
    pub description: String,
}

/// Body accepted by both create and update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&Employee> for EmployeeShortResponse {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id,
            email: employee.email.clone(),
            full_name: employee.full_name(),
        }
    }
}

impl From<&Role> for RoleItemResponse {
    fn from(role: &Role) -> Self {
        Self {
            name: role.name.clone(),
            description: role.description.clone(),
        }
    }
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            roles: employee.roles.iter().map(RoleItemResponse::from).collect(),
            full_name: employee.full_name(),
            email: employee.email,
            applied_promocodes_count: employee.applied_promocodes_count,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<EmployeeShortResponse>>, ProblemResponse> {
    let employees = state.employees().get_all().await?;
    record_api_result(RESOURCE, "ok");
    Ok(Json(
        employees.iter().map(EmployeeShortResponse::from).collect(),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let employee = state.employees().get_by_id(id).await?.ok_or_else(|| {
        record_api_result(RESOURCE, "not_found");
        ProblemResponse::not_found(format!("employee {id} not found"))
    })?;
    record_api_result(RESOURCE, "ok");
    Ok(Json(employee.into()))
}

pub async fn get_by_email(
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let employee = state
        .employees()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| {
            record_api_result(RESOURCE, "not_found");
            ProblemResponse::not_found(format!("no employee with email {email}"))
        })?;
    record_api_result(RESOURCE, "ok");
    Ok(Json(employee.into()))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmployeeRequest>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let employee = Employee::new(payload.email, payload.first_name, payload.last_name);
    let created = state
        .employees()
        .create(employee)
        .await
        .map_err(|err| failed(err.into()))?;

    info!(stage = "api", employee_id = %created.id, "employee created");
    record_api_result(RESOURCE, "created");
    Ok(Json(created.into()))
}

/// Replaces name and email; roles and the applied-code count are kept.
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<EmployeeRequest>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let repo = state.employees();
    let Some(existing) = repo.get_by_id(id).await? else {
        record_api_result(RESOURCE, "rejected");
        return Err(ProblemResponse::bad_request(
            "unknown_employee",
            format!("employee {id} does not exist"),
        ));
    };

    let replacement = Employee {
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        ..existing
    };
    let updated = repo
        .update(id, replacement)
        .await
        .map_err(|err| failed(err.into()))?
        .ok_or_else(|| {
            record_api_result(RESOURCE, "rejected");
            ProblemResponse::bad_request("unknown_employee", format!("employee {id} does not exist"))
        })?;

    info!(stage = "api", employee_id = %id, "employee updated");
    record_api_result(RESOURCE, "updated");
    Ok(Json(updated.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<EmployeeResponse>, ProblemResponse> {
    let deleted = state.employees().delete(id).await?.ok_or_else(|| {
        record_api_result(RESOURCE, "rejected");
        ProblemResponse::bad_request("unknown_employee", format!("employee {id} does not exist"))
    })?;

    info!(stage = "api", employee_id = %id, "employee deleted");
    record_api_result(RESOURCE, "deleted");
    Ok(Json(deleted.into()))
}
