use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use promo_admin_core::{Repository, Role};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::telemetry::record_api_result;

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoleResponse>>, ProblemResponse> {
    let roles = state.roles().get_all().await?;
    record_api_result("roles", "ok");
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}
