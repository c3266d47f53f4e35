use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use promo_admin_core::{
    Partner, PartnerPromoCodeLimit, Repository, SetPartnerPromoCodeLimitRequest,
};

use crate::problem::{ApiJson, ApiPath, ProblemResponse};
use crate::router::AppState;
use crate::telemetry::record_api_result;

const RESOURCE: &str = "partners";

/// Counts a failed request under the label matching its status class.
fn failed(problem: ProblemResponse) -> ProblemResponse {
    record_api_result(RESOURCE, problem.result_label());
    problem
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerResponse {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub number_issued_promo_codes: u32,
    pub partner_limits: Vec<PartnerPromoCodeLimitResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPromoCodeLimitResponse {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub limit: i64,
    pub create_date: DateTime<Utc>,
    pub cancel_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<&PartnerPromoCodeLimit> for PartnerPromoCodeLimitResponse {
    fn from(limit: &PartnerPromoCodeLimit) -> Self {
        Self {
            id: limit.id,
            partner_id: limit.partner_id,
            limit: limit.limit,
            create_date: limit.created_at,
            cancel_date: limit.cancelled_at,
            end_date: limit.end_date,
        }
    }
}

impl From<Partner> for PartnerResponse {
    fn from(partner: Partner) -> Self {
        Self {
            id: partner.id,
            is_active: partner.is_active,
            number_issued_promo_codes: partner.number_issued_promo_codes,
            partner_limits: partner
                .limits
                .iter()
                .map(PartnerPromoCodeLimitResponse::from)
                .collect(),
            name: partner.name,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartnerResponse>>, ProblemResponse> {
    let partners = state.partners().get_all().await?;
    record_api_result(RESOURCE, "ok");
    Ok(Json(partners.into_iter().map(PartnerResponse::from).collect()))
}

pub async fn get_limit(
    State(state): State<AppState>,
    ApiPath((id, limit_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<PartnerPromoCodeLimitResponse>, ProblemResponse> {
    let partner = state.partners().get_by_id(id).await?.ok_or_else(|| {
        record_api_result(RESOURCE, "not_found");
        ProblemResponse::not_found(format!("partner {id} not found"))
    })?;
    let limit = partner.find_limit(limit_id).ok_or_else(|| {
        record_api_result(RESOURCE, "not_found");
        ProblemResponse::not_found(format!("limit {limit_id} not found for partner {id}"))
    })?;

    record_api_result(RESOURCE, "ok");
    Ok(Json(limit.into()))
}

/// Opens a new limit period and answers with the partner's updated limits.
pub async fn set_limit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<SetPartnerPromoCodeLimitRequest>,
) -> Result<Response, ProblemResponse> {
    let outcome = state
        .limits()
        .set_limit(id, &request)
        .await
        .map_err(|err| failed(err.into()))?;

    record_api_result(RESOURCE, "limit_set");
    let location = format!("/api/v1/partners/{id}/limits/{}", outcome.limit.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(PartnerResponse::from(outcome.partner)),
    )
        .into_response())
}

pub async fn cancel_limit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ProblemResponse> {
    state
        .limits()
        .cancel_limit(id)
        .await
        .map_err(|err| failed(err.into()))?;

    record_api_result(RESOURCE, "limit_cancelled");
    Ok(StatusCode::NO_CONTENT)
}
