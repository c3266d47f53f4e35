use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use promo_admin_core::{
    LimitError, Partner, PartnerPromoCodeLimit, Repository, RepositoryError,
    SetPartnerPromoCodeLimitRequest,
};

use crate::problem::ProblemResponse;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Applies limit changes to partners: fetch, mutate, persist.
#[derive(Clone)]
pub struct PartnerLimitExecutor {
    partners: Arc<dyn Repository<Partner>>,
    clock: Clock,
}

/// Partner state after a new limit has been established.
#[derive(Debug, Clone)]
pub struct LimitOutcome {
    pub partner: Partner,
    pub limit: PartnerPromoCodeLimit,
}

impl PartnerLimitExecutor {
    pub fn new(partners: Arc<dyn Repository<Partner>>, clock: Clock) -> Self {
        Self { partners, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Replaces the partner's active limit with the requested one.
    pub async fn set_limit(
        &self,
        partner_id: Uuid,
        request: &SetPartnerPromoCodeLimitRequest,
    ) -> Result<LimitOutcome, PartnerLimitError> {
        let result = self.apply_set_limit(partner_id, request).await;
        record("set", &result);
        result
    }

    /// Cancels the partner's active limit without opening a new period.
    pub async fn cancel_limit(
        &self,
        partner_id: Uuid,
    ) -> Result<Option<PartnerPromoCodeLimit>, PartnerLimitError> {
        let result = self.apply_cancel_limit(partner_id).await;
        record("cancel", &result);
        result
    }

    async fn apply_set_limit(
        &self,
        partner_id: Uuid,
        request: &SetPartnerPromoCodeLimitRequest,
    ) -> Result<LimitOutcome, PartnerLimitError> {
        let mut partner = self.load(partner_id).await?;
        let limit = partner.set_promo_code_limit(request, self.now())?;
        let partner = self.store(partner).await?;

        info!(
            stage = "limits",
            %partner_id,
            limit_id = %limit.id,
            limit = limit.limit,
            "partner promo-code limit set"
        );
        Ok(LimitOutcome { partner, limit })
    }

    async fn apply_cancel_limit(
        &self,
        partner_id: Uuid,
    ) -> Result<Option<PartnerPromoCodeLimit>, PartnerLimitError> {
        let mut partner = self.load(partner_id).await?;
        let Some(cancelled) = partner.cancel_active_limit(self.now())? else {
            return Ok(None);
        };
        self.store(partner).await?;

        info!(stage = "limits", %partner_id, limit_id = %cancelled.id, "partner promo-code limit cancelled");
        Ok(Some(cancelled))
    }

    async fn load(&self, partner_id: Uuid) -> Result<Partner, PartnerLimitError> {
        self.partners
            .get_by_id(partner_id)
            .await?
            .ok_or(PartnerLimitError::PartnerNotFound(partner_id))
    }

    async fn store(&self, partner: Partner) -> Result<Partner, PartnerLimitError> {
        let partner_id = partner.id;
        self.partners
            .update(partner_id, partner)
            .await?
            .ok_or(PartnerLimitError::PartnerNotFound(partner_id))
    }
}

fn record<T>(operation: &'static str, result: &Result<T, PartnerLimitError>) {
    let label = match result {
        Ok(_) => "applied",
        Err(err) => {
            if let PartnerLimitError::Rejected(reason) = err {
                warn!(stage = "limits", operation, %reason, "limit change rejected");
            }
            err.metric_label()
        }
    };
    counter!("partner_limit_changes_total", "operation" => operation, "result" => label)
        .increment(1);
}

/// Failures of the partner limit workflow.
#[derive(Debug, Error)]
pub enum PartnerLimitError {
    #[error("partner {0} not found")]
    PartnerNotFound(Uuid),
    #[error(transparent)]
    Rejected(#[from] LimitError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PartnerLimitError {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::PartnerNotFound(_) => "not_found",
            Self::Rejected(LimitError::PartnerInactive) => "partner_inactive",
            Self::Rejected(LimitError::NonPositiveLimit(_)) => "invalid_limit",
            Self::Repository(_) => "storage_error",
        }
    }
}

impl From<PartnerLimitError> for ProblemResponse {
    fn from(err: PartnerLimitError) -> Self {
        match err {
            PartnerLimitError::PartnerNotFound(_) => ProblemResponse::not_found(err.to_string()),
            PartnerLimitError::Rejected(LimitError::PartnerInactive) => {
                ProblemResponse::bad_request("partner_inactive", "partner is not active")
            }
            PartnerLimitError::Rejected(reason @ LimitError::NonPositiveLimit(_)) => {
                ProblemResponse::bad_request("invalid_limit", reason.to_string())
            }
            PartnerLimitError::Repository(inner) => inner.into(),
        }
    }
}
