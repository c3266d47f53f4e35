use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Partner, PartnerPromoCodeLimit, SetPartnerPromoCodeLimitRequest};

/// Business-rule violations raised while changing a partner's limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("partner is not active")]
    PartnerInactive,
    #[error("limit must be greater than zero (got {0})")]
    NonPositiveLimit(i64),
}

impl Partner {
    /// Returns the most recently created limit that has not been cancelled.
    pub fn active_limit(&self) -> Option<&PartnerPromoCodeLimit> {
        self.limits.iter().rev().find(|limit| limit.is_active())
    }

    pub fn find_limit(&self, limit_id: Uuid) -> Option<&PartnerPromoCodeLimit> {
        self.limits.iter().find(|limit| limit.id == limit_id)
    }

    /// Starts a new limit period.
    ///
    /// Cancels the current active limit (if any) at `now`, appends the new
    /// limit and resets the issued-code counter. Validation happens before any
    /// mutation, so a rejected request leaves the partner untouched.
    pub fn set_promo_code_limit(
        &mut self,
        request: &SetPartnerPromoCodeLimitRequest,
        now: DateTime<Utc>,
    ) -> Result<PartnerPromoCodeLimit, LimitError> {
        if !self.is_active {
            return Err(LimitError::PartnerInactive);
        }
        if request.limit <= 0 {
            return Err(LimitError::NonPositiveLimit(request.limit));
        }

        self.cancel_latest_active(now);

        let limit = PartnerPromoCodeLimit {
            id: Uuid::new_v4(),
            partner_id: self.id,
            limit: request.limit,
            created_at: now,
            cancelled_at: None,
            end_date: request.end_date,
        };
        self.limits.push(limit.clone());
        self.number_issued_promo_codes = 0;

        Ok(limit)
    }

    /// Cancels the active limit without replacing it.
    ///
    /// Returns the cancelled limit, or `None` when nothing was active.
    pub fn cancel_active_limit(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<PartnerPromoCodeLimit>, LimitError> {
        if !self.is_active {
            return Err(LimitError::PartnerInactive);
        }
        Ok(self.cancel_latest_active(now))
    }

    fn cancel_latest_active(&mut self, now: DateTime<Utc>) -> Option<PartnerPromoCodeLimit> {
        let active = self
            .limits
            .iter_mut()
            .rev()
            .find(|limit| limit.is_active())?;
        active.cancelled_at = Some(now);
        Some(active.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn partner(is_active: bool, limits: &[(i64, bool)], issued: u32) -> Partner {
        let id = Uuid::new_v4();
        let base = Utc::now() - Duration::days(30);
        Partner {
            id,
            name: "Super Toys".to_string(),
            is_active,
            number_issued_promo_codes: issued,
            limits: limits
                .iter()
                .enumerate()
                .map(|(idx, (value, cancelled))| PartnerPromoCodeLimit {
                    id: Uuid::new_v4(),
                    partner_id: id,
                    limit: *value,
                    created_at: base + Duration::days(idx as i64),
                    cancelled_at: cancelled.then_some(base + Duration::days(idx as i64 + 1)),
                    end_date: None,
                })
                .collect(),
        }
    }

    fn request(limit: i64) -> SetPartnerPromoCodeLimitRequest {
        SetPartnerPromoCodeLimitRequest {
            limit,
            end_date: None,
        }
    }

    #[test]
    fn replaces_active_limit_and_resets_counter() {
        let mut partner = partner(true, &[(10, false)], 5);
        let now = Utc::now();

        let created = partner
            .set_promo_code_limit(&request(20), now)
            .expect("limit should be set");

        assert_eq!(partner.limits.len(), 2);
        assert_eq!(partner.limits[0].cancelled_at, Some(now));
        assert_eq!(partner.limits[1], created);
        assert_eq!(created.limit, 20);
        assert!(created.is_active());
        assert_eq!(created.partner_id, partner.id);
        assert_eq!(created.created_at, now);
        assert_eq!(partner.number_issued_promo_codes, 0);
    }

    #[test]
    fn first_limit_resets_counter_without_cancelling() {
        let mut partner = partner(true, &[(3, true)], 7);
        let cancelled_before = partner.limits[0].cancelled_at;

        partner
            .set_promo_code_limit(&request(4), Utc::now())
            .expect("limit should be set");

        assert_eq!(partner.limits.len(), 2);
        assert_eq!(partner.limits[0].cancelled_at, cancelled_before);
        assert_eq!(partner.number_issued_promo_codes, 0);
    }

    #[test]
    fn cancels_only_the_most_recent_active_limit() {
        let mut partner = partner(true, &[(1, false), (2, false)], 0);
        let now = Utc::now();

        partner
            .set_promo_code_limit(&request(3), now)
            .expect("limit should be set");

        assert!(partner.limits[0].is_active());
        assert_eq!(partner.limits[1].cancelled_at, Some(now));
        assert!(partner.limits[2].is_active());
    }

    #[test]
    fn keeps_requested_end_date() {
        let mut partner = partner(true, &[], 0);
        let end = Utc::now() + Duration::days(90);

        let created = partner
            .set_promo_code_limit(
                &SetPartnerPromoCodeLimitRequest {
                    limit: 50,
                    end_date: Some(end),
                },
                Utc::now(),
            )
            .expect("limit should be set");

        assert_eq!(created.end_date, Some(end));
    }

    #[test]
    fn inactive_partner_is_rejected_before_limit_check() {
        let mut partner = partner(false, &[(10, false)], 5);
        let before = partner.clone();

        for value in [-1, 0, 10] {
            let err = partner
                .set_promo_code_limit(&request(value), Utc::now())
                .expect_err("inactive partner must be rejected");
            assert_eq!(err, LimitError::PartnerInactive);
        }
        assert_eq!(partner, before);
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        let mut partner = partner(true, &[(10, false)], 5);
        let before = partner.clone();

        for value in [0, -5] {
            let err = partner
                .set_promo_code_limit(&request(value), Utc::now())
                .expect_err("non-positive limit must be rejected");
            assert_eq!(err, LimitError::NonPositiveLimit(value));
        }
        assert_eq!(partner, before);
    }

    #[test]
    fn cancel_active_limit_without_replacement() {
        let mut partner = partner(true, &[(10, false)], 5);
        let now = Utc::now();

        let cancelled = partner
            .cancel_active_limit(now)
            .expect("cancel should succeed")
            .expect("a limit was active");

        assert_eq!(cancelled.cancelled_at, Some(now));
        assert!(partner.active_limit().is_none());
        assert_eq!(partner.number_issued_promo_codes, 5);

        let nothing = partner.cancel_active_limit(now).expect("cancel should succeed");
        assert!(nothing.is_none());
    }

    #[test]
    fn cancel_rejects_inactive_partner() {
        let mut partner = partner(false, &[(10, false)], 0);
        let err = partner
            .cancel_active_limit(Utc::now())
            .expect_err("inactive partner must be rejected");
        assert_eq!(err, LimitError::PartnerInactive);
        assert!(partner.limits[0].is_active());
    }

    #[test]
    fn find_limit_by_id() {
        let partner = partner(true, &[(10, true), (20, false)], 0);
        let wanted = partner.limits[1].id;
        assert_eq!(partner.find_limit(wanted).map(|l| l.limit), Some(20));
        assert!(partner.find_limit(Uuid::new_v4()).is_none());
        assert_eq!(partner.active_limit().map(|l| l.limit), Some(20));
    }
}
