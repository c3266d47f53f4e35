use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::Entity;

/// Role that can be assigned to employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl Entity for Role {
    const KIND: &'static str = "role";

    fn id(&self) -> Uuid {
        self.id
    }

    fn with_id(self, id: Uuid) -> Self {
        Self { id, ..self }
    }
}

/// Employee managed through the administrative API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    pub applied_promocodes_count: u32,
}

impl Employee {
    /// Builds an employee without roles; the identifier is assigned on create.
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            roles: Vec::new(),
            applied_promocodes_count: 0,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Employee {
    const KIND: &'static str = "employee";
    const UNIQUE_FIELD: &'static str = "email";

    fn id(&self) -> Uuid {
        self.id
    }

    fn with_id(self, id: Uuid) -> Self {
        Self { id, ..self }
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.email)
    }
}

/// Business partner allowed to issue promo codes under a limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub number_issued_promo_codes: u32,
    /// Limits in creation order. At most one of them is active.
    pub limits: Vec<PartnerPromoCodeLimit>,
}

impl Entity for Partner {
    const KIND: &'static str = "partner";

    fn id(&self) -> Uuid {
        self.id
    }

    fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        for limit in &mut self.limits {
            limit.partner_id = id;
        }
        self
    }

    fn with_fresh_ids(mut self) -> Self {
        for limit in &mut self.limits {
            limit.id = Uuid::new_v4();
        }
        self.with_id(Uuid::new_v4())
    }
}

/// Promo-code issuance cap for a partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerPromoCodeLimit {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub limit: i64,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl PartnerPromoCodeLimit {
    /// A limit is active until it has been cancelled.
    pub fn is_active(&self) -> bool {
        self.cancelled_at.is_none()
    }
}

/// Payload used to establish a new promo-code limit for a partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPartnerPromoCodeLimitRequest {
    pub limit: i64,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_first_and_last() {
        let employee = Employee::new("ivan@example.com", "Ivan", "Sergeev");
        assert_eq!(employee.full_name(), "Ivan Sergeev");
    }

    #[test]
    fn partner_with_id_repoints_limits() {
        let old_id = Uuid::new_v4();
        let partner = Partner {
            id: old_id,
            name: "Toys".to_string(),
            is_active: true,
            number_issued_promo_codes: 0,
            limits: vec![PartnerPromoCodeLimit {
                id: Uuid::new_v4(),
                partner_id: old_id,
                limit: 10,
                created_at: Utc::now(),
                cancelled_at: None,
                end_date: None,
            }],
        };

        let new_id = Uuid::new_v4();
        let partner = partner.with_id(new_id);
        assert_eq!(partner.id, new_id);
        assert!(partner.limits.iter().all(|limit| limit.partner_id == new_id));
    }

    #[test]
    fn partner_fresh_ids_rekey_partner_and_limits() {
        let template = Partner {
            id: Uuid::new_v4(),
            name: "Toys".to_string(),
            is_active: true,
            number_issued_promo_codes: 0,
            limits: vec![PartnerPromoCodeLimit {
                id: Uuid::new_v4(),
                partner_id: Uuid::nil(),
                limit: 10,
                created_at: Utc::now(),
                cancelled_at: None,
                end_date: None,
            }],
        };

        let fresh = template.clone().with_fresh_ids();
        assert_ne!(fresh.id, template.id);
        assert_ne!(fresh.limits[0].id, template.limits[0].id);
        assert_eq!(fresh.limits[0].partner_id, fresh.id);
        assert_eq!(fresh.limits[0].limit, 10);
    }

    #[test]
    fn limit_request_accepts_missing_end_date() {
        let request: SetPartnerPromoCodeLimitRequest =
            serde_json::from_str(r#"{"limit": 20}"#).expect("request should parse");
        assert_eq!(request.limit, 20);
        assert!(request.end_date.is_none());

        let request: SetPartnerPromoCodeLimitRequest =
            serde_json::from_str(r#"{"limit": 5, "endDate": "2025-01-01T00:00:00Z"}"#)
                .expect("request with end date should parse");
        assert_eq!(
            request.end_date.map(|value| value.to_rfc3339()),
            Some("2025-01-01T00:00:00+00:00".to_string())
        );
    }
}
