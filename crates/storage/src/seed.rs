//! Fixture data loaded into fresh databases and the in-memory store.

use chrono::{DateTime, TimeZone, Utc};
use uuid::{uuid, Uuid};

use promo_admin_core::{Employee, Partner, PartnerPromoCodeLimit, Role};

pub const ADMIN_ROLE_ID: Uuid = uuid!("53729686-a368-4eeb-8bfa-cc69b6050d02");
pub const PARTNER_MANAGER_ROLE_ID: Uuid = uuid!("b0ae7aac-5493-45cd-ad16-87426a5e7665");

pub const ADMIN_EMPLOYEE_ID: Uuid = uuid!("451533d5-d8d5-4a11-9c7b-eb9f14e1a32f");
pub const MANAGER_EMPLOYEE_ID: Uuid = uuid!("f766e2bf-340a-46ea-bff3-f1700b435895");

pub const SUPER_TOYS_PARTNER_ID: Uuid = uuid!("7d994823-8226-4273-b063-1a95f3cc1df8");
pub const CAT_FOR_EVERYONE_PARTNER_ID: Uuid = uuid!("894b6e9b-eb5f-406c-aefa-8ccb35d39319");
pub const DREAM_FISH_PARTNER_ID: Uuid = uuid!("0da65561-cf56-4942-bff2-22f50cf70d43");
pub const GOOD_TOYS_PARTNER_ID: Uuid = uuid!("20d2d612-db93-4ed5-86b1-ff2413bca655");

pub fn roles() -> Vec<Role> {
    vec![
        Role {
            id: ADMIN_ROLE_ID,
            name: "Admin".to_string(),
            description: "Administrator".to_string(),
        },
        Role {
            id: PARTNER_MANAGER_ROLE_ID,
            name: "PartnerManager".to_string(),
            description: "Partner manager".to_string(),
        },
    ]
}

pub fn employees() -> Vec<Employee> {
    let roles = roles();
    vec![
        Employee {
            id: ADMIN_EMPLOYEE_ID,
            email: "owner@somemail.ru".to_string(),
            first_name: "Ivan".to_string(),
            last_name: "Sergeev".to_string(),
            roles: vec![roles[0].clone()],
            applied_promocodes_count: 5,
        },
        Employee {
            id: MANAGER_EMPLOYEE_ID,
            email: "andreev@somemail.ru".to_string(),
            first_name: "Petr".to_string(),
            last_name: "Andreev".to_string(),
            roles: vec![roles[1].clone()],
            applied_promocodes_count: 10,
        },
    ]
}

pub fn partners() -> Vec<Partner> {
    vec![
        partner(
            SUPER_TOYS_PARTNER_ID,
            "Super Toys",
            true,
            uuid!("e00633a5-978a-420e-a7d6-3e1dab116393"),
            100,
        ),
        partner(
            CAT_FOR_EVERYONE_PARTNER_ID,
            "A Cat for Everyone",
            true,
            uuid!("c9bef066-3c5a-4e5d-9cff-bd54479f075e"),
            1000,
        ),
        partner(
            DREAM_FISH_PARTNER_ID,
            "Fish of Your Dreams",
            true,
            uuid!("0e94624b-1ff9-430e-ba8d-ef1e3b77f2d5"),
            10000,
        ),
        partner(
            GOOD_TOYS_PARTNER_ID,
            "Good Toys",
            false,
            uuid!("93f3a79d-e9f9-47e6-98bb-1f618db43230"),
            100,
        ),
    ]
}

fn partner(id: Uuid, name: &str, is_active: bool, limit_id: Uuid, limit: i64) -> Partner {
    Partner {
        id,
        name: name.to_string(),
        is_active,
        number_issued_promo_codes: 0,
        limits: vec![PartnerPromoCodeLimit {
            id: limit_id,
            partner_id: id,
            limit,
            created_at: seeded_at(2020, 7, 9),
            cancelled_at: None,
            end_date: Some(seeded_at(2020, 10, 9)),
        }],
    }
}

fn seeded_at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
