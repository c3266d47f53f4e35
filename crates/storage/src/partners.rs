use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use promo_admin_core::{Entity, Partner, PartnerPromoCodeLimit, Repository, RepositoryError};

use crate::{parse_optional_timestamp, parse_timestamp, parse_uuid, to_rfc3339, StorageError};

const LIMIT_COLUMNS: &str = "id, partner_id, limit_value, created_at, cancelled_at, end_date";

/// Repository for partners together with the promo-code limits they own.
#[derive(Clone)]
pub struct SqlitePartnerRepository {
    pool: SqlitePool,
}

impl SqlitePartnerRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_limits(
        &self,
        partner_id: Option<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<PartnerPromoCodeLimit>>, StorageError> {
        let mut sql = format!("SELECT {LIMIT_COLUMNS} FROM partner_promo_code_limits");
        if partner_id.is_some() {
            sql.push_str(" WHERE partner_id = ?");
        }
        sql.push_str(" ORDER BY created_at, rowid");

        let mut query = sqlx::query(&sql);
        if let Some(id) = partner_id {
            query = query.bind(id.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut limits: HashMap<Uuid, Vec<PartnerPromoCodeLimit>> = HashMap::new();
        for row in &rows {
            let limit = limit_from_row(row)?;
            limits.entry(limit.partner_id).or_default().push(limit);
        }
        Ok(limits)
    }
}

fn partner_from_row(row: &SqliteRow) -> Result<Partner, StorageError> {
    let id: String = row.try_get("id")?;
    let is_active: i64 = row.try_get("is_active")?;
    let issued: i64 = row.try_get("number_issued_promo_codes")?;
    Ok(Partner {
        id: parse_uuid("partners.id", &id)?,
        name: row.try_get("name")?,
        is_active: is_active != 0,
        number_issued_promo_codes: issued as u32,
        limits: Vec::new(),
    })
}

fn limit_from_row(row: &SqliteRow) -> Result<PartnerPromoCodeLimit, StorageError> {
    let id: String = row.try_get("id")?;
    let partner_id: String = row.try_get("partner_id")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(PartnerPromoCodeLimit {
        id: parse_uuid("partner_promo_code_limits.id", &id)?,
        partner_id: parse_uuid("partner_promo_code_limits.partner_id", &partner_id)?,
        limit: row.try_get("limit_value")?,
        created_at: parse_timestamp("partner_promo_code_limits.created_at", &created_at)?,
        cancelled_at: parse_optional_timestamp(
            "partner_promo_code_limits.cancelled_at",
            row.try_get("cancelled_at")?,
        )?,
        end_date: parse_optional_timestamp(
            "partner_promo_code_limits.end_date",
            row.try_get("end_date")?,
        )?,
    })
}

async fn insert_partner_row(
    tx: &mut Transaction<'_, Sqlite>,
    partner: &Partner,
    or_ignore: bool,
) -> Result<bool, sqlx::Error> {
    let verb = if or_ignore {
        "INSERT OR IGNORE"
    } else {
        "INSERT"
    };
    let result = sqlx::query(&format!(
        "{verb} INTO partners (id, name, is_active, number_issued_promo_codes) VALUES (?, ?, ?, ?)"
    ))
    .bind(partner.id.to_string())
    .bind(&partner.name)
    .bind(partner.is_active)
    .bind(partner.number_issued_promo_codes as i64)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Upserts every limit of `partner` and drops stored limits it no longer owns.
///
/// A limit id already stored under another partner is rejected, never rewritten.
async fn sync_limits(
    tx: &mut Transaction<'_, Sqlite>,
    partner: &Partner,
) -> Result<(), StorageError> {
    let stored: Vec<String> =
        sqlx::query_scalar("SELECT id FROM partner_promo_code_limits WHERE partner_id = ?")
            .bind(partner.id.to_string())
            .fetch_all(&mut **tx)
            .await?;

    for stale in stored
        .iter()
        .filter(|id| !partner.limits.iter().any(|limit| limit.id.to_string() == **id))
    {
        sqlx::query("DELETE FROM partner_promo_code_limits WHERE id = ?")
            .bind(stale)
            .execute(&mut **tx)
            .await?;
    }

    for limit in &partner.limits {
        let written = sqlx::query(&format!(
            "INSERT INTO partner_promo_code_limits ({LIMIT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE \
             SET limit_value = excluded.limit_value, \
                 cancelled_at = excluded.cancelled_at, \
                 end_date = excluded.end_date \
             WHERE partner_promo_code_limits.partner_id = excluded.partner_id"
        ))
        .bind(limit.id.to_string())
        .bind(partner.id.to_string())
        .bind(limit.limit)
        .bind(to_rfc3339(limit.created_at))
        .bind(limit.cancelled_at.map(to_rfc3339))
        .bind(limit.end_date.map(to_rfc3339))
        .execute(&mut **tx)
        .await?;

        if written.rows_affected() == 0 {
            return Err(StorageError::ForeignLimit {
                limit_id: limit.id,
                partner_id: partner.id,
            });
        }
    }
    Ok(())
}

pub(crate) async fn insert_or_ignore(
    tx: &mut Transaction<'_, Sqlite>,
    partner: &Partner,
) -> Result<(), StorageError> {
    if insert_partner_row(tx, partner, true).await? {
        sync_limits(tx, partner).await?;
    }
    Ok(())
}

#[async_trait]
impl Repository<Partner> for SqlitePartnerRepository {
    async fn get_all(&self) -> Result<Vec<Partner>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, is_active, number_issued_promo_codes FROM partners ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        let mut limits = self.load_limits(None).await?;
        let mut partners = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut partner = partner_from_row(row)?;
            partner.limits = limits.remove(&partner.id).unwrap_or_default();
            partners.push(partner);
        }
        Ok(partners)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Partner>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, is_active, number_issued_promo_codes FROM partners WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut partner = partner_from_row(&row)?;
        partner.limits = self
            .load_limits(Some(id))
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(Some(partner))
    }

    async fn create(&self, partner: Partner) -> Result<Partner, RepositoryError> {
        let partner = partner.with_fresh_ids();
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        insert_partner_row(&mut tx, &partner, false)
            .await
            .map_err(StorageError::from)?;
        sync_limits(&mut tx, &partner).await?;

        tx.commit().await.map_err(StorageError::from)?;
        Ok(partner)
    }

    async fn update(&self, id: Uuid, partner: Partner) -> Result<Option<Partner>, RepositoryError> {
        let partner = partner.with_id(id);
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        let result = sqlx::query(
            "UPDATE partners \
                SET name = ?, is_active = ?, number_issued_promo_codes = ? \
              WHERE id = ?",
        )
        .bind(&partner.name)
        .bind(partner.is_active)
        .bind(partner.number_issued_promo_codes as i64)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        sync_limits(&mut tx, &partner).await?;
        tx.commit().await.map_err(StorageError::from)?;

        debug!(stage = "storage", partner_id = %id, limits = partner.limits.len(), "partner updated");
        Ok(Some(partner))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Partner>, RepositoryError> {
        let Some(partner) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM partners WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Some(partner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use promo_admin_core::SetPartnerPromoCodeLimitRequest;

    use crate::{seed, test_support::setup_db};

    async fn seeded() -> crate::Database {
        let db = setup_db().await;
        db.seed_defaults().await.expect("seed");
        db
    }

    #[tokio::test]
    async fn loads_partner_with_limits() {
        let db = seeded().await;
        let partner = db
            .partners()
            .get_by_id(seed::SUPER_TOYS_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");

        assert!(partner.is_active);
        assert_eq!(partner.limits.len(), 1);
        assert_eq!(partner.limits[0].limit, 100);
        assert!(partner.limits[0].is_active());
        assert!(partner.limits[0].end_date.is_some());
    }

    #[tokio::test]
    async fn update_persists_new_limit_period() {
        let db = seeded().await;
        let repo = db.partners();
        let mut partner = repo
            .get_by_id(seed::SUPER_TOYS_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");
        partner.number_issued_promo_codes = 5;

        let now = Utc::now();
        partner
            .set_promo_code_limit(
                &SetPartnerPromoCodeLimitRequest {
                    limit: 20,
                    end_date: Some(now + Duration::days(30)),
                },
                now,
            )
            .expect("limit set");
        repo.update(partner.id, partner.clone())
            .await
            .expect("update")
            .expect("partner exists");

        let stored = repo
            .get_by_id(partner.id)
            .await
            .expect("lookup")
            .expect("partner exists");
        assert_eq!(stored.limits.len(), 2);
        assert!(stored.limits[0].cancelled_at.is_some());
        assert_eq!(stored.limits[1].limit, 20);
        assert!(stored.limits[1].is_active());
        assert_eq!(stored.number_issued_promo_codes, 0);
    }

    #[tokio::test]
    async fn update_drops_limits_no_longer_owned() {
        let db = seeded().await;
        let repo = db.partners();
        let mut partner = repo
            .get_by_id(seed::DREAM_FISH_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");
        partner.limits.clear();

        repo.update(partner.id, partner.clone())
            .await
            .expect("update")
            .expect("partner exists");

        let stored = repo
            .get_by_id(partner.id)
            .await
            .expect("lookup")
            .expect("partner exists");
        assert!(stored.limits.is_empty());
    }

    #[tokio::test]
    async fn update_missing_partner_returns_none() {
        let db = seeded().await;
        let repo = db.partners();
        let mut partner = seed::partners().remove(0);
        partner.name = "Ghost".to_string();

        let outcome = repo.update(Uuid::new_v4(), partner).await.expect("update");
        assert!(outcome.is_none());
        assert_eq!(
            repo.get_all().await.expect("list").len(),
            seed::partners().len()
        );
    }

    #[tokio::test]
    async fn create_from_stored_template_persists_its_own_limits() {
        let db = seeded().await;
        let repo = db.partners();
        let template = seed::partners().remove(0);

        let created = repo.create(template.clone()).await.expect("create");
        assert_ne!(created.limits[0].id, template.limits[0].id);

        let stored = repo
            .get_by_id(created.id)
            .await
            .expect("lookup")
            .expect("created partner stored");
        assert_eq!(stored, created);

        let original = repo
            .get_by_id(template.id)
            .await
            .expect("lookup")
            .expect("seeded partner");
        assert_eq!(original.limits, template.limits);
    }

    #[tokio::test]
    async fn update_rejects_limit_owned_by_another_partner() {
        let db = seeded().await;
        let repo = db.partners();
        let mut super_toys = repo
            .get_by_id(seed::SUPER_TOYS_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");
        let dream_fish = repo
            .get_by_id(seed::DREAM_FISH_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");

        let mut borrowed = dream_fish.limits[0].clone();
        borrowed.limit = 1;
        super_toys.limits.push(borrowed);

        let err = repo
            .update(super_toys.id, super_toys)
            .await
            .expect_err("foreign limit must be rejected");
        assert!(err.is_conflict());

        let dream_fish_after = repo
            .get_by_id(seed::DREAM_FISH_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");
        assert_eq!(dream_fish_after, dream_fish);
        assert_eq!(dream_fish_after.limits[0].limit, 10000);

        let super_toys_after = repo
            .get_by_id(seed::SUPER_TOYS_PARTNER_ID)
            .await
            .expect("lookup")
            .expect("seeded partner");
        assert_eq!(super_toys_after.limits.len(), 1);
    }

    #[tokio::test]
    async fn create_and_delete_partner_cascades_limits() {
        let db = setup_db().await;
        let repo = db.partners();
        let template = seed::partners().remove(0);

        let created = repo.create(template.clone()).await.expect("create");
        assert_ne!(created.id, template.id);
        assert!(created.limits.iter().all(|l| l.partner_id == created.id));

        let deleted = repo
            .delete(created.id)
            .await
            .expect("delete")
            .expect("partner existed");
        assert_eq!(deleted.limits.len(), 1);

        let remaining: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM partner_promo_code_limits")
                .fetch_one(db.pool())
                .await
                .expect("count");
        assert_eq!(remaining.0, 0);
    }
}
