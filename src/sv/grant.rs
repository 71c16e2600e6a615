//! Entitlement ledger: delegation of capabilities down the role hierarchy

use sea_orm::sea_query::OnConflict;
use serde::Serialize;

use crate::{
  entity::{Role, grant},
  policy::{self, Denied, Standing, Term},
  prelude::*,
  sv::{self, Principal},
};

/// A grant row as seen by callers, with its effective status at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Granted {
  pub grantee_id: String,
  pub capability_id: String,
  pub grantor_id: String,
  pub grantor_role: Role,
  pub is_active: bool,
  pub expires_at: Option<DateTime>,
  pub effective: bool,
}

impl Granted {
  fn new(row: grant::Model, now: DateTime) -> Self {
    let effective = row.is_effective(now);
    Self {
      grantee_id: row.grantee_id,
      capability_id: row.capability_id,
      grantor_id: row.grantor_id,
      grantor_role: row.grantor_role,
      is_active: row.is_active,
      expires_at: row.expires_at,
      effective,
    }
  }
}

pub struct Grants<'a> {
  db: &'a DatabaseConnection,
  clock: Clock,
}

impl<'a> Grants<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db, clock: Clock::System }
  }

  #[cfg(test)]
  pub fn with_clock(self, clock: Clock) -> Self {
    Self { clock, ..self }
  }

  /// Grants `capability_id` to `grantee_id` on behalf of `grantor_id`,
  /// replacing any previous grant of the same pair. `term = None` never
  /// expires.
  pub async fn grant(
    &self,
    grantor_id: &str,
    grantee_id: &str,
    capability_id: &str,
    term: Option<Term>,
  ) -> Result<Granted> {
    let users = sv::User::new(self.db);
    let grantor = users.principal(grantor_id).await?;
    let grantee = users.principal(grantee_id).await?;
    sv::Catalog::new(self.db).require(capability_id).await?;

    let (grantor, grantee) = (&grantor, &grantee);
    let granted = utils::retry(move || {
      self.commit_grant(grantor, grantee, capability_id, term)
    })
    .await
    .inspect_err(|err| {
      if let Error::Forbidden(denied) = err {
        info!(
          "Grant of `{capability_id}` by {grantor_id} to {grantee_id} \
           denied: {denied}"
        );
      }
    })?;

    info!(
      "Granted `{capability_id}` to {grantee_id} by {grantor_id} ({:?}), \
       expires: {}",
      grantor.role,
      granted.expires_at.map_or("never".into(), utils::format_date),
    );
    Ok(granted)
  }

  async fn commit_grant(
    &self,
    grantor: &Principal,
    grantee: &Principal,
    capability_id: &str,
    term: Option<Term>,
  ) -> Result<Granted> {
    let now = self.clock.now();
    let expires_at = term.map(|term| term.expires_from(now)).transpose()?;

    let txn = self.db.begin().await?;

    // read on the same transaction as the upsert so a concurrent revoke of
    // the grantor's own grant cannot slip in between
    let holds = !grantor.role.is_admin()
      && Self::effective_in(&txn, &grantor.id, capability_id, now).await?;

    policy::authorize(Standing {
      grantor: grantor.role,
      grantee: grantee.role,
      same_tenant: grantor.same_tenant(grantee),
      holds,
    })?;

    let row = grant::ActiveModel {
      grantee_id: Set(grantee.id.clone()),
      capability_id: Set(capability_id.to_string()),
      grantor_id: Set(grantor.id.clone()),
      grantor_role: Set(grantor.role),
      is_active: Set(true),
      expires_at: Set(expires_at),
      granted_at: Set(now),
      updated_at: Set(now),
    };

    grant::Entity::insert(row)
      .on_conflict(
        OnConflict::columns([
          grant::Column::GranteeId,
          grant::Column::CapabilityId,
        ])
        .update_columns([
          grant::Column::GrantorId,
          grant::Column::GrantorRole,
          grant::Column::IsActive,
          grant::Column::ExpiresAt,
          grant::Column::UpdatedAt,
        ])
        .to_owned(),
      )
      .exec_without_returning(&txn)
      .await?;

    let saved = Self::find_in(&txn, &grantee.id, capability_id)
      .await?
      .ok_or_else(|| Error::Internal("grant missing after upsert".into()))?;

    txn.commit().await?;
    Ok(Granted::new(saved, now))
  }

  /// Deactivates a grant. Only its grantor or a super admin may do so;
  /// revoking an inactive grant changes nothing.
  pub async fn revoke(
    &self,
    requester_id: &str,
    grantee_id: &str,
    capability_id: &str,
  ) -> Result<()> {
    let requester = sv::User::new(self.db).principal(requester_id).await?;

    let requester = &requester;
    utils::retry(move || {
      self.commit_revoke(requester, grantee_id, capability_id)
    })
    .await
  }

  async fn commit_revoke(
    &self,
    requester: &Principal,
    grantee_id: &str,
    capability_id: &str,
  ) -> Result<()> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let row = Self::find_in(&txn, grantee_id, capability_id)
      .await?
      .ok_or(Error::NotFound("grant"))?;

    if !policy::may_revoke(&requester.id, requester.role, &row.grantor_id) {
      return Err(Denied::NotGrantor.into());
    }

    if !row.is_active {
      debug!("Grant of `{capability_id}` to {grantee_id} already inactive");
      return Ok(());
    }

    grant::ActiveModel {
      is_active: Set(false),
      updated_at: Set(now),
      ..row.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    info!(
      "Revoked `{capability_id}` from {grantee_id} by {}",
      requester.id
    );
    Ok(())
  }

  pub async fn is_effective(
    &self,
    principal_id: &str,
    capability_id: &str,
  ) -> Result<bool> {
    let now = self.clock.now();
    utils::retry(move || {
      Self::effective_in(self.db, principal_id, capability_id, now)
    })
    .await
  }

  /// Every grant the principal holds, inactive ones included.
  pub async fn held_by(&self, principal_id: &str) -> Result<Vec<Granted>> {
    self.list(grant::Column::GranteeId, principal_id).await
  }

  /// Every grant the principal handed out.
  pub async fn issued_by(&self, grantor_id: &str) -> Result<Vec<Granted>> {
    self.list(grant::Column::GrantorId, grantor_id).await
  }

  async fn list(&self, by: grant::Column, id: &str) -> Result<Vec<Granted>> {
    let now = self.clock.now();
    let rows = grant::Entity::find()
      .filter(by.eq(id))
      .order_by_desc(grant::Column::UpdatedAt)
      .all(self.db)
      .await?;

    Ok(rows.into_iter().map(|row| Granted::new(row, now)).collect())
  }

  async fn find_in<C: ConnectionTrait>(
    conn: &C,
    grantee_id: &str,
    capability_id: &str,
  ) -> Result<Option<grant::Model>> {
    let row = grant::Entity::find_by_id((
      grantee_id.to_string(),
      capability_id.to_string(),
    ))
    .one(conn)
    .await?;
    Ok(row)
  }

  async fn effective_in<C: ConnectionTrait>(
    conn: &C,
    principal_id: &str,
    capability_id: &str,
    now: DateTime,
  ) -> Result<bool> {
    let row = Self::find_in(conn, principal_id, capability_id).await?;
    Ok(row.is_some_and(|row| row.is_effective(now)))
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use sea_orm::PaginatorTrait;

  use super::*;
  use crate::{policy::DurationUnit, testing};

  fn t0() -> DateTime {
    NaiveDate::from_ymd_opt(2026, 1, 31)
      .and_then(|date| date.and_hms_opt(9, 0, 0))
      .unwrap()
  }

  fn months(amount: u32) -> Option<Term> {
    Some(Term { amount, unit: DurationUnit::Months })
  }

  async fn rows(db: &DatabaseConnection) -> u64 {
    grant::Entity::find().count(db).await.unwrap()
  }

  #[tokio::test]
  async fn admin_grant_expires_on_calendar_month() {
    let db = testing::db().await;
    testing::academy(&db).await;

    let sv = Grants::new(&db).with_clock(Clock::Fixed(t0()));
    let granted = sv.grant("root", "d1", "bot-A", months(1)).await.unwrap();

    let expiry = NaiveDate::from_ymd_opt(2026, 2, 28)
      .and_then(|date| date.and_hms_opt(9, 0, 0))
      .unwrap();
    assert_eq!(granted.expires_at, Some(expiry));
    assert!(granted.effective);
    assert!(sv.is_effective("d1", "bot-A").await.unwrap());

    let later = Grants::new(&db)
      .with_clock(Clock::Fixed(expiry + TimeDelta::seconds(1)));
    assert!(!later.is_effective("d1", "bot-A").await.unwrap());

    // exactly at expiry is no longer effective
    let edge = Grants::new(&db).with_clock(Clock::Fixed(expiry));
    assert!(!edge.is_effective("d1", "bot-A").await.unwrap());
  }

  #[tokio::test]
  async fn director_sub_grants_only_what_it_holds() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    sv.grant("d1", "t1", "bot-A", None).await.unwrap();
    assert!(sv.is_effective("t1", "bot-A").await.unwrap());

    assert!(matches!(
      sv.grant("d1", "t1", "bot-B", None).await,
      Err(Error::Forbidden(Denied::GrantorLacksCapability))
    ));
    assert!(!sv.is_effective("t1", "bot-B").await.unwrap());
  }

  #[tokio::test]
  async fn teacher_cannot_cross_academies() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    sv.grant("d1", "t1", "bot-A", None).await.unwrap();

    assert!(matches!(
      sv.grant("t1", "s2", "bot-A", None).await,
      Err(Error::Forbidden(Denied::TenantMismatch))
    ));
    assert!(!sv.is_effective("s2", "bot-A").await.unwrap());

    sv.grant("t1", "s1", "bot-A", None).await.unwrap();
    assert!(sv.is_effective("s1", "bot-A").await.unwrap());
  }

  #[tokio::test]
  async fn hierarchy_is_enforced() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    assert!(matches!(
      sv.grant("root", "t1", "bot-A", None).await,
      Err(Error::Forbidden(Denied::AdminTargetsDirectorOnly))
    ));
    assert!(matches!(
      sv.grant("s1", "s1", "bot-A", None).await,
      Err(Error::Forbidden(Denied::StudentCannotGrant))
    ));
    sv.grant("admin", "d1", "bot-A", None).await.unwrap();
    assert!(matches!(
      sv.grant("d1", "d2", "bot-A", None).await,
      Err(Error::Forbidden(Denied::DirectorTargetsTeachersOrStudents))
    ));
    assert_eq!(rows(&db).await, 1);
  }

  #[tokio::test]
  async fn unknown_references() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    assert!(matches!(
      sv.grant("root", "ghost", "bot-A", None).await,
      Err(Error::NotFound("user"))
    ));
    assert!(matches!(
      sv.grant("root", "d1", "bot-Z", None).await,
      Err(Error::NotFound("capability"))
    ));
    assert!(matches!(
      sv.revoke("root", "d1", "bot-A").await,
      Err(Error::NotFound("grant"))
    ));
  }

  #[tokio::test]
  async fn regrant_overwrites_in_place() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db).with_clock(Clock::Fixed(t0()));

    let first = sv.grant("root", "d1", "bot-A", months(1)).await.unwrap();
    let second = sv.grant("admin", "d1", "bot-A", months(12)).await.unwrap();
    assert!(second.expires_at > first.expires_at);
    assert_eq!(second.grantor_id, "admin");
    assert_eq!(second.grantor_role, Role::Admin);
    assert_eq!(rows(&db).await, 1);

    // omitting the term clears the expiry
    let third = sv.grant("root", "d1", "bot-A", None).await.unwrap();
    assert_eq!(third.expires_at, None);
    assert_eq!(rows(&db).await, 1);
  }

  #[tokio::test]
  async fn regrant_reactivates_revoked() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    sv.revoke("root", "d1", "bot-A").await.unwrap();
    assert!(!sv.is_effective("d1", "bot-A").await.unwrap());

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    assert!(sv.is_effective("d1", "bot-A").await.unwrap());
    assert_eq!(rows(&db).await, 1);
  }

  #[tokio::test]
  async fn revoke_is_idempotent() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    sv.grant("d1", "t1", "bot-A", None).await.unwrap();

    sv.revoke("d1", "t1", "bot-A").await.unwrap();
    sv.revoke("d1", "t1", "bot-A").await.unwrap();

    let held = sv.held_by("t1").await.unwrap();
    assert_eq!(held.len(), 1);
    assert!(!held[0].is_active);
    assert!(!held[0].effective);
  }

  #[tokio::test]
  async fn only_grantor_or_super_admin_revokes() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("admin", "d1", "bot-A", None).await.unwrap();
    sv.grant("d1", "t1", "bot-A", None).await.unwrap();

    assert!(matches!(
      sv.revoke("t1", "t1", "bot-A").await,
      Err(Error::Forbidden(Denied::NotGrantor))
    ));
    assert!(matches!(
      sv.revoke("admin", "t1", "bot-A").await,
      Err(Error::Forbidden(Denied::NotGrantor))
    ));
    assert!(sv.is_effective("t1", "bot-A").await.unwrap());

    sv.revoke("root", "t1", "bot-A").await.unwrap();
    assert!(!sv.is_effective("t1", "bot-A").await.unwrap());
  }

  #[tokio::test]
  async fn lost_standing_blocks_further_delegation() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    sv.grant("d1", "t1", "bot-A", None).await.unwrap();
    sv.revoke("root", "d1", "bot-A").await.unwrap();

    assert!(matches!(
      sv.grant("d1", "s1", "bot-A", None).await,
      Err(Error::Forbidden(Denied::GrantorLacksCapability))
    ));
  }

  #[tokio::test]
  async fn expired_standing_blocks_delegation() {
    let db = testing::db().await;
    testing::academy(&db).await;

    Grants::new(&db)
      .with_clock(Clock::Fixed(t0()))
      .grant("root", "d1", "bot-A", Some(Term {
        amount: 3,
        unit: DurationUnit::Days,
      }))
      .await
      .unwrap();

    let later = Grants::new(&db)
      .with_clock(Clock::Fixed(t0() + TimeDelta::days(4)));
    assert!(matches!(
      later.grant("d1", "t1", "bot-A", None).await,
      Err(Error::Forbidden(Denied::GrantorLacksCapability))
    ));
  }

  #[tokio::test]
  async fn listings() {
    let db = testing::db().await;
    testing::academy(&db).await;
    let sv = Grants::new(&db);

    sv.grant("root", "d1", "bot-A", None).await.unwrap();
    sv.grant("root", "d1", "bot-B", None).await.unwrap();
    sv.grant("d1", "t1", "bot-A", None).await.unwrap();
    sv.grant("d1", "s1", "bot-B", None).await.unwrap();

    assert_eq!(sv.held_by("d1").await.unwrap().len(), 2);
    assert_eq!(sv.issued_by("root").await.unwrap().len(), 2);

    let issued = sv.issued_by("d1").await.unwrap();
    assert_eq!(issued.len(), 2);
    assert!(issued.iter().all(|g| g.grantor_role == Role::Director));
  }
}
