//! Pure rules shared by the ledgers: who may delegate what to whom, how long
//! a grant lasts, and how a stored limit compares against a counter.

use std::str::FromStr;

use chrono::Months;

use crate::{entity::Role, prelude::*, sv::Principal};

/// Stored `max_*` value meaning "no limit".
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
  #[error("Administrators may only grant to directors")]
  AdminTargetsDirectorOnly,
  #[error("Directors may only grant to teachers and students")]
  DirectorTargetsTeachersOrStudents,
  #[error("Teachers may only grant to students")]
  TeacherTargetsStudentsOnly,
  #[error("Students cannot grant capabilities")]
  StudentCannotGrant,
  #[error("Grantee belongs to a different academy")]
  TenantMismatch,
  #[error("Grantor does not hold this capability")]
  GrantorLacksCapability,
  #[error("Only the original grantor may revoke this grant")]
  NotGrantor,
  #[error("Quota belongs to a different academy")]
  ForeignQuota,
  #[error("Only administrators may do this")]
  AdminOnly,
}

impl Denied {
  pub fn code(self) -> &'static str {
    match self {
      Denied::AdminTargetsDirectorOnly => "ADMIN_TARGETS_DIRECTOR_ONLY",
      Denied::DirectorTargetsTeachersOrStudents => {
        "DIRECTOR_TARGETS_TEACHERS_OR_STUDENTS"
      }
      Denied::TeacherTargetsStudentsOnly => "TEACHER_TARGETS_STUDENTS_ONLY",
      Denied::StudentCannotGrant => "STUDENT_CANNOT_GRANT",
      Denied::TenantMismatch => "TENANT_MISMATCH",
      Denied::GrantorLacksCapability => "GRANTOR_LACKS_CAPABILITY",
      Denied::NotGrantor => "NOT_GRANTOR",
      Denied::ForeignQuota => "FOREIGN_QUOTA",
      Denied::AdminOnly => "ADMIN_ONLY",
    }
  }
}

/// Facts about a grantor/grantee pair needed to decide a delegation.
#[derive(Debug, Clone, Copy)]
pub struct Standing {
  pub grantor: Role,
  pub grantee: Role,
  pub same_tenant: bool,
  /// Grantor holds an effective grant of the capability itself
  pub holds: bool,
}

/// Delegation moves exactly one rung down the hierarchy. Admins are the root
/// of every chain; everyone below must already hold what they hand out.
pub fn authorize(standing: Standing) -> Result<(), Denied> {
  let Standing { grantor, grantee, same_tenant, holds } = standing;

  match grantor {
    Role::SuperAdmin | Role::Admin => {
      if grantee != Role::Director {
        return Err(Denied::AdminTargetsDirectorOnly);
      }
      Ok(())
    }
    Role::Director | Role::Teacher => {
      let reachable = match grantor {
        Role::Director => matches!(grantee, Role::Teacher | Role::Student),
        _ => grantee == Role::Student,
      };
      if !reachable {
        return Err(if grantor == Role::Director {
          Denied::DirectorTargetsTeachersOrStudents
        } else {
          Denied::TeacherTargetsStudentsOnly
        });
      }
      if !same_tenant {
        return Err(Denied::TenantMismatch);
      }
      if !holds {
        return Err(Denied::GrantorLacksCapability);
      }
      Ok(())
    }
    Role::Student => Err(Denied::StudentCannotGrant),
  }
}

/// Revocation belongs to whoever issued the grant, or a super admin.
pub fn may_revoke(requester: &str, role: Role, grantor: &str) -> bool {
  requester == grantor || role == Role::SuperAdmin
}

/// Staff meter against their academy's subscription (usually the
/// director's); admins may meter anyone. Students only ever touch their own.
pub fn may_meter(caller: &Principal, owner: &Principal) -> bool {
  let staff = matches!(caller.role, Role::Director | Role::Teacher);
  caller.id == owner.id
    || caller.role.is_admin()
    || (staff && caller.same_tenant(owner))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
  Days,
  Weeks,
  Months,
  Years,
}

impl FromStr for DurationUnit {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "day" | "days" => Ok(Self::Days),
      "week" | "weeks" => Ok(Self::Weeks),
      "month" | "months" => Ok(Self::Months),
      "year" | "years" => Ok(Self::Years),
      other => {
        Err(Error::InvalidRequest(format!("unknown duration unit `{other}`")))
      }
    }
  }
}

/// Lifetime of a grant: `amount` units from the moment it is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
  pub amount: u32,
  pub unit: DurationUnit,
}

impl Term {
  /// Both parts present makes a term; both absent means no expiry.
  pub fn from_parts(
    amount: Option<i64>,
    unit: Option<DurationUnit>,
  ) -> Result<Option<Self>> {
    match (amount, unit) {
      (None, None) => Ok(None),
      (Some(amount), Some(unit)) => {
        let amount = u32::try_from(amount)
          .ok()
          .filter(|&n| n > 0)
          .ok_or_else(|| {
            Error::InvalidRequest(format!("invalid duration `{amount}`"))
          })?;
        Ok(Some(Self { amount, unit }))
      }
      _ => Err(Error::InvalidRequest(
        "duration and durationUnit go together".into(),
      )),
    }
  }

  /// Months and years follow the civil calendar, clamping to month end
  /// (Jan 31 + 1 month = Feb 28/29).
  pub fn expires_from(self, start: DateTime) -> Result<DateTime> {
    let n = self.amount;
    let end = match self.unit {
      DurationUnit::Days => {
        TimeDelta::try_days(n as i64).and_then(|d| start.checked_add_signed(d))
      }
      DurationUnit::Weeks => TimeDelta::try_weeks(n as i64)
        .and_then(|d| start.checked_add_signed(d)),
      DurationUnit::Months => start.checked_add_months(Months::new(n)),
      DurationUnit::Years => n
        .checked_mul(12)
        .and_then(|months| start.checked_add_months(Months::new(months))),
    };

    end.ok_or_else(|| Error::InvalidRequest("duration out of range".into()))
  }
}

/// A decoded `max_*` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
  Unlimited,
  Capped(i32),
}

impl From<i32> for Limit {
  fn from(raw: i32) -> Self {
    if raw == UNLIMITED { Self::Unlimited } else { Self::Capped(raw) }
  }
}

impl Limit {
  /// One more unit fits on top of `current`.
  pub fn allows(self, current: i32) -> bool {
    match self {
      Limit::Unlimited => true,
      Limit::Capped(max) => current < max,
    }
  }

  pub fn remaining(self, current: i32) -> Option<i32> {
    match self {
      Limit::Unlimited => None,
      Limit::Capped(max) => Some((max - current).max(0)),
    }
  }

  pub fn raw(self) -> i32 {
    match self {
      Limit::Unlimited => UNLIMITED,
      Limit::Capped(max) => max,
    }
  }
}
