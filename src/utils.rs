use std::future::Future;

use crate::prelude::*;

/// Attempts made by [`retry`] before a transient store error is surfaced.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_millis(50);

/// Source of "now" for expiry decisions. Tests pin it to move past expiries.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
  #[default]
  System,
  #[cfg(test)]
  Fixed(DateTime),
}

impl Clock {
  pub fn now(self) -> DateTime {
    match self {
      Clock::System => Utc::now().naive_utc(),
      #[cfg(test)]
      Clock::Fixed(at) => at,
    }
  }
}

/// Re-runs `op` on lock contention or lost connections with exponential
/// backoff. `op` must be a whole transaction so a retry never observes half
/// of a previous attempt.
pub async fn retry<T, F, Fut>(mut op: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut delay = RETRY_BASE;
  let mut attempt = 1;

  loop {
    match op().await {
      Err(err) if err.is_transient() && attempt < RETRY_ATTEMPTS => {
        warn!("Transient store error (attempt {attempt}): {err}");
        time::sleep(delay).await;
        delay *= 2;
        attempt += 1;
      }
      result => return result,
    }
  }
}

pub fn format_date(date: DateTime) -> String {
  date.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use sea_orm::DbErr;

  use super::*;

  #[tokio::test]
  async fn retries_transient_errors_then_succeeds() {
    let calls = AtomicU32::new(0);

    let result = retry(|| async {
      if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        Err(Error::Database(DbErr::Custom("database is locked".into())))
      } else {
        Ok(7)
      }
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn gives_up_after_budget() {
    let calls = AtomicU32::new(0);

    let result: Result<()> = retry(|| async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(Error::Database(DbErr::Custom("database is locked".into())))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), RETRY_ATTEMPTS);
  }

  #[tokio::test]
  async fn domain_errors_are_not_retried() {
    let calls = AtomicU32::new(0);

    let result: Result<()> = retry(|| async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(Error::NoSubscription)
    })
    .await;

    assert!(matches!(result, Err(Error::NoSubscription)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
