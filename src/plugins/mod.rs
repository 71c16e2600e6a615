pub mod server;
pub mod sweep;

use std::sync::Arc;

use tokio::time::sleep;

use crate::{prelude::*, state::AppState};

/// A long-running part of the service. Crashed plugins are restarted.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
  backoff: Duration,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new(), backoff: Duration::from_secs(5) }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  pub async fn run(self, app: Arc<AppState>) {
    for plugin in self.plugins {
      let app = app.clone();
      let backoff = self.backoff;

      tokio::spawn(async move {
        let name = plugin.name();
        info!("SYSTEM: Service `{name}` initialized");

        loop {
          let app = app.clone();
          let plugin = plugin.clone();

          let handle = tokio::spawn(async move { plugin.start(app).await });

          match handle.await {
            Ok(Ok(())) => {
              warn!("Service `{name}` stopped unexpectedly (Ok).");
            }
            Ok(Err(err)) => {
              error!("Service `{name}` crashed with error: {err:#}.");
            }
            Err(join_err) if join_err.is_cancelled() => {
              info!("Service `{name}` shutdown.");
              break;
            }
            Err(_) => error!("Service `{name}` PANICKED!"),
          }

          sleep(backoff).await;
          info!("SYSTEM: Restarting service `{name}`...");
        }
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;
  use crate::state::Config;

  struct Flaky(Arc<AtomicU32>);

  #[async_trait::async_trait]
  impl Plugin for Flaky {
    async fn start(&self, _: Arc<AppState>) -> anyhow::Result<()> {
      self.0.fetch_add(1, Ordering::SeqCst);
      anyhow::bail!("boom")
    }
  }

  #[tokio::test(start_paused = true)]
  async fn crashed_plugins_restart() {
    let app = Arc::new(AppState::with_db(
      DatabaseConnection::Disconnected,
      Config::default(),
    ));
    let starts = Arc::new(AtomicU32::new(0));

    App::new().register(Flaky(starts.clone())).run(app).await;

    time::sleep(Duration::from_secs(11)).await;
    assert!(starts.load(Ordering::SeqCst) >= 3);
  }
}
