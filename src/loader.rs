//! Config loader: periodic file poll, change detection, atomic publish (§4.D).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{self, ConfigDocument};
use crate::error::Result;
use crate::registry::TenantRegistry;

/// A consistent, atomically-published `(registry, port)` pair.
///
/// Request handlers read one [`Snapshot`] at dispatch time and hold
/// onto that `Arc` for the life of the request, even if the loader
/// publishes a new one mid-request (§5: "the snapshot seen by a
/// request is the one current at dispatch time").
#[derive(Debug)]
pub struct Snapshot {
    /// The tenant registry current as of the last successful reload.
    pub registry: Arc<TenantRegistry>,
    /// The HTTP port the listener should be bound to.
    pub port: u16,
}

/// Read-mostly holder for the current [`Snapshot`], swapped wholesale
/// on each successful reload. Modeled on the single
/// atomically-published pointer the teacher lineage calls `LiveConfig`.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl LiveConfig {
    /// Creates a `LiveConfig` seeded with `initial`.
    #[must_use]
    pub fn new(initial: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Returns the current snapshot. Cheap: an `Arc` clone behind a
    /// read lock held only for the clone itself.
    #[must_use]
    pub fn get(&self) -> Arc<Snapshot> {
        self.inner.read().clone()
    }

    fn set(&self, snapshot: Snapshot) {
        *self.inner.write() = Arc::new(snapshot);
    }
}

/// Periodically polls the configuration file and republishes a
/// [`LiveConfig`] snapshot on every successful, content-changed reload.
pub struct ConfigLoader {
    path: PathBuf,
    live: LiveConfig,
    desired_port: watch::Sender<u16>,
    sample_period_secs: Arc<AtomicU64>,
    last_contents: Option<Vec<u8>>,
    read_is_erroring: bool,
}

impl ConfigLoader {
    /// Performs the synchronous initial load used at startup: a
    /// failure here is fatal (the process exits before binding any
    /// listener), matching the crash-on-bind contract for first
    /// configuration.
    pub fn load_initial(path: PathBuf) -> Result<(Self, watch::Receiver<u16>)> {
        let bytes = std::fs::read(&path)?;
        let doc = config::parse(&bytes)?;

        let port = doc.local.http_port;
        let live = LiveConfig::new(Snapshot {
            registry: Arc::new(TenantRegistry::build(doc.remote)),
            port,
        });
        let (desired_port, rx) = watch::channel(port);

        let loader = Self {
            path,
            live,
            desired_port,
            sample_period_secs: Arc::new(AtomicU64::new(doc.local.config_sample_period)),
            last_contents: Some(bytes),
            read_is_erroring: false,
        };
        Ok((loader, rx))
    }

    /// The shared handle request handlers read snapshots from.
    #[must_use]
    pub fn live_config(&self) -> LiveConfig {
        self.live.clone()
    }

    /// Runs the poll loop until `shutdown` fires.
    ///
    /// The sample period is re-read from an atomic each iteration
    /// (rather than a fixed `tokio::time::interval`) so a config file
    /// that changes its own `configSamplePeriod` takes effect on the
    /// very next sleep, and so `configSamplePeriod: 0` can suppress
    /// polling entirely without tearing down the loop.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let period = self.sample_period_secs.load(Ordering::Relaxed);
            if period == 0 {
                // Polling suppressed; only shutdown can end the loop.
                let _ = shutdown.recv().await;
                return;
            }

            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(period)) => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => return,
            }
        }
    }

    async fn poll_once(&mut self) {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                self.read_is_erroring = false;
                bytes
            }
            Err(e) => {
                if !self.read_is_erroring {
                    warn!(path = %self.path.display(), error = %e, "config read failed, keeping current registry");
                    self.read_is_erroring = true;
                }
                return;
            }
        };

        if self.last_contents.as_deref() == Some(bytes.as_slice()) {
            debug!("config unchanged, skipping reload");
            return;
        }

        match config::parse(&bytes) {
            Ok(doc) => self.apply(bytes, doc),
            Err(e) => error!(error = %e, "config decode failed, keeping current registry"),
        }
    }

    fn apply(&mut self, bytes: Vec<u8>, doc: ConfigDocument) {
        self.last_contents = Some(bytes);
        self.sample_period_secs
            .store(doc.local.config_sample_period, Ordering::Relaxed);

        let registry = Arc::new(TenantRegistry::build(doc.remote));
        let tenant_count = registry.len();
        let port = doc.local.http_port;

        self.live.set(Snapshot { registry, port });
        // Always republish the desired port, even unchanged: this is
        // what lets the listener supervisor retry a previously failed
        // bind on the next config change (§4.I).
        let _ = self.desired_port.send(port);

        info!(tenant_count, port, "config reloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(path: &std::path::Path, json: &serde_json::Value) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(serde_json::to_vec(json).unwrap().as_slice()).unwrap();
    }

    #[test]
    fn initial_load_seeds_live_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(
            &path,
            &serde_json::json!([
                {"port": 4000, "configSamplePeriod": 1},
                {
                    "tokenUri": "https://p/t", "clientId": "cid", "clientSecret": "sec",
                    "redirectBackHosts": ["https://x.test"],
                },
            ]),
        );

        let (loader, rx) = ConfigLoader::load_initial(path).unwrap();
        let snapshot = loader.live_config().get();
        assert_eq!(snapshot.port, 4000);
        assert_eq!(snapshot.registry.len(), 1);
        assert_eq!(*rx.borrow(), 4000);
    }

    #[tokio::test]
    async fn poll_once_skips_byte_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let doc = serde_json::json!([{"port": 4000}]);
        write_config(&path, &doc);

        let (mut loader, _rx) = ConfigLoader::load_initial(path.clone()).unwrap();
        let before = loader.live.get();

        write_config(&path, &doc);
        loader.poll_once().await;
        let after = loader.live.get();
        assert!(Arc::ptr_eq(&before, &after), "unchanged file must not republish");
    }

    #[tokio::test]
    async fn poll_once_applies_changed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, &serde_json::json!([{"port": 4000}]));

        let (mut loader, rx) = ConfigLoader::load_initial(path.clone()).unwrap();
        write_config(
            &path,
            &serde_json::json!([
                {"port": 5000},
                {
                    "tokenUri": "https://p/t", "clientId": "cid", "clientSecret": "sec",
                    "redirectBackHosts": ["https://x.test"],
                },
            ]),
        );
        loader.poll_once().await;

        assert_eq!(loader.live.get().port, 5000);
        assert_eq!(loader.live.get().registry.len(), 1);
        assert_eq!(*rx.borrow(), 5000);
    }

    #[tokio::test]
    async fn poll_once_keeps_registry_on_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(
            &path,
            &serde_json::json!([
                {"port": 4000},
                {
                    "tokenUri": "https://p/t", "clientId": "cid", "clientSecret": "sec",
                    "redirectBackHosts": ["https://x.test"],
                },
            ]),
        );
        let (mut loader, _rx) = ConfigLoader::load_initial(path.clone()).unwrap();
        let before = loader.live.get();

        std::fs::write(&path, b"not json").unwrap();
        loader.poll_once().await;

        let after = loader.live.get();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn poll_once_keeps_registry_on_transient_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, &serde_json::json!([{"port": 4000}]));
        let (mut loader, _rx) = ConfigLoader::load_initial(path.clone()).unwrap();
        let before = loader.live.get();

        std::fs::remove_file(&path).unwrap();
        loader.poll_once().await;

        assert!(Arc::ptr_eq(&before, &loader.live.get()));
    }
}
