//! HTTP listener lifecycle: bind, rebind, unbind (§4.I).
//!
//! The supervisor watches a `tokio::sync::watch<u16>` channel carrying
//! the desired port (published by [`crate::loader`] on every
//! successful reload, not only on a change — idempotency is handled
//! here, by comparing against the currently bound port) and drives the
//! `Unbound` / `Bound(port)` state machine described in the component
//! design: a rebind first fully drains the old listener, then binds
//! the new one.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::Error;

/// `0` is the sentinel for "listener off" (mirrors `port <= 0` in the
/// component design; ports are unsigned here so the only non-positive
/// value is exactly zero).
const LISTENER_OFF: u16 = 0;

struct Bound {
    port: u16,
    handle: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

/// Drives one HTTP listener according to a stream of desired-port updates.
pub struct ListenerSupervisor {
    router: Router,
    desired_port: watch::Receiver<u16>,
}

impl ListenerSupervisor {
    /// Creates a supervisor for `router`, tracking `desired_port` for
    /// rebind requests.
    #[must_use]
    pub fn new(router: Router, desired_port: watch::Receiver<u16>) -> Self {
        Self { router, desired_port }
    }

    /// Runs the supervisor until `shutdown` fires, draining the
    /// currently bound listener (if any) before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut bound: Option<Bound> = None;

        loop {
            let desired = *self.desired_port.borrow();
            if bound.as_ref().map(|b| b.port) != Some(desired) {
                self.reconcile(&mut bound, desired).await;
            }

            tokio::select! {
                changed = self.desired_port.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    Self::unbind(&mut bound).await;
                    break;
                }
            }
        }
    }

    async fn reconcile(&self, bound: &mut Option<Bound>, desired: u16) {
        Self::unbind(bound).await;

        if desired == LISTENER_OFF {
            info!("listener disabled (port <= 0)");
            return;
        }

        match Self::bind(self.router.clone(), desired).await {
            Ok(next) => {
                info!(port = desired, "listener bound");
                *bound = Some(next);
            }
            Err(e) => {
                error!(port = desired, error = %e, "bind failed, staying unbound");
            }
        }
    }

    async fn unbind(bound: &mut Option<Bound>) {
        if let Some(b) = bound.take() {
            let _ = b.stop.send(());
            if let Err(e) = b.handle.await {
                warn!(error = %e, "listener task panicked during drain");
            }
        }
    }

    async fn bind(router: Router, port: u16) -> Result<Bound, Error> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| Error::Bind { port, source })?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "listener task exited with error");
            }
        });
        Ok(Bound {
            port,
            handle,
            stop: stop_tx,
        })
    }
}
