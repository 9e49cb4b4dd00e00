use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::admission::AdmissionFilter;
use crate::config::ForwarderConfig;
use crate::dialer::{Dialer, TcpDialer};
use crate::error::{ConfigError, ServiceError};
use crate::relay;

/// Pause after a failed `accept` so descriptor exhaustion does not spin the loop.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts inbound connections, filters them by source address and relays
/// each admitted one to the configured destination.
pub struct ForwardingService<D = TcpDialer> {
    config: Arc<ForwarderConfig>,
    filter: AdmissionFilter,
    dialer: Arc<D>,
}

impl ForwardingService<TcpDialer> {
    pub fn new(config: ForwarderConfig) -> Result<Self, ConfigError> {
        Self::with_dialer(config, TcpDialer)
    }
}

impl<D: Dialer> ForwardingService<D> {
    pub fn with_dialer(config: ForwarderConfig, dialer: D) -> Result<Self, ConfigError> {
        let filter = AdmissionFilter::new(&config.admission_range)?;
        Ok(Self {
            config: Arc::new(config),
            filter,
            dialer: Arc::new(dialer),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub async fn bind(&self) -> Result<TcpListener, ServiceError> {
        TcpListener::bind(self.config.source.to_string())
            .await
            .map_err(|source| ServiceError::Bind {
                endpoint: self.config.source.clone(),
                source,
            })
    }

    /// Binds the source endpoint and forwards connections until the process exits.
    pub async fn run(self) -> Result<(), ServiceError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Runs the accept loop on `listener` forever.
    pub async fn serve(self, listener: TcpListener) {
        self.serve_with_shutdown(listener, std::future::pending::<()>())
            .await;
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Stopping only closes the listener; relays already in flight keep
    /// running on their own tasks until their connections finish.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            source = %self.config.source,
            local_addr = %listener
                .local_addr()
                .map_or_else(|_| "unknown".to_string(), |a| a.to_string()),
            destination = %self.config.destination,
            range = %self.filter.range(),
            "Forwarder listening"
        );

        tokio::pin!(shutdown);
        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            self.on_accept(accepted).await;
        }
    }

    /// A failed accept is logged and never ends the loop.
    async fn on_accept(&self, accepted: io::Result<(TcpStream, SocketAddr)>) {
        match accepted {
            Ok((stream, peer)) => self.admit(stream, peer),
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if !self.filter.allow(peer.ip()) {
            warn!(peer = %peer, "Connection restricted");
            drop(stream);
            return;
        }

        debug!(peer = %peer, "Connection admitted");
        let config = Arc::clone(&self.config);
        let dialer = Arc::clone(&self.dialer);
        tokio::spawn(forward_connection(stream, peer, config, dialer));
    }
}

/// Per-connection task: dial the destination, then relay until either side closes.
async fn forward_connection<D: Dialer>(
    inbound: TcpStream,
    peer: SocketAddr,
    config: Arc<ForwarderConfig>,
    dialer: Arc<D>,
) {
    let destination = &config.destination;
    let outbound = match dialer.dial(destination, config.dial_timeout()).await {
        Ok(outbound) => outbound,
        Err(e) if e.is_timeout() => {
            warn!(
                peer = %peer,
                destination = %destination,
                timeout_secs = config.dial_timeout().map(|d| d.as_secs()),
                "Dial timed out"
            );
            return;
        }
        Err(e) => {
            error!(peer = %peer, destination = %destination, error = %e, "Dial failed");
            return;
        }
    };

    info!(peer = %peer, destination = %destination, "Connected");
    if let Err(e) = inbound.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY on inbound stream");
    }

    let stats = relay::run(inbound, outbound).await;
    info!(
        peer = %peer,
        destination = %destination,
        sent = stats.inbound_to_outbound,
        received = stats.outbound_to_inbound,
        "Relay closed"
    );
}
