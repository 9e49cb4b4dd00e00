use std::{future::Future, io, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::DialError;

/// Opens the outbound half of a relay.
///
/// Implementations make exactly one attempt per call; the caller decides what
/// to do with a failure.
pub trait Dialer: Send + Sync + 'static {
    type Conn: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn dial(
        &self,
        destination: &Endpoint,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Self::Conn, DialError>> + Send;
}

/// Plain TCP dialer used by the forwarding service.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Conn = TcpStream;

    async fn dial(
        &self,
        destination: &Endpoint,
        timeout: Option<Duration>,
    ) -> Result<TcpStream, DialError> {
        let target_addr = destination.to_string();
        debug!(destination = %target_addr, "Dialing destination");

        let stream =
            dial_with_timeout(destination, timeout, TcpStream::connect(target_addr)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY on outbound stream");
        }
        Ok(stream)
    }
}

/// Bounds `connect` by `timeout` and classifies its failure.
///
/// A timeout is recognised either from the elapsed bound or from the OS
/// reporting `ErrorKind::TimedOut`; everything else is `Other`.
pub async fn dial_with_timeout<F, C>(
    destination: &Endpoint,
    timeout: Option<Duration>,
    connect: F,
) -> Result<C, DialError>
where
    F: Future<Output = io::Result<C>>,
{
    let result = match timeout {
        Some(bound) => match tokio::time::timeout(bound, connect).await {
            Ok(result) => result,
            Err(_) => {
                return Err(DialError::Timeout {
                    destination: destination.clone(),
                    after: Some(bound),
                });
            }
        },
        None => connect.await,
    };

    result.map_err(|source| {
        if source.kind() == io::ErrorKind::TimedOut {
            DialError::Timeout {
                destination: destination.clone(),
                after: None,
            }
        } else {
            DialError::Other {
                destination: destination.clone(),
                source,
            }
        }
    })
}
