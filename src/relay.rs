//! Bidirectional byte relay between an inbound and an outbound stream.
//!
//! Each direction runs on its own task. Whichever direction finishes first
//! trips a shared [`CloseSignal`], which stops the other direction; every
//! task drops the halves it owns on the way out, so both connections are
//! closed once [`run`] returns.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub const BUFFER_SIZE: usize = 8192;

/// Close flag shared by the two directions of one relay pair.
///
/// Closing is idempotent and may happen from either task, any number of times.
#[derive(Clone, Debug, Default)]
pub struct CloseSignal {
    token: CancellationToken,
}

impl CloseSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn closed(&self) {
        self.token.cancelled().await;
    }
}

/// Bytes moved in each direction over the life of a relay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub inbound_to_outbound: u64,
    pub outbound_to_inbound: u64,
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    InboundToOutbound,
    OutboundToInbound,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::InboundToOutbound => "inbound->outbound",
            Self::OutboundToInbound => "outbound->inbound",
        }
    }
}

/// Relays bytes between `inbound` and `outbound` until either side finishes.
///
/// Returns once both copy tasks have exited and every half has been dropped.
pub async fn run<A, B>(inbound: A, outbound: B) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (inbound_reader, inbound_writer) = tokio::io::split(inbound);
    let (outbound_reader, outbound_writer) = tokio::io::split(outbound);
    let close = CloseSignal::new();

    let upstream = tokio::spawn(copy_until_closed(
        inbound_reader,
        outbound_writer,
        close.clone(),
        Direction::InboundToOutbound,
    ));
    let downstream = tokio::spawn(copy_until_closed(
        outbound_reader,
        inbound_writer,
        close.clone(),
        Direction::OutboundToInbound,
    ));

    let (upstream, downstream) = tokio::join!(upstream, downstream);
    // A panicking copy task has already dropped its halves; count it as zero
    RelayStats {
        inbound_to_outbound: upstream.unwrap_or_default(),
        outbound_to_inbound: downstream.unwrap_or_default(),
    }
}

async fn copy_until_closed<R, W>(
    mut reader: ReadHalf<R>,
    mut writer: WriteHalf<W>,
    close: CloseSignal,
    direction: Direction,
) -> u64
where
    R: AsyncRead,
    W: AsyncWrite,
{
    let mut total = 0u64;
    let copy = async {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => {
                    debug!(direction = direction.as_str(), "Stream reached end of file");
                    break;
                }
                Ok(n) => {
                    trace!(direction = direction.as_str(), bytes = n, "Forwarding data");
                    if let Err(e) = writer.write_all(&buffer[..n]).await {
                        debug!(direction = direction.as_str(), error = %e, "Failed to write");
                        break;
                    }
                    total += n as u64;
                }
                Err(e) => {
                    debug!(direction = direction.as_str(), error = %e, "Failed to read");
                    break;
                }
            }
        }
    };

    tokio::select! {
        () = copy => {}
        () = close.closed() => {}
    }

    if close.is_closed() {
        debug!(direction = direction.as_str(), "Peer direction closed the relay");
    } else {
        close.close();
    }
    // Best effort: the peer may already be gone
    let _ = writer.shutdown().await;
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::{io::duplex, time::timeout};

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn close_is_idempotent() {
        let close = CloseSignal::new();
        let other = close.clone();
        assert!(!close.is_closed());

        close.close();
        other.close();
        close.close();

        assert!(close.is_closed());
        assert!(other.is_closed());
    }

    #[tokio::test]
    async fn relays_both_directions() {
        let (mut client, inbound) = duplex(64);
        let (outbound, mut server) = duplex(64);
        let relay = tokio::spawn(run(inbound, outbound));

        client.write_all(b"request").await.unwrap();
        let mut buf = [0u8; 7];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"request");

        server.write_all(b"response!").await.unwrap();
        let mut buf = [0u8; 9];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"response!");

        drop(client);
        let stats = timeout(TEST_TIMEOUT, relay).await.unwrap().unwrap();
        assert_eq!(
            stats,
            RelayStats {
                inbound_to_outbound: 7,
                outbound_to_inbound: 9,
            }
        );
    }

    #[tokio::test]
    async fn inbound_close_tears_down_outbound() {
        let (client, inbound) = duplex(64);
        let (outbound, mut server) = duplex(64);
        let relay = tokio::spawn(run(inbound, outbound));

        drop(client);
        timeout(TEST_TIMEOUT, relay).await.unwrap().unwrap();

        // Outbound side observes EOF once the relay has dropped its halves
        let mut buf = Vec::new();
        let n = timeout(TEST_TIMEOUT, server.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn outbound_close_tears_down_inbound() {
        let (mut client, inbound) = duplex(64);
        let (outbound, server) = duplex(64);
        let relay = tokio::spawn(run(inbound, outbound));

        // Client keeps its write side open; only the destination goes away
        drop(server);
        timeout(TEST_TIMEOUT, relay).await.unwrap().unwrap();

        let mut buf = Vec::new();
        let n = timeout(TEST_TIMEOUT, client.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn streams_payloads_larger_than_the_buffer() {
        let (mut client, inbound) = duplex(1024);
        let (outbound, mut server) = duplex(1024);
        let relay = tokio::spawn(run(inbound, outbound));

        let payload: Vec<u8> = (0..BUFFER_SIZE * 8).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client.shutdown().await.unwrap();
            client
        });

        let mut received = Vec::new();
        timeout(TEST_TIMEOUT, server.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, expected);

        drop(writer.await.unwrap());
        let stats = timeout(TEST_TIMEOUT, relay).await.unwrap().unwrap();
        assert_eq!(stats.inbound_to_outbound, expected.len() as u64);
    }
}
