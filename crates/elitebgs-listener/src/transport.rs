//! ZeroMQ subscription to the EDDN relay.

use tracing::info;
use zeromq::{Socket, SocketRecv, SubSocket, ZmqError};

/// A live subscription to every topic on the relay.
pub struct Subscription {
    socket: SubSocket,
    url: String,
}

impl Subscription {
    /// Connect to `url` and subscribe to all topics.
    ///
    /// # Errors
    ///
    /// Returns [`ZmqError`] if the endpoint is unreachable or the
    /// subscription cannot be registered.
    pub async fn connect(url: &str) -> Result<Self, ZmqError> {
        let mut socket = SubSocket::new();
        socket.connect(url).await?;
        socket.subscribe("").await?;
        info!(url, "subscribed to relay");
        Ok(Self {
            socket,
            url: url.to_owned(),
        })
    }

    /// Wait for the next frame.
    ///
    /// The relay publishes single-frame messages; any additional frames
    /// are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ZmqError`] if the socket fails.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ZmqError> {
        let message = self.socket.recv().await?;
        Ok(message
            .into_vec()
            .into_iter()
            .next()
            .map(|frame| frame.to_vec())
            .unwrap_or_default())
    }

    /// Relay endpoint this subscription is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the socket.
    pub async fn close(self) {
        let errors = self.socket.close().await;
        if !errors.is_empty() {
            tracing::debug!(url = %self.url, count = errors.len(), "errors while closing relay socket");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
