use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::ids::SessionId;

/// An open incremental response: text fragments in arrival order, terminated
/// by the stream ending or yielding an error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("stream interrupted: {0}")]
    Interrupted(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// The response-generation boundary. Implementations own the wire protocol;
/// the engine only requires a cancellable chunked producer. The degraded
/// single-shot mode is obtained by taking the first value of a fresh call.
#[async_trait]
pub trait ResponseTransport: Send + Sync {
    async fn produce(
        &self,
        content: &str,
        session_id: &SessionId,
    ) -> Result<ChunkStream, TransportError>;
}
