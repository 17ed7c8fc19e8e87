//! Pre-programmed transport for deterministic testing without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::ids::SessionId;
use crate::transport::{ChunkStream, ResponseTransport, TransportError};

/// One scripted reply, consumed per `produce` call.
pub enum ScriptedReply {
    /// Yield each chunk, then end normally.
    Chunks(Vec<String>),
    /// Yield each chunk, then fail mid-stream.
    ErrorAfter(Vec<String>, TransportError),
    /// Fail the `produce` call itself.
    Refuse(TransportError),
    /// Open successfully but never yield; only cancellation ends it.
    Stall,
    /// Wait before serving the inner reply.
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    /// Convenience: a whole response split into word-sized chunks.
    pub fn text(text: &str) -> Self {
        Self::Chunks(
            text.split_inclusive(' ')
                .map(|part| part.to_string())
                .collect(),
        )
    }

    pub fn delayed(delay: Duration, inner: ScriptedReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Transport that plays replies in sequence. Running out of replies refuses
/// the call, which surfaces as a loud test failure rather than a hang.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `produce` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResponseTransport for ScriptedTransport {
    async fn produce(
        &self,
        _content: &str,
        _session_id: &SessionId,
    ) -> Result<ChunkStream, TransportError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut reply = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Connect("no scripted reply left".into()))?;

        while let ScriptedReply::Delay(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }

        match reply {
            ScriptedReply::Chunks(chunks) => Ok(Box::pin(stream::iter(
                chunks.into_iter().map(Ok::<_, TransportError>),
            ))),
            ScriptedReply::ErrorAfter(chunks, error) => {
                let head = stream::iter(chunks.into_iter().map(Ok::<_, TransportError>));
                let tail = stream::iter(vec![Err::<String, _>(error)]);
                Ok(Box::pin(head.chain(tail)))
            }
            ScriptedReply::Refuse(error) => Err(error),
            ScriptedReply::Stall => {
                Ok(Box::pin(stream::pending::<Result<String, TransportError>>()))
            }
            ScriptedReply::Delay(..) => unreachable!("delays unwrapped above"),
        }
    }
}
