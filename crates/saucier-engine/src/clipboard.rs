use async_trait::async_trait;

/// Host-provided copy surface. The engine only needs to hand text over and
/// learn whether it landed.
#[async_trait]
pub trait ClipboardSurface: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, thiserror::Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Accepts and discards writes; for hosts without a copy surface.
pub struct NullClipboard;

#[async_trait]
impl ClipboardSurface for NullClipboard {
    async fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
        Ok(())
    }
}
