pub mod clipboard;
pub mod orchestrator;
pub mod streaming;

pub use clipboard::{ClipboardError, ClipboardSurface, NullClipboard};
pub use orchestrator::ChatOrchestrator;
pub use streaming::{SendOutcome, StreamingController};
