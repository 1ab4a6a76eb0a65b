//! Wire vocabularies on both sides of the relay.
//!
//! - [`frames`]: the compact line protocol spoken by the inference backend
//!   (`<tag>:<json>` per line).
//! - [`ui`]: the UI message events sent to the browser.
//! - [`sse`]: how a UI event is framed as Server-Sent-Events bytes.

pub mod frames;
pub mod sse;
pub mod ui;

pub use frames::{FrameError, FrameTag, RawFrame, UpstreamEvent};
pub use ui::UiEvent;
