//! Backend line protocol → UI message stream translator.
//!
//! Bytes flow one way: upstream chunks are cut into lines by
//! [`codec::FrameDecoder`], parsed into typed frames, run through the
//! per-request [`session::StreamSession`] state machine, and written as SSE
//! by [`writer::SseWriter`]. [`lifecycle::drive_session`] owns the loop,
//! the deadline, cancellation, and the terminal sequence.

pub mod codec;
pub mod error;
pub mod lifecycle;
pub mod session;
pub mod upstream;
pub mod writer;

pub use error::{ConnectError, SessionError};
pub use lifecycle::{translate, SessionOptions, SessionOutcome, SessionReport, Translation};
pub use session::{IdGen, StreamSession};
pub use upstream::{UpstreamClient, UpstreamResponse};
