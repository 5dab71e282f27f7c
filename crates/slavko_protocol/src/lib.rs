//! # slavko_protocol - The Slavko wire protocol for SlavkoShell
//!
//! The model's reply stream is ordinary prose interleaved with
//! line-delimited directives such as:
//!
//! ```text
//! {DEPLOY|INIT|READY|{provider:"vercel"}}
//! ```
//!
//! This crate owns everything between the raw token stream and the
//! subscribers that react to it:
//!
//! - **Message model** ([`message`]): the validated directive shape.
//! - **Line parser** ([`parser`]): one line in, a message or `None` out.
//! - **Stream processor** ([`stream`]): reassembles fragments into lines,
//!   routes prose and directives, honors mid-stream cancellation.
//! - **Bus** ([`bus`]): ordered, snapshot-on-emit pub/sub dispatch.

pub mod bus;
pub mod error;
pub mod message;
pub mod notify;
pub mod parser;
pub mod stream;

pub use bus::{ProtocolBus, Subscription};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Module, SlavkoMessage, Status};
pub use notify::{Notifier, NullNotifier, ToastLevel, TracingNotifier};
pub use parser::parse_line;
pub use stream::{process, StreamOutcome, StreamSink};
