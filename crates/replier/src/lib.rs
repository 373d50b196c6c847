//! Outbound reply dispatcher.
//!
//! Business logic hands replies to a [`ReplyDispatcher`] bound to the room an
//! event came from; the dispatcher drains them in FIFO order to the bot host's
//! `/reply` endpoint, never starting two attempts less than [`MIN_INTERVAL`]
//! apart.

pub mod dispatcher;
pub mod error;
pub mod message;
pub mod transport;

pub use {
    dispatcher::{DispatcherOptions, DispatcherState, MIN_INTERVAL, ReplyDispatcher},
    error::{Error, Result},
    message::{ImageSource, OutboundMessage, encode_png_base64},
    transport::{DeadLetterSink, HttpReplyTransport, ReplyTransport},
};
