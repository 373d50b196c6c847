//! Inbound HTTP gateway.
//!
//! Accepts chat events from the bot host on `POST /db`, answers immediately,
//! and hands each accepted event to an [`InboundHandler`] together with a
//! reply dispatcher bound to the event's chat and the shared data proxy.

pub mod handler;
#[cfg(feature = "metrics")]
pub mod metrics_middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use {
    handler::{Command, CommandHandler, InboundContext, InboundHandler},
    server::{build_app, serve, start_gateway},
    state::AppState,
};
