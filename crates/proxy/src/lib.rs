//! Client for the bot host's data endpoints.
//!
//! [`RemoteDataProxy`] forwards parameterised queries to `POST /query` and
//! decrypt requests to `POST /decrypt`, normalising the host's loosely shaped
//! responses into [`QueryOutcome`] (or `Option` for callers that only care
//! whether rows came back). Transport and decode failures are logged and never
//! escape as errors.

pub mod capabilities;
pub mod client;
pub mod error;
pub mod lookups;
pub mod outcome;
pub mod purge;

pub use {
    capabilities::{Capability, SchemaCapabilities},
    client::{BotIdentity, RemoteDataProxy},
    error::{Error, Result},
    outcome::{QueryOutcome, Row},
    purge::{PURGE_FAILED_MESSAGE, purge_success_message},
};
