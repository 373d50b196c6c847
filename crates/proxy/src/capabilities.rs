//! Runtime detection of the remote store's schema generation.
//!
//! Newer bot hosts attach an `open_chat_member` table that carries per-room
//! nicknames; older ones only have `friends`. The probe result is cached per
//! proxy until [`RemoteDataProxy::invalidate_capabilities`] is called.

use tracing::{debug, info};

#[cfg(feature = "metrics")]
use chatrelay_metrics::{counter, labels, proxy as proxy_metrics};

use crate::{client::RemoteDataProxy, outcome::QueryOutcome};

pub(crate) const OPEN_CHAT_MEMBER_PROBE: &str =
    "SELECT name FROM db2.sqlite_master WHERE type='table' AND name='open_chat_member'";

/// A schema feature that changes which query shape is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    OpenChatMember,
}

/// Cached probe results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCapabilities {
    pub has_open_chat_member: bool,
}

impl SchemaCapabilities {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::OpenChatMember => self.has_open_chat_member,
        }
    }
}

impl RemoteDataProxy {
    /// Whether the remote store supports `capability`. Probes on first use;
    /// a failed probe reports `false` and is retried next time.
    pub async fn schema_has_capability(&self, capability: Capability) -> bool {
        self.capabilities()
            .await
            .is_some_and(|caps| caps.has(capability))
    }

    /// Cached capabilities, probing when nothing is cached. `None` when the
    /// probe itself failed.
    pub async fn capabilities(&self) -> Option<SchemaCapabilities> {
        let cached = *self
            .capabilities
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if cached.is_some() {
            return cached;
        }

        let probed = self.probe_capabilities().await?;
        *self
            .capabilities
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(probed);
        Some(probed)
    }

    /// Forget cached capabilities so the next lookup probes again.
    pub fn invalidate_capabilities(&self) {
        *self
            .capabilities
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        debug!("schema capabilities invalidated");
    }

    async fn probe_capabilities(&self) -> Option<SchemaCapabilities> {
        let outcome = self.execute(OPEN_CHAT_MEMBER_PROBE, None).await;

        #[cfg(feature = "metrics")]
        counter!(proxy_metrics::CAPABILITY_PROBES_TOTAL, labels::OUTCOME => outcome.label())
            .increment(1);

        let has_open_chat_member = match outcome {
            QueryOutcome::Rows(_) => true,
            QueryOutcome::Empty => false,
            QueryOutcome::Failed(_) => return None,
        };
        info!(has_open_chat_member, "probed remote schema");
        Some(SchemaCapabilities {
            has_open_chat_member,
        })
    }
}
