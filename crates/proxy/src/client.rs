use std::{
    sync::RwLock,
    time::{Duration, Instant},
};

use {
    chatrelay_protocol::{DecryptRequest, DecryptResponse, QueryRequest, QueryResponse, paths},
    serde_json::Value,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use chatrelay_metrics::{counter, histogram, labels, proxy as proxy_metrics};

use crate::{
    capabilities::SchemaCapabilities,
    error::{Error, Result},
    outcome::{QueryOutcome, Row},
};

/// Account the bot posts as. `id` is the default decrypt key owner and
/// `name` is reported for the bot's own messages.
#[derive(Debug, Clone, Default)]
pub struct BotIdentity {
    pub id: String,
    pub name: String,
}

/// Client for the bot host's `/query` and `/decrypt` endpoints.
///
/// Holds no lock across a request; safe to share behind an `Arc`.
pub struct RemoteDataProxy {
    http: reqwest::Client,
    base_url: String,
    identity: BotIdentity,
    pub(crate) capabilities: RwLock<Option<SchemaCapabilities>>,
}

impl RemoteDataProxy {
    pub fn new(base_url: &str, identity: BotIdentity, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external("failed to build HTTP client", e))?;
        Ok(Self::with_client(http, base_url, identity))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, identity: BotIdentity) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
            capabilities: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run `query` against the default `/query` endpoint.
    pub async fn execute(&self, query: &str, bind: Option<&[Value]>) -> QueryOutcome {
        self.execute_at(paths::QUERY, query, bind).await
    }

    /// Run `query` against `endpoint` (a path below the base URL). `bind`
    /// values fill `?` placeholders positionally; the query text is sent as is.
    pub async fn execute_at(
        &self,
        endpoint: &str,
        query: &str,
        bind: Option<&[Value]>,
    ) -> QueryOutcome {
        let started = Instant::now();
        let outcome = match self.post_query(endpoint, query, bind).await {
            Ok(response) => QueryOutcome::from_response(response),
            Err(e) => QueryOutcome::Failed(e),
        };

        if let QueryOutcome::Failed(e) = &outcome {
            warn!(endpoint, error = %e, "query failed");
        } else {
            debug!(
                endpoint,
                outcome = outcome.label(),
                elapsed_ms = started.elapsed().as_millis(),
                "query completed"
            );
        }

        #[cfg(feature = "metrics")]
        {
            counter!(proxy_metrics::QUERIES_TOTAL, labels::OUTCOME => outcome.label())
                .increment(1);
            histogram!(proxy_metrics::QUERY_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
        }

        outcome
    }

    /// Optional-result form of [`Self::execute`]: failures and empty results
    /// both yield `None`.
    pub async fn execute_query(&self, query: &str, bind: Option<&[Value]>) -> Option<Vec<Row>> {
        self.execute(query, bind).await.into_rows()
    }

    pub async fn execute_query_at(
        &self,
        endpoint: &str,
        query: &str,
        bind: Option<&[Value]>,
    ) -> Option<Vec<Row>> {
        self.execute_at(endpoint, query, bind).await.into_rows()
    }

    async fn post_query(
        &self,
        endpoint: &str,
        query: &str,
        bind: Option<&[Value]>,
    ) -> Result<QueryResponse> {
        let resp = self
            .http
            .post(self.url(endpoint))
            .json(&QueryRequest { query, bind })
            .send()
            .await?;
        check_status(resp).await?.json().await.map_err(Into::into)
    }

    /// Decrypt `ciphertext` with the key of `user_id` (the bot's own id when
    /// `None`). Empty plaintext and every failure yield `None`.
    pub async fn decrypt(
        &self,
        enc_type: i64,
        ciphertext: &str,
        user_id: Option<&str>,
    ) -> Option<String> {
        let user_id = user_id.unwrap_or(&self.identity.id);
        let result = self.post_decrypt(enc_type, ciphertext, user_id).await;

        #[cfg(feature = "metrics")]
        {
            let success = matches!(&result, Ok(Some(_)));
            counter!(
                proxy_metrics::DECRYPTS_TOTAL,
                labels::SUCCESS => if success { "true" } else { "false" }
            )
            .increment(1);
        }

        match result {
            Ok(Some(plain)) => Some(plain),
            Ok(None) => {
                warn!(enc_type, "decrypt returned no plaintext");
                None
            },
            Err(e) => {
                warn!(enc_type, error = %e, "decrypt failed");
                None
            },
        }
    }

    async fn post_decrypt(
        &self,
        enc: i64,
        b64_ciphertext: &str,
        user_id: &str,
    ) -> Result<Option<String>> {
        let resp = self
            .http
            .post(self.url(paths::DECRYPT))
            .json(&DecryptRequest {
                enc,
                b64_ciphertext,
                user_id,
            })
            .send()
            .await?;
        let body: DecryptResponse = check_status(resp).await?.json().await?;
        Ok(body.plain_text.filter(|text| !text.is_empty()))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}
