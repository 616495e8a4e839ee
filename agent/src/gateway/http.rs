//! HTTP gateway for a PostgREST-style remote store.

use super::{GatewayError, RemoteGateway};
use async_trait::async_trait;
use fieldsync_engine::{EntityClass, RemoteId, WriteMode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

const UPSERT_PREFER: &str = "resolution=merge-duplicates,missing=default,return=representation";
const INSERT_PREFER: &str = "missing=default,return=representation";

/// Remote gateway speaking the REST dialect of the hosted store.
///
/// Writes go to `POST {base}/rest/v1/{table}` with `select=id`, so the response
/// is the array of written identifiers in request order.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    bearer_token: Option<String>,
}

#[derive(Deserialize)]
struct IdRow {
    id: Value,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bearer_token: None,
        })
    }

    /// Authenticate writes as the signed-in user instead of the anonymous key.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn endpoint(&self, class: EntityClass) -> String {
        format!("{}/rest/v1/{}", self.base_url, class.remote_table())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }
        match self.bearer_token.as_ref().or(self.api_key.as_ref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Whether the remote store answers at all.
    pub async fn probe(&self) -> bool {
        let request = self.authorize(self.client.get(format!("{}/rest/v1/", self.base_url)));
        match request.send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::trace!(error = %e, "reachability probe failed");
                false
            }
        }
    }

    fn request(&self, class: EntityClass, body: &Value) -> reqwest::RequestBuilder {
        let mut request = self.client.post(self.endpoint(class));
        request = match class.write_mode() {
            WriteMode::Upsert => request
                .query(&[("on_conflict", "id"), ("select", "id")])
                .header("Prefer", UPSERT_PREFER),
            WriteMode::Insert => request
                .query(&[("select", "id")])
                .header("Prefer", INSERT_PREFER),
        };
        // Objects in one array must share their keys; `columns` lifts that
        // and lets `missing=default` fill the keys an object leaves out.
        if let Value::Array(objects) = body {
            if let Some(columns) = union_columns(objects) {
                request = request.query(&[("columns", columns)]);
            }
        }
        self.authorize(request).json(body)
    }

    async fn post(&self, class: EntityClass, body: &Value) -> Result<Vec<RemoteId>, GatewayError> {
        let response = self
            .request(class, body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        parse_ids(&text)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn upsert(
        &self,
        class: EntityClass,
        payload: Vec<Value>,
    ) -> Result<Vec<RemoteId>, GatewayError> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        let count = payload.len();
        let ids = self.post(class, &Value::Array(payload)).await?;
        tracing::debug!(class = %class, submitted = count, returned = ids.len(), "batch written");
        Ok(ids)
    }

    async fn insert(&self, class: EntityClass, payload: Value) -> Result<RemoteId, GatewayError> {
        let mut ids = self.post(class, &payload).await?;
        match (ids.pop(), ids.is_empty()) {
            (Some(id), true) => Ok(id),
            _ => Err(GatewayError::Malformed(
                "expected exactly one identifier".into(),
            )),
        }
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Comma-separated union of the keys of `objects`, sorted.
fn union_columns(objects: &[Value]) -> Option<String> {
    let keys: BTreeSet<&str> = objects
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|object| object.keys().map(String::as_str))
        .collect();
    if keys.is_empty() {
        return None;
    }
    Some(keys.into_iter().collect::<Vec<_>>().join(","))
}

/// Parse a `select=id` response body into identifiers.
///
/// Tables keyed by UUID return strings, tables keyed by a sequence return
/// numbers; both are kept as strings.
fn parse_ids(body: &str) -> Result<Vec<RemoteId>, GatewayError> {
    let rows: Vec<IdRow> =
        serde_json::from_str(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;

    rows.into_iter()
        .map(|row| match row.id {
            Value::String(id) => Ok(id),
            Value::Number(id) => Ok(id.to_string()),
            other => Err(GatewayError::Malformed(format!(
                "unexpected identifier {other}"
            ))),
        })
        .collect()
}
