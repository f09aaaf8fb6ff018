use std::{collections::HashMap, sync::Mutex};

use anyhow::anyhow;
use reqwest::{header, Client};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use shared::{
    catalog::{self, HttpMethod, ResponseKind},
    domain::{
        FieldMap, ProductTag, SessionCredential, WorkflowRecord, HEADER_AUTH_TOKEN,
        HEADER_COMPANY_ID, HEADER_PRODUCT,
    },
    envelope::{CallStatus, Envelope, UpstreamError},
    steps::{credential_key, StepKind},
};
use storage::{is_empty_value, ResolutionStore};

pub mod hydration;

pub use hydration::{rules_for, FieldRule};

#[derive(Debug, Error)]
pub enum StepError {
    #[error("no active {product} credential")]
    MissingCredential { product: ProductTag },
    #[error("required field '{field}' is missing")]
    MissingField { field: String },
    #[error("upstream rejected the request: {}", joined_errors(.errors))]
    Rejected { errors: Vec<UpstreamError> },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Per-step invocation counter. A response is persisted only if its
/// invocation is still the latest for that step.
#[derive(Default)]
struct Generations {
    inner: Mutex<HashMap<StepKind, u64>>,
}

impl Generations {
    fn begin(&self, step: StepKind) -> u64 {
        let mut current = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let counter = current.entry(step).or_insert(0);
        *counter += 1;
        *counter
    }

    fn is_current(&self, step: StepKind, token: u64) -> bool {
        let current = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        current.get(&step).copied() == Some(token)
    }
}

/// Client-side continuation engine: every document-lifecycle step runs
/// hydrate, edit, submit, persist against the gateway.
pub struct WorkflowClient {
    http: Client,
    gateway_url: String,
    store: ResolutionStore,
    generations: Generations,
}

impl WorkflowClient {
    pub fn new(gateway_url: impl Into<String>, store: ResolutionStore) -> Self {
        let mut gateway_url = gateway_url.into();
        while gateway_url.ends_with('/') {
            gateway_url.pop();
        }
        Self {
            http: Client::new(),
            gateway_url,
            store,
            generations: Generations::default(),
        }
    }

    pub fn store(&self) -> &ResolutionStore {
        &self.store
    }

    /// Persists the minted credential, which forcibly invalidates the other
    /// product's credential.
    pub async fn login(
        &self,
        product: ProductTag,
        email: &str,
        password: &str,
    ) -> Result<SessionCredential, StepError> {
        let url = format!("{}/proxy/{}/login", self.gateway_url, product);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;
        let envelope = parse_envelope(response).await?;
        match envelope.status {
            CallStatus::Success => {
                let fields = envelope.response.unwrap_or(Value::Null);
                let token = field_as_string(&fields, "token");
                let company_id = field_as_string(&fields, "companyId");
                if token.is_empty() {
                    return Err(StepError::Transport(
                        "login response carried no token".to_string(),
                    ));
                }
                if company_id.is_empty() {
                    return Err(StepError::Transport(
                        "login response carried no companyId".to_string(),
                    ));
                }
                let credential = SessionCredential::new(product, token, company_id);
                self.store.store_credential(&credential).await?;
                info!(%product, company_id = %credential.company_id, "logged in");
                Ok(credential)
            }
            CallStatus::Failure => Err(StepError::Rejected {
                errors: envelope.errors,
            }),
            CallStatus::Error => Err(StepError::Transport(envelope.error_summary())),
        }
    }

    pub async fn logout(&self, product: ProductTag) -> Result<(), StepError> {
        self.store.invalidate_credential(product).await?;
        info!(%product, "credential invalidated");
        Ok(())
    }

    /// Resolves every field in the step's table through its fallback chain.
    /// Form fields without a rule ride along untouched.
    pub async fn hydrate(&self, step: StepKind, form: &FieldMap) -> FieldMap {
        let mut payload = form.clone();
        for rule in hydration::rules_for(step) {
            let resolved = self.store.resolve(&rule.chain, form.get(rule.field)).await;
            payload.insert(rule.field.to_string(), resolved);
        }
        payload
    }

    /// Hydrates the form, submits through the gateway, and on SUCCESS persists
    /// the step's documented field subset under its conventional record key.
    /// On FAILURE or transport error the store is left untouched.
    pub async fn run_step(&self, step: StepKind, form: &FieldMap) -> Result<FieldMap, StepError> {
        let product = step.product();
        let credential = self
            .store
            .active_credential(product)
            .await
            .ok_or(StepError::MissingCredential { product })?;
        let generation = self.generations.begin(step);

        let payload = self.hydrate(step, form).await;
        for rule in hydration::rules_for(step) {
            if rule.required
                && payload
                    .get(rule.field)
                    .map(is_empty_value)
                    .unwrap_or(true)
            {
                return Err(StepError::MissingField {
                    field: rule.field.to_string(),
                });
            }
        }

        let op = catalog::lookup(product, step.operation_id())
            .ok_or_else(|| anyhow!("no catalog entry for {product}/{}", step.operation_id()))?;
        let url = format!("{}/proxy/{}/{}", self.gateway_url, product, op.id);
        let request = match op.method {
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Put => self.http.put(&url),
            HttpMethod::Get => self.http.get(&url),
        };
        let response = request
            .header(HEADER_AUTH_TOKEN, &credential.token)
            .header(HEADER_COMPANY_ID, &credential.company_id)
            .header(HEADER_PRODUCT, product.as_str())
            .json(&Value::Object(payload.clone()))
            .send()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;
        let envelope = parse_envelope(response).await?;

        match envelope.status {
            CallStatus::Success => {
                let response_fields = envelope
                    .response
                    .as_ref()
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let mut persisted = FieldMap::new();
                for name in step.persisted_fields() {
                    let value = response_fields
                        .get(*name)
                        .or_else(|| payload.get(*name))
                        .cloned()
                        .unwrap_or(Value::Null);
                    persisted.insert((*name).to_string(), value);
                }
                if self.generations.is_current(step, generation) {
                    let record = WorkflowRecord::new(persisted.clone(), credential_key(product));
                    self.store.put(step.record_key(), &record).await?;
                    info!(?step, key = step.record_key(), "workflow record persisted");
                } else {
                    debug!(?step, "stale response discarded, record not persisted");
                }
                Ok(persisted)
            }
            CallStatus::Failure => Err(StepError::Rejected {
                errors: envelope.errors,
            }),
            CallStatus::Error => Err(StepError::Transport(envelope.error_summary())),
        }
    }

    pub async fn download(
        &self,
        product: ProductTag,
        operation: &str,
        document_id: &str,
    ) -> Result<Document, StepError> {
        let op = catalog::lookup(product, operation)
            .ok_or_else(|| anyhow!("no catalog entry for {product}/{operation}"))?;
        if op.response_kind != ResponseKind::Binary {
            return Err(StepError::Internal(anyhow!(
                "operation '{product}/{operation}' is not a document retrieval"
            )));
        }
        let credential = self
            .store
            .active_credential(product)
            .await
            .ok_or(StepError::MissingCredential { product })?;

        let url = format!("{}/proxy/{}/{}", self.gateway_url, product, op.id);
        let response = self
            .http
            .get(&url)
            .query(&[("id", document_id)])
            .header(HEADER_AUTH_TOKEN, &credential.token)
            .header(HEADER_COMPANY_ID, &credential.company_id)
            .header(HEADER_PRODUCT, product.as_str())
            .send()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format!("{product}-{}-{document_id}.pdf", op.id));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;

        if !status.is_success() {
            return match serde_json::from_slice::<Envelope>(&bytes) {
                Ok(envelope) if envelope.status == CallStatus::Failure => Err(StepError::Rejected {
                    errors: envelope.errors,
                }),
                _ => Err(StepError::Transport(format!(
                    "document retrieval failed with status {status}"
                ))),
            };
        }

        Ok(Document {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

async fn parse_envelope(response: reqwest::Response) -> Result<Envelope, StepError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| StepError::Transport(e.to_string()))?;
    serde_json::from_slice::<Envelope>(&bytes).map_err(|_| {
        StepError::Transport(format!("gateway returned {status} with no envelope"))
    })
}

fn field_as_string(fields: &Value, name: &str) -> String {
    match fields.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn joined_errors(errors: &[UpstreamError]) -> String {
    errors
        .iter()
        .map(|e| e.msg.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn filename_from_disposition(disposition: &str) -> Option<String> {
    let (_, tail) = disposition.split_once("filename=\"")?;
    let (name, _) = tail.split_once('"')?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
