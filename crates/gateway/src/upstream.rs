use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, Method,
};
use serde_json::Value;
use tracing::debug;

use shared::{
    catalog::{HttpMethod, OperationSpec, ResponseKind},
    domain::{ProductTag, HEADER_AUTH_TOKEN, HEADER_COMPANY_ID, HEADER_PRODUCT},
};

use crate::config::Settings;

/// What came back from the provider. `body: None` means the upstream answered
/// with no parseable JSON body.
pub enum UpstreamReply {
    Json { status: u16, body: Option<Value> },
    Binary {
        status: u16,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Stateless pass-through to the per-product upstream base URL.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    invoice_base: String,
    waybill_base: String,
}

impl UpstreamClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.upstream_timeout_seconds))
            .build()
            .context("failed to build upstream http client")?;
        Ok(Self {
            http,
            invoice_base: settings.invoice_upstream_url.clone(),
            waybill_base: settings.waybill_upstream_url.clone(),
        })
    }

    fn base_for(&self, product: ProductTag) -> &str {
        match product {
            ProductTag::Invoice => &self.invoice_base,
            ProductTag::Waybill => &self.waybill_base,
        }
    }

    pub async fn forward(
        &self,
        op: &OperationSpec,
        headers: &HeaderMap,
        query: Option<&str>,
        body: &[u8],
    ) -> Result<UpstreamReply> {
        let mut url = format!("{}{}", self.base_for(op.product), op.upstream_path);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        debug!(operation = op.id, %url, "forwarding upstream");

        let method = match op.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        };
        let mut request = self.http.request(method, &url);

        // Credential headers pass through untouched; content negotiation is
        // fixed per operation.
        for name in [HEADER_AUTH_TOKEN, HEADER_COMPANY_ID, HEADER_PRODUCT] {
            if let Some(value) = headers.get(name) {
                request = request.header(name, value.as_bytes());
            }
        }
        request = match op.response_kind {
            ResponseKind::Json => request.header(ACCEPT, "application/json"),
            ResponseKind::Binary => request.header(ACCEPT, "application/pdf"),
        };
        if !body.is_empty() {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request.send().await.context("upstream request failed")?;
        let status = response.status().as_u16();

        if op.response_kind == ResponseKind::Binary && response.status().is_success() {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = response
                .bytes()
                .await
                .context("failed to read upstream document bytes")?
                .to_vec();
            return Ok(UpstreamReply::Binary {
                status,
                content_type,
                bytes,
            });
        }

        let bytes = response
            .bytes()
            .await
            .context("failed to read upstream response body")?;
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes).ok()
        };
        Ok(UpstreamReply::Json { status, body })
    }
}
