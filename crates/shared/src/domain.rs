use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Loosely-typed payload map used at every provider boundary.
pub type FieldMap = Map<String, Value>;

/// The two independent document-issuing product lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductTag {
    Invoice,
    Waybill,
}

impl ProductTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductTag::Invoice => "invoice",
            ProductTag::Waybill => "waybill",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "invoice" => Some(ProductTag::Invoice),
            "waybill" => Some(ProductTag::Waybill),
            _ => None,
        }
    }

    /// Logging into one product invalidates the other product's credential.
    pub fn other(self) -> Self {
        match self {
            ProductTag::Invoice => ProductTag::Waybill,
            ProductTag::Waybill => ProductTag::Invoice,
        }
    }
}

impl std::fmt::Display for ProductTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most one live credential per product tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCredential {
    pub token: String,
    pub company_id: String,
    pub product: ProductTag,
    pub session_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl SessionCredential {
    pub fn new(product: ProductTag, token: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            company_id: company_id.into(),
            product,
            session_id: Uuid::new_v4(),
            issued_at: Utc::now(),
        }
    }
}

/// Fields produced by one workflow step for consumption by later steps.
/// Superseded wholesale by the next successful run of the same step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub fields: FieldMap,
    pub created_at: DateTime<Utc>,
    pub credential_key: String,
}

impl WorkflowRecord {
    pub fn new(fields: FieldMap, credential_key: impl Into<String>) -> Self {
        Self {
            fields,
            created_at: Utc::now(),
            credential_key: credential_key.into(),
        }
    }
}

/// Header names the gateway and workflow client agree on. Lowercase so they
/// are valid `HeaderName` input on both sides.
pub const HEADER_AUTH_TOKEN: &str = "x-auth-token";
pub const HEADER_COMPANY_ID: &str = "companyid";
pub const HEADER_PRODUCT: &str = "product";
