use serde_json::Value;

use shared::domain::ProductTag;

/// Credential attributes a fallback chain may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Token,
    CompanyId,
}

/// One probe in a fallback chain.
#[derive(Debug, Clone)]
pub enum FieldSource {
    Record { key: String, field: String },
    Credential {
        product: ProductTag,
        field: CredentialField,
    },
}

/// Ordered source list for one field. `default` terminates resolution, so an
/// unresolved field yields the default rather than an error.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    pub sources: Vec<FieldSource>,
    pub default: Value,
}

impl FallbackChain {
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            sources: Vec::new(),
            default: default.into(),
        }
    }

    pub fn empty_default() -> Self {
        Self::new("")
    }

    pub fn then_record(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.sources.push(FieldSource::Record {
            key: key.into(),
            field: field.into(),
        });
        self
    }

    pub fn then_credential(mut self, product: ProductTag, field: CredentialField) -> Self {
        self.sources.push(FieldSource::Credential { product, field });
        self
    }
}

/// Emptiness sentinel shared by resolver and hydration: null, blank strings,
/// and empty collections are empty; numbers and booleans never are.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emptiness_sentinel() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!("   ")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));

        assert!(!is_empty_value(&json!("IRN123")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!(["x"])));
    }

    #[test]
    fn chains_build_in_probe_order() {
        let chain = FallbackChain::empty_default()
            .then_record("workflow/last_issued_invoice", "irn")
            .then_credential(ProductTag::Invoice, CredentialField::CompanyId);
        assert_eq!(chain.sources.len(), 2);
        assert!(matches!(chain.sources[0], FieldSource::Record { .. }));
        assert!(matches!(chain.sources[1], FieldSource::Credential { .. }));
        assert_eq!(chain.default, json!(""));
    }
}
