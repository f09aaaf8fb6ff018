use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub invoice_upstream_url: String,
    pub waybill_upstream_url: String,
    pub upstream_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8071".into(),
            invoice_upstream_url: "https://einv.provider.example/api".into(),
            waybill_upstream_url: "https://ewb.provider.example/api".into(),
            upstream_timeout_seconds: 30,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = std::fs::read_to_string("gateway.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.bind_addr = v.clone();
            }
            if let Some(v) = file_cfg.get("invoice_upstream_url") {
                settings.invoice_upstream_url = v.clone();
            }
            if let Some(v) = file_cfg.get("waybill_upstream_url") {
                settings.waybill_upstream_url = v.clone();
            }
            if let Some(v) = file_cfg.get("upstream_timeout_seconds") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.upstream_timeout_seconds = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("GATEWAY_BIND") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Ok(v) = std::env::var("INVOICE_UPSTREAM_URL") {
        settings.invoice_upstream_url = v;
    }
    if let Ok(v) = std::env::var("APP__INVOICE_UPSTREAM_URL") {
        settings.invoice_upstream_url = v;
    }

    if let Ok(v) = std::env::var("WAYBILL_UPSTREAM_URL") {
        settings.waybill_upstream_url = v;
    }
    if let Ok(v) = std::env::var("APP__WAYBILL_UPSTREAM_URL") {
        settings.waybill_upstream_url = v;
    }

    if let Ok(v) = std::env::var("APP__UPSTREAM_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.upstream_timeout_seconds = parsed;
        }
    }

    settings.invoice_upstream_url = normalize_base_url(&settings.invoice_upstream_url);
    settings.waybill_upstream_url = normalize_base_url(&settings.waybill_upstream_url);
    settings
}

/// Upstream paths in the catalog are absolute, so the configured base must not
/// carry a trailing slash.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slashes_from_base_urls() {
        assert_eq!(
            normalize_base_url("https://einv.provider.example/api/"),
            "https://einv.provider.example/api"
        );
        assert_eq!(
            normalize_base_url("  http://127.0.0.1:9000// "),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn defaults_bind_locally() {
        let settings = Settings::default();
        assert_eq!(settings.bind_addr, "127.0.0.1:8071");
        assert_eq!(settings.upstream_timeout_seconds, 30);
    }
}
