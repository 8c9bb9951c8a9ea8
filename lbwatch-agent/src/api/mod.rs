//! Load-balancer pools API: wire models and the paginated fetcher

mod fetcher;

pub use fetcher::{FetchError, PoolFetcher, PoolSource, MAX_PAGES};

use serde::{Deserialize, Serialize};

/// A named group of origin servers behind a health-checked load balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub origins: Vec<Origin>,
    /// Aggregate health; absent until the first health check completes
    #[serde(default)]
    pub healthy: Option<bool>,
}

/// One backend server entry within a pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub healthy: Option<bool>,
}

impl Origin {
    /// Name, else address, ignoring empty strings
    pub fn label(&self) -> Option<&str> {
        non_empty(self.name.as_deref()).or_else(|| non_empty(self.address.as_deref()))
    }

    pub fn is_disabled(&self) -> bool {
        self.enabled == Some(false)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Envelope of one page of `GET /accounts/{id}/load_balancers/pools`
#[derive(Debug, Deserialize)]
pub struct PoolsResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Vec<Pool>>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

impl PoolsResponse {
    /// Human readable summary of the `errors` field
    pub fn error_summary(&self) -> String {
        let Some(errors) = &self.errors else {
            return "request was not successful".to_string();
        };

        if let Some(list) = errors.as_array() {
            let parts: Vec<String> = list
                .iter()
                .filter_map(|e| {
                    let message = e.get("message")?.as_str()?;
                    Some(match e.get("code") {
                        Some(code) => format!("{}: {}", code, message),
                        None => message.to_string(),
                    })
                })
                .collect();
            if !parts.is_empty() {
                return parts.join("; ");
            }
            if list.is_empty() {
                return "request was not successful".to_string();
            }
        }

        errors.to_string()
    }
}
