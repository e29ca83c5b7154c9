//! Chat service configuration

use serde::{Deserialize, Serialize};

/// Service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Page size applied when a list request carries no `limit`
    pub default_page_limit: usize,
    /// Hard cap on requested page sizes
    pub max_page_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            default_page_limit: 50,
            max_page_limit: 200,
        }
    }
}

impl ServiceConfig {
    /// Socket address string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Clamp a requested page size to the configured bounds
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_limit)
            .clamp(1, self.max_page_limit)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default_page_limit == 0 {
            return Err("default_page_limit must be > 0".to_string());
        }
        if self.max_page_limit < self.default_page_limit {
            return Err("max_page_limit must be >= default_page_limit".to_string());
        }
        Ok(())
    }
}
