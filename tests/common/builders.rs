//! Test data builders and doubles shared by the integration suites.

#![allow(dead_code)]

use issuance_core::{ExecutionError, IssuanceConfig, OrchestrationPipeline};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Token deployment request as an HTTP handler would bind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub name: String,
    pub symbol: String,
    pub total_supply: u64,
    pub network: String,
    pub holders: Vec<String>,
    pub description: Option<String>,
}

/// Response returned by a successful deployment executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentReceipt {
    pub deployment_id: String,
    pub transaction_hash: String,
    pub symbol: String,
}

pub struct TokenRequestBuilder {
    request: TokenRequest,
}

impl TokenRequestBuilder {
    pub fn new() -> Self {
        Self {
            request: TokenRequest {
                name: "Acme Token".to_string(),
                symbol: "ACME".to_string(),
                total_supply: 1_000_000,
                network: "testnet".to_string(),
                holders: vec!["alice".to_string()],
                description: None,
            },
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.request.symbol = symbol.to_string();
        self
    }

    pub fn with_supply(mut self, total_supply: u64) -> Self {
        self.request.total_supply = total_supply;
        self
    }

    pub fn with_holders(mut self, holders: &[&str]) -> Self {
        self.request.holders = holders.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.request.description = description.map(str::to_string);
        self
    }

    pub fn build(self) -> TokenRequest {
        self.request
    }
}

impl Default for TokenRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation policy used across suites
pub fn validate_token_request(request: &TokenRequest) -> Option<String> {
    if request.symbol.trim().is_empty() {
        return Some("Token symbol is required".to_string());
    }
    if request.total_supply == 0 {
        return Some("Total supply must be positive".to_string());
    }
    None
}

pub fn no_preconditions(_request: &TokenRequest) -> Option<String> {
    None
}

/// Executor double counting invocations and returning a deterministic receipt
#[derive(Clone, Default)]
pub struct CountingExecutor {
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl CountingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: Arc::default(),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Deployment future owning its own handle on the call counter
    pub fn deploy(
        &self,
        request: TokenRequest,
    ) -> impl Future<Output = Result<DeploymentReceipt, ExecutionError>> + Send + 'static {
        let calls = Arc::clone(&self.calls);
        let delay = self.delay;
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(DeploymentReceipt {
                deployment_id: format!("dep-{}", request.symbol.to_lowercase()),
                transaction_hash: format!("0x{call:04x}"),
                symbol: request.symbol,
            })
        }
    }
}

pub fn default_pipeline() -> OrchestrationPipeline {
    OrchestrationPipeline::from_config(&IssuanceConfig::default())
}
