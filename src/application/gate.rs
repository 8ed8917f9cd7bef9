//! Abuse gate consulted before a submission is accepted.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Passed,
    Rejected { reasons: Vec<String> },
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("verification request failed: {0}")]
    Transport(String),
    #[error("verification response could not be read: {0}")]
    Response(String),
}

#[async_trait]
pub trait AbuseGate: Send + Sync {
    /// Verify a client token. `client_address` is forwarded to the verifier when known.
    async fn verify(
        &self,
        token: &str,
        client_address: Option<&str>,
    ) -> Result<GateVerdict, GateError>;
}

/// Gate used for local development. Passes every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct BypassGate;

#[async_trait]
impl AbuseGate for BypassGate {
    async fn verify(
        &self,
        _token: &str,
        _client_address: Option<&str>,
    ) -> Result<GateVerdict, GateError> {
        Ok(GateVerdict::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bypass_passes_without_token() {
        let verdict = BypassGate.verify("", None).await.expect("verdict");
        assert!(verdict.passed());
    }
}
