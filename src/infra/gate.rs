//! reCAPTCHA-backed abuse gate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url, header::CONTENT_TYPE};
use serde::Deserialize;

use crate::application::gate::{AbuseGate, GateError, GateVerdict};

pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RecaptchaGate {
    client: Client,
    verify_url: Url,
    secret: String,
}

impl RecaptchaGate {
    pub fn new(secret: String, verify_url: Url, timeout: Duration) -> Result<Self, GateError> {
        let client = Client::builder()
            .user_agent(concat!("gopherpods/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| GateError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            verify_url,
            secret,
        })
    }

    fn form_body(&self, token: &str, client_address: Option<&str>) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("secret", &self.secret);
        form.append_pair("response", token);
        if let Some(address) = client_address {
            form.append_pair("remoteip", address);
        }
        form.finish()
    }
}

#[async_trait]
impl AbuseGate for RecaptchaGate {
    async fn verify(
        &self,
        token: &str,
        client_address: Option<&str>,
    ) -> Result<GateVerdict, GateError> {
        let response = self
            .client
            .post(self.verify_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.form_body(token, client_address))
            .send()
            .await
            .map_err(|err| GateError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Response(format!(
                "verifier answered with status {status}"
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|err| GateError::Response(err.to_string()))?;
        Ok(verdict(body))
    }
}

fn verdict(body: VerifyResponse) -> GateVerdict {
    if body.success {
        GateVerdict::Passed
    } else {
        GateVerdict::Rejected {
            reasons: body.error_codes,
        }
    }
}
