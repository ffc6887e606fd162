use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Certificate, Client, Response};

use super::error::ClientError;
use super::types::{ErrorResponse, StartRequest, StopResponse};
use crate::state_machine::JobInfo;

/// How the client verifies an HTTPS server.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Extra PEM root certificate to trust, e.g. for a self-signed server.
    pub ca_cert: Option<PathBuf>,
    /// Skip certificate verification entirely.
    pub accept_invalid_certs: bool,
}

/// HTTP client for a running jobworker server.
pub struct JobClient {
    token: String,
    client: Client,
    base_url: String,
}

impl JobClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_tls(base_url, token, &TlsOptions::default())
    }

    pub fn with_tls(
        base_url: impl Into<String>,
        token: impl Into<String>,
        tls: &TlsOptions,
    ) -> Result<Self, ClientError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .danger_accept_invalid_certs(tls.accept_invalid_certs);
        if let Some(path) = &tls.ca_cert {
            let pem = std::fs::read(path).map_err(|source| ClientError::CaCert {
                path: path.clone(),
                source,
            })?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }
        let client = builder.build()?;
        Ok(Self {
            token: token.into(),
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn start(&self, command: &str, args: &[String]) -> Result<JobInfo, ClientError> {
        let req = StartRequest {
            command: command.to_string(),
            args: args.to_vec(),
        };
        let response = self
            .client
            .post(self.url("/jobs/start"))
            .bearer_auth(&self.token)
            .json(&req)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn stop(&self, id: &str) -> Result<StopResponse, ClientError> {
        let response = self
            .client
            .post(self.url("/jobs/stop"))
            .bearer_auth(&self.token)
            .query(&[("id", id)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn status(&self, id: &str) -> Result<JobInfo, ClientError> {
        let response = self
            .client
            .get(self.url("/jobs/status"))
            .bearer_auth(&self.token)
            .query(&[("id", id)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn output(&self, id: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(self.url("/jobs/output"))
            .bearer_auth(&self.token)
            .query(&[("id", id)])
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    pub async fn list(&self) -> Result<Vec<JobInfo>, ClientError> {
        let response = self
            .client
            .get(self.url("/jobs"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Turn any non-2xx response into [`ClientError::Api`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            error,
            details: Some(details),
        }) => format!("{error} ({details})"),
        Ok(ErrorResponse { error, .. }) => error,
        Err(_) => body,
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
