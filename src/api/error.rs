//! Erros do cliente HTTP do jobworker.
//!
//! [`ClientError`] separa respostas de erro do servidor (4xx/5xx) de falhas
//! na camada de rede. Usa `thiserror` para derivar `Display` e `Error`.

use std::path::PathBuf;

use thiserror::Error;

/// Erros que podem ocorrer ao falar com o servidor de jobs.
#[derive(Debug, Error)]
pub enum ClientError {
    /// O servidor respondeu com status diferente de 2xx.
    /// `message` vem do campo `error` do corpo JSON quando presente.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Não foi possível ler o certificado de CA configurado.
    #[error("failed to read CA certificate {}: {source}", path.display())]
    CaCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Network(err) => err.status().map(|s| s.as_u16()),
            ClientError::CaCert { .. } => None,
        }
    }
}
