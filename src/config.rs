//! Configuração do jobworker carregada a partir de `jobworker.toml`.
//!
//! A struct [`WorkerConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `JOBWORKER_TOKEN` e `JOBWORKER_URL` têm
//! precedência sobre o arquivo.
//!
//! TLS é opcional: com `tls_cert` e `tls_key` o servidor atende HTTPS;
//! `tls_ca_cert` e `tls_insecure` controlam a verificação no cliente.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "jobworker.toml";

/// Configuração de nível superior carregada de `jobworker.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Endereço em que o servidor escuta.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Token bearer exigido pelo servidor e enviado pelo cliente.
    #[serde(default)]
    pub auth_token: String,

    /// URL base usada pelos subcomandos do cliente.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Tempo máximo, em milissegundos, para drenar a saída após o fim do processo.
    #[serde(default = "default_output_drain_ms")]
    pub output_drain_ms: u64,

    /// Certificado PEM do servidor. Exige `tls_key`.
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    /// Chave privada PEM do servidor. Exige `tls_cert`.
    #[serde(default)]
    pub tls_key: Option<PathBuf>,

    /// CA extra (PEM) em que o cliente confia, p.ex. para um certificado autoassinado.
    #[serde(default)]
    pub tls_ca_cert: Option<PathBuf>,

    /// Desliga a verificação do certificado no cliente. Só para desenvolvimento.
    #[serde(default)]
    pub tls_insecure: bool,
}

// Valor padrão para o endereço de escuta: "127.0.0.1:8443".
fn default_listen_addr() -> String {
    "127.0.0.1:8443".to_string()
}

// Valor padrão para a URL do servidor.
fn default_server_url() -> String {
    "http://127.0.0.1:8443".to_string()
}

// Valor padrão para a drenagem de saída: 2000ms.
fn default_output_drain_ms() -> u64 {
    2000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            auth_token: String::new(),
            server_url: default_server_url(),
            output_drain_ms: default_output_drain_ms(),
            tls_cert: None,
            tls_key: None,
            tls_ca_cert: None,
            tls_insecure: false,
        }
    }
}

impl WorkerConfig {
    /// Carrega a configuração de `jobworker.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<WorkerConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("JOBWORKER_TOKEN").filter(|v| !v.is_empty()) {
            self.auth_token = token;
        }
        if let Some(url) = lookup("JOBWORKER_URL").filter(|v| !v.is_empty()) {
            self.server_url = url;
        }
    }

    pub fn output_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.output_drain_ms)
    }

    /// Par certificado/chave para servir HTTPS, ou `None` para HTTP puro.
    /// Configurar só um dos dois é erro.
    pub fn tls_identity(&self) -> Result<Option<(&Path, &Path)>> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            _ => bail!("`tls_cert` and `tls_key` must be set together"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8443");
        assert_eq!(config.server_url, "http://127.0.0.1:8443");
        assert_eq!(config.output_drain_ms, 2000);
        assert!(config.auth_token.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            auth_token = "secret-token-123"
            output_drain_ms = 500
        "#;
        let config: WorkerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.auth_token, "secret-token-123");
        assert_eq!(config.output_drain_timeout(), Duration::from_millis(500));
        assert_eq!(config.listen_addr, "127.0.0.1:8443");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr = \"0.0.0.0:9000\"").unwrap();

        let config = WorkerConfig::load_from(file.path()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr = [").unwrap();

        assert!(WorkerConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.output_drain_ms, 2000);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = WorkerConfig {
            auth_token: "from-file".into(),
            ..Default::default()
        };
        config.apply_env(|key| match key {
            "JOBWORKER_TOKEN" => Some("from-env".into()),
            "JOBWORKER_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.auth_token, "from-env");
        assert_eq!(config.server_url, "http://127.0.0.1:8443");
    }

    #[test]
    fn tls_is_off_by_default() {
        let config = WorkerConfig::default();
        assert!(config.tls_identity().unwrap().is_none());
        assert!(config.tls_ca_cert.is_none());
        assert!(!config.tls_insecure);
    }

    #[test]
    fn deserialize_tls_settings() {
        let toml_str = r#"
            tls_cert = "certs/server.crt"
            tls_key = "certs/server.key"
            tls_ca_cert = "certs/ca.crt"
            tls_insecure = true
        "#;
        let config: WorkerConfig = toml::from_str(toml_str).unwrap();
        let (cert, key) = config.tls_identity().unwrap().expect("tls configured");
        assert_eq!(cert, Path::new("certs/server.crt"));
        assert_eq!(key, Path::new("certs/server.key"));
        assert_eq!(config.tls_ca_cert.as_deref(), Some(Path::new("certs/ca.crt")));
        assert!(config.tls_insecure);
    }

    #[test]
    fn tls_cert_without_key_is_rejected() {
        let config = WorkerConfig {
            tls_cert: Some("server.crt".into()),
            ..Default::default()
        };
        let err = config.tls_identity().unwrap_err();
        assert!(err.to_string().contains("must be set together"));
    }
}
