//! Interface de linha de comando do jobworker baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, start, stop,
//! status, logs, list) e flags globais (--config, --server, --token,
//! --ca-cert, --insecure, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jobworker: executa comandos como jobs supervisionados em segundo plano.
#[derive(Debug, Parser)]
#[command(name = "jobworker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./jobworker.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// URL base do servidor de jobs.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Token bearer para autenticação.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// CA (PEM) em que o cliente confia ao falar HTTPS com o servidor.
    #[arg(long, global = true)]
    pub ca_cert: Option<PathBuf>,

    /// Aceita qualquer certificado do servidor (apenas desenvolvimento).
    #[arg(long, global = true, default_value_t = false)]
    pub insecure: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia o servidor HTTP de jobs.
    Serve {
        /// Endereço de escuta (sobrepõe `listen_addr` do arquivo).
        #[arg(long)]
        listen: Option<String>,
    },

    /// Inicia um job com o comando e argumentos fornecidos.
    Start {
        /// Executável a rodar.
        command: String,

        /// Argumentos repassados literalmente, sem shell.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Interrompe um job em execução.
    Stop {
        /// Identificador do job.
        id: String,
    },

    /// Mostra o status de um job.
    Status {
        /// Identificador do job.
        id: String,

        /// Aguarda até o job chegar a um estado terminal.
        #[arg(long, default_value_t = false)]
        wait: bool,
    },

    /// Mostra a saída capturada de um job.
    Logs {
        /// Identificador do job.
        id: String,
    },

    /// Lista todos os jobs conhecidos pelo servidor.
    List,
}
