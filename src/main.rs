mod cli;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use console::Style;
use jobworker::api::{JobClient, TlsOptions};
use jobworker::config::WorkerConfig;
use jobworker::{server, ui};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => WorkerConfig::load_from(path)?,
        None => WorkerConfig::load()?,
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(token) = cli.token {
        config.auth_token = token;
    }
    if let Some(ca_cert) = cli.ca_cert {
        config.tls_ca_cert = Some(ca_cert);
    }
    config.tls_insecure |= cli.insecure;

    match cli.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            server::serve(&config).await
        }
        command => {
            let tls = TlsOptions {
                ca_cert: config.tls_ca_cert.clone(),
                accept_invalid_certs: config.tls_insecure,
            };
            let client = JobClient::with_tls(
                config.server_url.as_str(),
                config.auth_token.as_str(),
                &tls,
            )
            .context("failed to build HTTP client")?;
            run_client(&client, command).await
        }
    }
}

async fn run_client(client: &JobClient, command: Command) -> Result<()> {
    match command {
        Command::Serve { .. } => bail!("`serve` runs the server, it is not a client command"),
        Command::Start { command, args } => {
            let info = client.start(&command, &args).await?;
            println!(
                "{} Job started: {}",
                Style::new().green().apply_to("✓"),
                info.id
            );
        }
        Command::Stop { id } => {
            let stopped = client.stop(&id).await?;
            println!(
                "Job {} is {}",
                stopped.id,
                ui::status_style(stopped.status).apply_to(stopped.status)
            );
        }
        Command::Status { id, wait } => {
            let mut info = client.status(&id).await?;
            if wait && !info.status.is_terminal() {
                let watch = ui::StatusWatch::start(&id);
                while !info.status.is_terminal() {
                    watch.update(&info);
                    tokio::time::sleep(POLL_INTERVAL).await;
                    info = client.status(&id).await?;
                }
                watch.finish();
            }
            ui::print_job(&info);
        }
        Command::Logs { id } => {
            let output = client.output(&id).await?;
            ui::print_output(&output)?;
        }
        Command::List => {
            let jobs = client.list().await?;
            ui::print_jobs(&jobs);
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "jobworker=debug,tower_http=debug"
    } else {
        "jobworker=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
