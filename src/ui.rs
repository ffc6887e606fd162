//! Interface de terminal do jobworker: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`StatusWatch`] acompanha visualmente
//! um job até ele chegar a um estado terminal.

use std::io::Write;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{JobInfo, JobStatus};

/// Estilo de cor associado a cada status.
pub fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Running => Style::new().cyan(),
        JobStatus::Completed => Style::new().green().bold(),
        JobStatus::Failed => Style::new().red().bold(),
        JobStatus::Stopped => Style::new().yellow(),
    }
}

/// Indicador visual enquanto se aguarda o fim de um job.
pub struct StatusWatch {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
}

impl StatusWatch {
    /// Inicia o spinner com o identificador do job.
    pub fn start(id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("waiting for job {id}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// Atualiza a mensagem do spinner com o status atual.
    pub fn update(&self, info: &JobInfo) {
        self.pb
            .set_message(format!("job {} is {}", info.id, info.status));
    }

    /// Finaliza o spinner.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

// Limpa a linha do spinner mesmo quando a espera termina com erro.
impl Drop for StatusWatch {
    fn drop(&mut self) {
        self.pb.finish_and_clear();
    }
}

/// Imprime o resumo de um job.
pub fn print_job(info: &JobInfo) {
    let label = Style::new().dim();
    println!("{} {}", label.apply_to("id:      "), info.id);
    println!(
        "{} {}",
        label.apply_to("status:  "),
        status_style(info.status).apply_to(info.status)
    );
    println!(
        "{} {} {}",
        label.apply_to("command: "),
        info.command,
        info.args.join(" ")
    );
    println!("{} {}", label.apply_to("started: "), info.start_time.to_rfc3339());
    if let Some(finished) = info.finished_at {
        println!("{} {}", label.apply_to("finished:"), finished.to_rfc3339());
    }
    if let Some(code) = info.exit_code {
        println!("{} {code}", label.apply_to("exit:    "));
    }
    if let Some(error) = &info.error {
        println!("{} {}", label.apply_to("error:   "), Style::new().red().apply_to(error));
    }
}

/// Imprime uma linha por job.
pub fn print_jobs(jobs: &[JobInfo]) {
    if jobs.is_empty() {
        println!("No jobs.");
        return;
    }
    for info in jobs {
        println!(
            "{}  {:<9}  {} {}",
            info.id,
            status_style(info.status).apply_to(info.status),
            info.command,
            info.args.join(" ")
        );
    }
}

/// Escreve a saída bruta do job em stdout, sem reinterpretar bytes.
pub fn print_output(output: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output)?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_watch_clears_spinner() {
        let watch = StatusWatch::start("some-job");
        let pb = watch.pb.clone();
        assert!(!pb.is_finished());

        drop(watch);
        assert!(pb.is_finished());
    }

    #[test]
    fn finish_then_drop_is_harmless() {
        let watch = StatusWatch::start("some-job");
        let pb = watch.pb.clone();
        watch.finish();
        drop(watch);
        assert!(pb.is_finished());
    }
}
