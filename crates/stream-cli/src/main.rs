mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use stream_core::{
    CheckResult, HttpProbe, Monitor, NotificationStatus, NotifierSet, RunReport, SmtpNotifier,
    Verdict, WebhookNotifier,
};

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        // Called once by clap; the string lives for the whole program.
        Box::leak(VERSION.to_string().into_boxed_str())
    } else {
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Icecast stream checker: verify streams are reachable and not silent.
#[derive(Parser)]
#[command(name = "streamchecker", version = version_string(), about)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, default_value = "streamchecker.toml")]
    config: PathBuf,

    /// Send the report even when every stream is alive.
    #[arg(short = 'f', long)]
    force_email: bool,

    /// Include successful checks in the report and log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Number of endpoints checked in parallel. Overrides config file.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app_config = match config::AppConfig::load(&cli.config) {
        Ok(c) => {
            init_tracing(&c.logging.log_format, cli.verbose);
            tracing::debug!(path = %cli.config.display(), "Loaded config file");
            c
        }
        Err(e) => {
            init_tracing("pretty", cli.verbose);
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut checker_config = app_config.to_checker_config().with_verbose(cli.verbose);
    if app_config.checker.instance_name.is_none() {
        if let Some(name) = config::system_hostname() {
            checker_config = checker_config.with_instance_name(name);
        }
    }
    if let Some(n) = cli.concurrency {
        checker_config = checker_config.with_max_concurrent_checks(n);
    }

    let mut notifiers = NotifierSet::new();
    if let Some(ref email) = app_config.email {
        notifiers.push(Arc::new(SmtpNotifier::new(email.mail.clone())));
    }
    if !app_config.webhook.is_empty() {
        let client = HttpProbe::build_client(checker_config.request_timeout);
        notifiers.push(Arc::new(WebhookNotifier::new(
            app_config.webhook.clone(),
            client,
        )));
    }

    let total = checker_config.endpoint_count() as u64;
    let (result_tx, result_rx) = tokio::sync::mpsc::unbounded_channel();

    let mut monitor = Monitor::from_config(checker_config).with_result_tx(result_tx);
    if !notifiers.is_empty() {
        monitor = monitor.with_notifier(Arc::new(notifiers));
    }

    let progress = if cli.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
                .expect("valid template"),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        bar
    };
    let progress_task = tokio::spawn(track_progress(result_rx, progress.clone()));

    let report = monitor
        .run_pass_until(cli.force_email, shutdown_signal())
        .await;

    drop(monitor);
    let _ = progress_task.await;
    progress.finish_and_clear();

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
        }
    } else {
        print_report(&report);
    }
}

async fn track_progress(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<CheckResult>,
    bar: ProgressBar,
) {
    let mut failed = 0usize;
    while let Some(result) = rx.recv().await {
        if result.verdict == Verdict::Fail {
            failed += 1;
            if let Some(line) = result.log_line(false) {
                bar.println(style(line).red().to_string());
            }
        }
        bar.inc(1);
        bar.set_message(format!(
            "{} {}",
            style(result.endpoint.mount()).dim(),
            if failed > 0 {
                style(format!("{} failed", failed)).red().to_string()
            } else {
                String::new()
            }
        ));
    }
}

fn print_report(report: &RunReport) {
    for line in &report.lines {
        let styled = if line.starts_with("FAIL:") {
            style(line.as_str()).red().to_string()
        } else if line.starts_with("WARN:") {
            style(line.as_str()).yellow().to_string()
        } else if line.starts_with("OK:") {
            style(line.as_str()).green().to_string()
        } else if line == "SUMMARY" || line.starts_with("Stream Checker") {
            style(line.as_str()).bold().to_string()
        } else {
            line.clone()
        };
        println!("{}", styled);
    }

    match &report.notification {
        NotificationStatus::Skipped => {}
        NotificationStatus::NoNotifier => println!(
            "{}",
            style("Report not sent: no email or webhook configured").dim()
        ),
        NotificationStatus::Delivered => println!("{}", style("Report sent.").dim()),
        NotificationStatus::Failed(e) => {
            println!("{} {}", style("Report delivery failed:").red(), e)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_tracing(log_format: &str, verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
