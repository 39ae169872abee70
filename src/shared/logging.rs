use tracing::info;
use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the agent: daily-rotated file output plus console,
/// falling back to console only when the log directory is not writable.
pub fn init_service_logging(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    // Controlled via RUST_LOG, defaults to info
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let probe = format!("{log_dir}/.write_probe");
    let can_write_logs = std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(&probe))
        .map(|_| std::fs::remove_file(&probe))
        .is_ok();

    let (non_blocking_stdout, stdout_guard) = non_blocking(std::io::stdout());
    // The console layer is constructed inline in each branch below: each
    // subscriber stack needs its own concretely-typed layer instance.

    if can_write_logs {
        let _ = archive_previous_log(log_dir, service_name);

        let file_appender =
            tracing_appender::rolling::daily(log_dir, format!("{service_name}.log"));
        let (non_blocking_file, file_guard) = non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false) // no colors in file logs
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(
                fmt::layer()
                    .with_writer(non_blocking_stdout.clone())
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false),
            )
            .init();

        // Keep the writer guards alive for the lifetime of the process
        std::mem::forget(file_guard);
        std::mem::forget(stdout_guard);

        info!("Logging initialized - writing to {log_dir}/{service_name}.log");
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(non_blocking_stdout.clone())
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false),
            )
            .init();

        std::mem::forget(stdout_guard);

        info!("Logging initialized - console only (log directory not writable)");
    }

    Ok(())
}

fn archive_previous_log(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    let log_file = format!("{log_dir}/{service_name}.log");

    if std::path::Path::new(&log_file).exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = format!("{log_dir}/{service_name}.{timestamp}.log");
        std::fs::rename(&log_file, &backup_file)?;
    }

    Ok(())
}
