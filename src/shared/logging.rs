use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging (file + stderr). Stdout is reserved for the stdio
/// transport, so the console layer always writes to stderr.
pub fn init_service_logging(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Check if we can write to the log directory
    let can_write_logs = std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(format!("{log_dir}/.test_write")))
        .map(|_| std::fs::remove_file(format!("{log_dir}/.test_write")))
        .is_ok();

    let (non_blocking_stderr, guard_stderr) = non_blocking(std::io::stderr());

    if can_write_logs {
        use tracing_appender::rolling;

        let _ = rotate_logs_on_startup(log_dir, service_name);

        let file_appender = rolling::daily(log_dir, format!("{service_name}.log"));
        let (non_blocking_file, guard_file) = non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .with_writer(non_blocking_stderr)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        // Keep the writers alive for the whole process
        std::mem::forget(guard_file);
        std::mem::forget(guard_stderr);

        info!("Logging initialized - logs will be written to {log_dir}/{service_name}.log");
    } else {
        let console_layer = fmt::layer()
            .with_writer(non_blocking_stderr)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()?;

        std::mem::forget(guard_stderr);

        info!("Logging initialized - stderr only (could not create log directory)");
    }

    Ok(())
}

pub fn rotate_logs_on_startup(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    let log_file = format!("{log_dir}/{service_name}.log");
    let log_path = Path::new(&log_file);

    if log_path.exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = format!("{log_dir}/{service_name}.{timestamp}.log");

        std::fs::rename(&log_file, &backup_file)?;
        info!("Previous log file backed up to: {backup_file}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_moves_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_string_lossy().into_owned();
        std::fs::write(dir.path().join("svc.log"), "old").unwrap();

        rotate_logs_on_startup(&log_dir, "svc").unwrap();

        assert!(!dir.path().join("svc.log").exists());
        let backups = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_service_logging_writes_to_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs").to_string_lossy().into_owned();

        init_service_logging(&log_dir, "svc").unwrap();

        assert!(Path::new(&log_dir).is_dir());
        assert!(!Path::new(&log_dir).join(".test_write").exists());
    }

    #[test]
    fn test_rotate_without_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_string_lossy().into_owned();
        assert!(rotate_logs_on_startup(&log_dir, "svc").is_ok());
    }
}
