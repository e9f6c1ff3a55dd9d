use crate::models::LoggingConfig;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.to_rfc3339())
    }
}

fn build_file_appender(config: &LoggingConfig) -> Option<RollingFileAppender> {
    let dir = config.log_dir.as_ref()?;
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Failed to create log directory {:?}: {}", dir, e);
        return None;
    }
    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("gateway")
        .filename_suffix("log")
        .max_log_files(config.max_log_files.max(1))
        .build(dir)
    {
        Ok(appender) => Some(appender),
        Err(e) => {
            eprintln!("Failed to initialize log file appender: {}", e);
            None
        }
    }
}

/// Installs the global subscriber. The returned guard must outlive the process
/// body or buffered file output is lost.
pub fn init_logger(config: &LoggingConfig) -> Option<WorkerGuard> {
    let _ = tracing_log::LogTracer::init();

    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_timer(LocalTimer);

    let (file_layer, guard) = match build_file_appender(config) {
        Some(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.as_str()));
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if guard.is_some() {
        info!("Log system initialized (Console + File persistence)");
    } else {
        info!("Log system initialized (Console)");
    }
    guard
}

pub fn log_info(message: &str) {
    match crate::modules::system::request_context::try_get() {
        Some(ctx) => info!(
            request_id = %ctx.request_id.as_deref().unwrap_or("-"),
            client_ip = %ctx.client_ip.as_deref().unwrap_or("-"),
            "{}",
            message
        ),
        None => info!("{}", message),
    }
}

pub fn log_warn(message: &str) {
    match crate::modules::system::request_context::try_get() {
        Some(ctx) => warn!(
            request_id = %ctx.request_id.as_deref().unwrap_or("-"),
            client_ip = %ctx.client_ip.as_deref().unwrap_or("-"),
            "{}",
            message
        ),
        None => warn!("{}", message),
    }
}

pub fn log_error(message: &str) {
    match crate::modules::system::request_context::try_get() {
        Some(ctx) => error!(
            request_id = %ctx.request_id.as_deref().unwrap_or("-"),
            client_ip = %ctx.client_ip.as_deref().unwrap_or("-"),
            "{}",
            message
        ),
        None => error!("{}", message),
    }
}
