// Logging setup: console and optional JSON file output, plus job run timing
use std::env;
use std::fs;
use eyre::Result;
use tracing_subscriber::{
    fmt,
    EnvFilter,
    layer::{SubscriberExt, Layer, Context},
    util::SubscriberInitExt
};
use tracing::{Id, Subscriber, span, field::Field, field::Visit, debug};
use std::time::{Instant, Duration};
use std::sync::OnceLock; // For global file guard

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const CRATE_TARGET: &str = "yield_rate_engine";

pub fn init_logging(service_name: String) -> Result<()> {
    // Load log levels for console and file from env
    let console_log_level = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let file_log_level = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());

    // Load file log flag from env
    let log_to_file = env::var("LOG_TO_FILE").unwrap_or_else(|_| "false".to_string()) == "true";

    // Filter globally to "warn", our own crate and binaries to the levels in .env
    let env_filter_console = EnvFilter::try_new(
        format!("warn,{CRATE_TARGET}={console_log_level},{service_name}={console_log_level}")
    ).unwrap_or_else(|_| EnvFilter::new(format!("{CRATE_TARGET}=info")));

    let env_filter_file = EnvFilter::try_new(
        format!("warn,{CRATE_TARGET}={file_log_level},{service_name}={file_log_level}")
    ).unwrap_or_else(|_| EnvFilter::new(format!("{CRATE_TARGET}=info")));

    // Console layer: always enabled, pretty human-readable logs
    let console_layer = fmt::Layer::new()
        .pretty()
        .with_filter(env_filter_console);

    let timing_layer = JobRunTimingLayer;

    if log_to_file {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let log_dir = std::path::Path::new("logs");
        fs::create_dir_all(log_dir)?;
        let log_file_name = format!("{}_{}.log", service_name, timestamp);

        let file_appender = tracing_appender::rolling::never(log_dir, log_file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).ok(); // Store the guard globally

        // File layer: structured JSON logs with UTC timestamps
        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(env_filter_file);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .with(timing_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(console_layer)
            .with(timing_layer)
            .try_init()?;
    }
    Ok(())
}

/// Wall-clock accounting for one `job_run` span
#[derive(Debug, Clone, PartialEq)]
struct JobRunTiming {
    job: String,
    started: Instant,
    last_transition: Instant,
    busy: Duration,
    idle: Duration,
}

impl JobRunTiming {
    fn new(job: String, now: Instant) -> Self {
        Self { job, started: now, last_transition: now, busy: Duration::ZERO, idle: Duration::ZERO }
    }

    /// Time since the last exit was spent waiting (queued or suspended)
    fn enter(&mut self, now: Instant) {
        self.idle += now.saturating_duration_since(self.last_transition);
        self.last_transition = now;
    }

    /// Time since the last enter was spent polling the run
    fn exit(&mut self, now: Instant) {
        self.busy += now.saturating_duration_since(self.last_transition);
        self.last_transition = now;
    }

    fn total(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

/// Pulls the `job` name and `on_close` flag off a span's fields
#[derive(Default)]
struct JobFields {
    job: Option<String>,
    on_close: bool,
}

impl Visit for JobFields {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "on_close" {
            self.on_close = value;
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "job" {
            self.job = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "job" {
            self.job = Some(format!("{:?}", value));
        }
    }
}

// Logs busy/idle time of every job run span opened with `on_close = true`
struct JobRunTimingLayer;

impl<S> Layer<S> for JobRunTimingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = JobFields::default();
        attrs.record(&mut fields);
        if !fields.on_close {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let job = fields.job.unwrap_or_else(|| span.name().to_string());
            span.extensions_mut().insert(JobRunTiming::new(job, Instant::now()));
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(timing) = span.extensions_mut().get_mut::<JobRunTiming>() {
                timing.enter(Instant::now());
            }
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(timing) = span.extensions_mut().get_mut::<JobRunTiming>() {
                timing.exit(Instant::now());
            }
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            if let Some(timing) = span.extensions_mut().remove::<JobRunTiming>() {
                debug!(
                    job = %timing.job,
                    busy_time = ?timing.busy,
                    idle_time = ?timing.idle,
                    total_time = ?timing.total(Instant::now()),
                    "Job run timing"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_run_timing_splits_busy_and_idle() {
        let start = Instant::now();
        let mut timing = JobRunTiming::new("accrual".to_string(), start);

        // Queued for 1s, polled for 2s, suspended 4s, polled 1s
        timing.enter(start + Duration::from_secs(1));
        timing.exit(start + Duration::from_secs(3));
        timing.enter(start + Duration::from_secs(7));
        timing.exit(start + Duration::from_secs(8));

        assert_eq!(timing.busy, Duration::from_secs(3));
        assert_eq!(timing.idle, Duration::from_secs(5));
        assert_eq!(timing.total(start + Duration::from_secs(8)), Duration::from_secs(8));
        assert_eq!(timing.job, "accrual");
    }

    #[test]
    fn test_job_fields_reads_name_and_flag() {
        use tracing_subscriber::registry::LookupSpan;

        struct Capture(std::sync::Arc<std::sync::Mutex<Option<String>>>);

        impl<S> Layer<S> for Capture
        where
            S: Subscriber + for<'a> LookupSpan<'a>,
        {
            fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
                if let Some(span) = ctx.span(id) {
                    if let Some(timing) = span.extensions().get::<JobRunTiming>() {
                        *self.0.lock().unwrap() = Some(timing.job.clone());
                    }
                }
            }
        }

        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let subscriber = tracing_subscriber::registry()
            .with(JobRunTimingLayer)
            .with(Capture(seen.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let name = String::from("rate_sync");
            let span = tracing::info_span!("job_run", job = %name, on_close = true);
            span.in_scope(|| {});
        });
        assert_eq!(seen.lock().unwrap().as_deref(), Some("rate_sync"));
    }
}
