//! Severity-leveled, timestamped logging.
//!
//! All messages go through [`emit`], which hands them to `tracing`. The
//! subscriber installed by [`init_logging`] stamps each event with the local
//! wall-clock time and renders it as a single line on standard error.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt as tfmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Target attached to every message emitted through [`emit`].
pub const LOG_TARGET: &str = "reqenv";

/// Timestamp layout of a rendered line, e.g. `Jan  5 14:03:22`.
pub const TIMESTAMP_FORMAT: &str = "%b %e %H:%M:%S";

/// Importance of a log message, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "Debug",
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Severity::Debug => Level::DEBUG,
            Severity::Info => Level::INFO,
            Severity::Warning => Level::WARN,
            Severity::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message waiting to be emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub severity: Severity,
    pub content: String,
}

impl LogMessage {
    pub fn new(severity: Severity, content: impl Into<String>) -> Self {
        LogMessage {
            severity,
            content: content.into(),
        }
    }
}

/// Anything that can accept a log message.
pub trait Logger {
    fn log(&self, severity: Severity, message: &str);

    fn debug(&self, message: &str) {
        self.log(Severity::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

/// Logger that writes straight to the central emission path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, severity: Severity, message: &str) {
        emit(&LogMessage::new(severity, message));
    }
}

/// Central emission path. Synchronous: the event is formatted and written
/// before this returns.
pub fn emit(message: &LogMessage) {
    let content = message.content.as_str();
    match message.severity {
        Severity::Debug => tracing::debug!(target: LOG_TARGET, "{}", content),
        Severity::Info => tracing::info!(target: LOG_TARGET, "{}", content),
        Severity::Warning => tracing::warn!(target: LOG_TARGET, "{}", content),
        Severity::Error => tracing::error!(target: LOG_TARGET, "{}", content),
    }
}

/// Severity label used when rendering an event of the given `tracing` level.
pub fn severity_label(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "Trace",
        Level::DEBUG => Severity::Debug.as_str(),
        Level::INFO => Severity::Info.as_str(),
        Level::WARN => Severity::Warning.as_str(),
        Level::ERROR => Severity::Error.as_str(),
    }
}

/// Renders `<timestamp> <severity> <message>` without a trailing newline.
pub fn render_line<Tz>(at: &DateTime<Tz>, severity: &str, message: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("{} {} {}", at.format(TIMESTAMP_FORMAT), severity, message)
}

/// Formats events as `Jan  5 14:03:22 Info message key=value`.
#[derive(Clone, Default)]
pub struct LineEventFormatter;

impl<S, N> FormatEvent<S, N> for LineEventFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.field_format()
            .format_fields(Writer::new(&mut message), event)?;
        writeln!(
            writer,
            "{}",
            render_line(
                &Local::now(),
                severity_label(event.metadata().level()),
                &message
            )
        )
    }
}

#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonFieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

/// One OpenTelemetry-shaped JSON object per line.
#[derive(Clone)]
pub struct JsonEventFormatter {
    service_name: String,
}

impl JsonEventFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        JsonEventFormatter {
            service_name: service_name.into(),
        }
    }

    fn severity_number(level: &Level) -> u64 {
        match *level {
            Level::TRACE => 1,
            Level::DEBUG => 5,
            Level::INFO => 9,
            Level::WARN => 13,
            Level::ERROR => 17,
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut attributes = visitor.fields;
        attributes.insert("code.target".to_string(), Value::from(metadata.target()));
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".to_string(), Value::from(line));
        }

        let body = attributes
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| metadata.name().to_string());

        let mut resource = Map::new();
        resource.insert(
            "service.name".to_string(),
            Value::from(self.service_name.clone()),
        );

        let mut root = Map::new();
        root.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        root.insert(
            "severity_text".to_string(),
            Value::from(severity_label(metadata.level())),
        );
        root.insert(
            "severity_number".to_string(),
            Value::from(Self::severity_number(metadata.level())),
        );
        root.insert("body".to_string(), Value::from(body));
        root.insert("resource".to_string(), Value::Object(resource));
        root.insert("attributes".to_string(), Value::Object(attributes));

        let serialized =
            serde_json::to_string(&Value::Object(root)).map_err(|_| fmt::Error)?;
        writer.write_str(&serialized)?;
        writer.write_char('\n')
    }
}

/// Output layout of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Line,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "line" | "console" => Ok(LogFormat::Line),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    InvalidLevel(String),
    #[error("invalid logging.format '{0}'. Valid values: line, json")]
    InvalidFormat(String),
    #[error("could not install the global subscriber: {0}")]
    Init(#[from] TryInitError),
}

pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Builds a line-format subscriber writing to `writer`. `init_logging` uses
/// it with standard error; tests hand in an in-memory writer.
pub fn line_subscriber<W>(level: LevelFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(level).with(
        tfmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .event_format(LineEventFormatter),
    )
}

/// Installs the global subscriber described by `logging_config`.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), LoggingError> {
    let level_filter = parse_level(&logging_config.level)?;
    let format = logging_config.format.parse::<LogFormat>()?;

    // RUST_LOG directives can narrow things further on top of the configured level.
    let filter_layer = EnvFilter::from_default_env().add_directive(level_filter.into());

    match format {
        LogFormat::Line => tracing_subscriber::registry()
            .with(filter_layer)
            .with(
                tfmt::layer()
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .event_format(LineEventFormatter),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter_layer)
            .with(
                tfmt::layer()
                    .with_writer(std::io::stderr)
                    .event_format(JsonEventFormatter::new(&logging_config.service_name)),
            )
            .try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_render_line_pads_the_day() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 14, 3, 22).unwrap();
        assert_eq!(
            render_line(&at, Severity::Info.as_str(), "server started"),
            "Jan  5 14:03:22 Info server started"
        );

        let at = Utc.with_ymd_and_hms(2024, 11, 25, 9, 0, 1).unwrap();
        assert_eq!(
            render_line(&at, "Warning", "slow query"),
            "Nov 25 09:00:01 Warning slow query"
        );
    }

    #[test]
    fn test_emitted_lines_are_stamped_and_ordered() {
        let capture = Capture::default();
        let subscriber = line_subscriber(LevelFilter::DEBUG, capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            let logger = TracingLogger;
            logger.debug("first");
            logger.warning("second");
            logger.log(Severity::Error, "third");
        });

        let output = capture.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);

        // "Jan  5 14:03:22" is always 15 characters wide.
        let expected = [("Debug", "first"), ("Warning", "second"), ("Error", "third")];
        for (line, (severity, message)) in lines.iter().zip(expected) {
            let rest = &line[15..];
            assert_eq!(rest, format!(" {} {}", severity, message));
            let stamp = &line[..15];
            assert!(stamp.chars().nth(6) == Some(' '), "bad stamp: {stamp}");
        }
    }

    #[tokio::test]
    async fn test_default_config_keeps_query_lines() {
        use crate::config::DatabaseConfig;
        use crate::pool::open_sqlite_pool;
        use crate::query::{execute, SqlQuery, EMPTY_QUERY};

        let capture = Capture::default();
        let level = parse_level(&LoggingConfig::default().level).unwrap();
        let _guard = tracing::subscriber::set_default(line_subscriber(level, capture.clone()));

        let dir = tempfile::tempdir().unwrap();
        let mut config = DatabaseConfig::new(dir.path().join("log.db").display().to_string());
        config.stripes = 1;
        config.min_idle_per_stripe = 0;
        let pool = open_sqlite_pool(&config).unwrap();

        execute(&TracingLogger, &pool, SqlQuery::new("SELECT 1"))
            .await
            .unwrap();
        // The outcome of running an empty statement does not matter here.
        let _ = execute(&TracingLogger, &pool, SqlQuery::new("")).await;

        let output = capture.contents();
        assert!(output.contains(" Debug SELECT 1\n"), "got: {output:?}");
        assert!(
            output.contains(&format!(" Debug {}\n", EMPTY_QUERY)),
            "got: {output:?}"
        );
    }

    #[test]
    fn test_parse_level_and_format() {
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level("warning").unwrap(), LevelFilter::WARN);
        assert!(matches!(
            parse_level("loud"),
            Err(LoggingError::InvalidLevel(_))
        ));
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("console".parse::<LogFormat>().unwrap(), LogFormat::Line);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
