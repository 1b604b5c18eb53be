//! Rolling file sink.
//!
//! One line per event:
//! `yyyy-MM-dd HH:mm:ss.fff|LVL|target|message`, then the fields of the
//! enclosing spans (root first) and of the event itself, then the
//! exception on its own line when the event carries one.

use std::fmt;
use std::path::Path;

use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

use crate::observability::error::LoggingError;
use crate::observability::event::{value_to_string, FieldCollector};
use crate::observability::level::abbreviation;

/// Pipe-delimited event format for log files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeFormat;

impl<S, N> FormatEvent<S, N> for PipeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        let exception = collector.take_exception();

        write!(
            writer,
            "{}|{}|{}|{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            abbreviation(metadata.level()),
            metadata.target(),
            collector.message.unwrap_or_default(),
        )?;
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, " {fields}")?;
                    }
                }
            }
        }
        for (key, value) in &collector.fields {
            write!(writer, " {key}={}", value_to_string(value))?;
        }
        writeln!(writer)?;
        if let Some(exception) = exception {
            writeln!(writer, "{exception}")?;
        }
        Ok(())
    }
}

/// Open a daily rolling appender (`<prefix>.<date>.<suffix>`) behind a
/// non-blocking writer. The guard must live as long as the logger.
pub fn rolling_writer(
    directory: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .build(directory)
        .map_err(|e| LoggingError::FileSink {
            directory: directory.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(tracing_appender::non_blocking(appender))
}
