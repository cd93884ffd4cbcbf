//! Tagged line logging.
//!
//! Every component logs through `tracing`; this module installs a formatter
//! that renders each event as a single line:
//!
//! ```text
//! [2026-08-02T14:05:00] [Thread-3] Request: GET /index.html HTTP/1.1
//! ```
//!
//! The `tag` field names the emitting worker (`Thread-<n>`); events without
//! a tag belong to the dispatcher and render as `MAIN`. The subscriber owns
//! standard output and serialises events, so lines from concurrent workers
//! never interleave. Write failures are swallowed.

use chrono::Local;
use std::fmt::{self, Write as _};
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
};

/// Installs the global subscriber. Call once, before the server starts.
pub fn init() {
    tracing_subscriber::fmt()
        .event_format(TaggedLines)
        .with_max_level(Level::INFO)
        .init();
}

struct TaggedLines;

impl<S, N> FormatEvent<S, N> for TaggedLines
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut line = LineVisitor::default();
        event.record(&mut line);

        writeln!(
            writer,
            "[{}] [{}] {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S"),
            line.tag.as_deref().unwrap_or("MAIN"),
            line.message,
        )
    }
}

#[derive(Default)]
struct LineVisitor {
    tag: Option<String>,
    message: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "tag" {
            self.tag = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{value:?}");
            }
            "tag" => self.tag = Some(format!("{value:?}")),
            _ => {}
        }
    }
}
