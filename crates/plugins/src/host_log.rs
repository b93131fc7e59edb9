//! Forwards `tracing` events to the host client's log.
//!
//! [`HostLogLayer`] is a `tracing_subscriber::Layer`; it renders each event
//! from a `massmover*` target as one line and hands it to
//! [`HostFunctions::log_message`] on the `"Plugin"` log channel, tagged with
//! the connection of the enclosing span when there is one.

use std::{fmt::Write as _, sync::Arc};

use {
    tracing::{
        Event, Level, Subscriber,
        field::{Field, Visit},
        level_filters::LevelFilter,
        span::{Attributes, Id},
    },
    tracing_subscriber::{
        Layer,
        layer::{Context, SubscriberExt},
        registry::LookupSpan,
        util::SubscriberInitExt,
    },
};

use crate::{
    error::Result,
    host::{HostFunctions, LogLevel},
};

/// Host log channel the plugin writes to.
pub const LOG_CHANNEL: &str = "Plugin";

const PREFIX: &str = "MassMover";
const TARGET_PREFIX: &str = "massmover";

/// Connection recorded on a span, stored in its extensions.
#[derive(Debug, Clone, Copy)]
struct SpanConnection(u64);

// ── Visitor ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
    connection: Option<u64>,
    fatal: bool,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "connection" => self.connection = value.parse().ok(),
            name => self.fields.push((name, value)),
        }
    }

    fn render(&self) -> String {
        let mut line = format!("{PREFIX}: {}", self.message);
        for (name, value) in &self.fields {
            let _ = write!(line, " {name}={value}");
        }
        line
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "connection" {
            self.connection = Some(value);
        } else {
            self.push(field, value.to_string());
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "fatal" {
            self.fatal = value;
        } else {
            self.push(field, value.to_string());
        }
    }
}

/// Host severity for a tracing level. Errors flagged `fatal = true` are critical.
fn host_level(level: &Level, fatal: bool) -> LogLevel {
    match *level {
        Level::ERROR if fatal => LogLevel::Critical,
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        _ => LogLevel::Devel,
    }
}

// ── HostLogLayer ────────────────────────────────────────────────────────────

pub struct HostLogLayer<H: ?Sized> {
    host: Arc<H>,
    max_level: LevelFilter,
}

impl<H: HostFunctions + ?Sized> HostLogLayer<H> {
    pub fn new(host: Arc<H>, max_level: LevelFilter) -> Self {
        Self { host, max_level }
    }
}

impl<S, H> Layer<S> for HostLogLayer<H>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    H: HostFunctions + ?Sized + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(connection), Some(span)) = (visitor.connection, ctx.span(id)) {
            span.extensions_mut().insert(SpanConnection(connection));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level || !meta.target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let connection = visitor.connection.or_else(|| {
            ctx.event_scope(event)?
                .find_map(|span| span.extensions().get::<SpanConnection>().map(|c| c.0))
        });

        self.host.log_message(
            &visitor.render(),
            host_level(meta.level(), visitor.fatal),
            LOG_CHANNEL,
            connection.unwrap_or(0),
        );
    }
}

/// Install a global subscriber that only feeds the host log.
pub fn install_host_logging<H>(host: Arc<H>, max_level: LevelFilter) -> Result<()>
where
    H: HostFunctions + ?Sized + 'static,
{
    tracing_subscriber::registry()
        .with(HostLogLayer::new(host, max_level))
        .try_init()?;
    Ok(())
}
