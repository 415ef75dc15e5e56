//! Custom tracing layer for JSONL output.
//!
//! Produces one [`LogEvent`] per tracing event on the configured writer
//! (stderr by default) so stdout stays clean for command payloads.
//!
//! The event name is the `event` field when present and the target
//! otherwise. Run id and stage come from the closest enclosing span that
//! records them (see [`LogContext::span`](super::LogContext::span)).

use std::io::{self, Write};
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::{Level, LogEvent, Stage};

/// Run context stored on spans.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    stage: Option<Stage>,
}

impl Visit for SpanContext {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "run_id" => self.run_id = Some(value.to_string()),
            "stage" => self.stage = value.parse().ok(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // `%value` fields arrive here wrapped in DisplayValue, whose Debug
        // prints the Display form.
        self.record_str(field, &format!("{:?}", value));
    }
}

/// Collects event fields into a JSON map.
#[derive(Default)]
struct JsonFieldVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
    event: Option<String>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => self.insert(field, serde_json::Value::String(value.to_string())),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Layer writing to a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut context = SpanContext::default();
        attrs.record(&mut context);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut run_id = None;
        let mut stage = None;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if run_id.is_none() {
                        run_id.clone_from(&span_ctx.run_id);
                    }
                    if stage.is_none() {
                        stage = span_ctx.stage;
                    }
                }
            }
        }

        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let name = visitor
            .event
            .unwrap_or_else(|| metadata.target().to_string());
        let mut record = LogEvent::new(
            Level::from(*metadata.level()),
            name,
            visitor.message.unwrap_or_default(),
        );
        record.run_id = run_id;
        record.stage = stage;
        record.fields = visitor.fields.into_iter().collect();

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", record.to_jsonl());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{event_names, LogContext};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<serde_json::Value> {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(buffer.clone()));
        tracing::subscriber::with_default(subscriber, f);
        buffer.lines()
    }

    #[test]
    fn event_field_names_the_event() {
        let lines = capture(|| {
            tracing::info!(event = event_names::INFER_STARTED, observed = 3u64, "inference started");
        });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["event"], "infer.started");
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["message"], "inference started");
        assert_eq!(lines[0]["fields"]["observed"], 3);
        assert!(lines[0].get("ts").is_some());
    }

    #[test]
    fn target_is_the_fallback_name() {
        let lines = capture(|| {
            tracing::warn!(target: "sa.custom", ratio = 0.5, ok = false, "careful");
        });
        assert_eq!(lines[0]["event"], "sa.custom");
        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[0]["fields"]["ratio"], 0.5);
        assert_eq!(lines[0]["fields"]["ok"], false);
    }

    #[test]
    fn span_supplies_run_and_stage() {
        let lines = capture(|| {
            let ctx = LogContext::new("run-0123456789ab");
            let _guard = ctx.span(Stage::Decide).entered();
            tracing::info!(event = event_names::DECIDE_RECOMMENDED, label = "Cash", "recommendation");
        });
        assert_eq!(lines[0]["run_id"], "run-0123456789ab");
        assert_eq!(lines[0]["stage"], "decide");
        assert_eq!(lines[0]["fields"]["label"], "Cash");
    }

    #[test]
    fn events_outside_spans_have_no_run() {
        let lines = capture(|| tracing::error!("bare"));
        assert!(lines[0].get("run_id").is_none());
        assert!(lines[0].get("stage").is_none());
    }
}
