use crate::types::{AnswerState, FrameEvent, StreamFrame};
use std::panic;
use tracing::{error, info};

/// Initializes the global subscriber: env-filtered, file-backed (stdout
/// belongs to the chat surface), with span traces for error capture.
/// The returned guard must be held for the lifetime of the process.
pub fn init_tracing(log_dir: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::prelude::*;

    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => "ragline=info".into(),
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, "ragline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_error::ErrorLayer::default())
        .init();

    guard
}

/// Sets up a global panic hook that logs panics through tracing before the
/// default hook runs.
pub fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            target: "panic",
            message = %message,
            location = %location,
            backtrace = %backtrace,
            "FATAL: Application panicked"
        );

        original_hook(panic_info);
    }));
}

/// Per-turn counters, logged once the turn reaches a terminal state.
#[derive(Default)]
pub struct TurnMetric {
    pub frames: usize,
    pub token_frames: usize,
    pub ignored_frames: usize,
}

impl TurnMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, frame: &StreamFrame) {
        self.frames += 1;
        match &frame.event {
            FrameEvent::Token => self.token_frames += 1,
            FrameEvent::Message | FrameEvent::Other(_) => self.ignored_frames += 1,
            _ => {}
        }
    }

    pub fn log_summary(&self, state: &AnswerState, latency: std::time::Duration) {
        let sources = match &state.sources {
            Some(s) => s.len(),
            None => 0,
        };
        info!(
            "[TURN END] Status: {:?} | Latency: {:?} | Frames: {} ({} token, {} ignored) | Text: {} chars | Sources: {}",
            state.status,
            latency,
            self.frames,
            self.token_frames,
            self.ignored_frames,
            state.text.chars().count(),
            sources
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnswerStatus;

    #[test]
    fn test_turn_metric_counts_by_event() {
        let mut metric = TurnMetric::new();
        for (event, data) in [
            (FrameEvent::Token, r#"{"t":"a"}"#),
            (FrameEvent::Token, r#"{"t":"b"}"#),
            (FrameEvent::Sources, r#"{"sources":[]}"#),
            (FrameEvent::Other("ping".into()), "{}"),
            (FrameEvent::Done, "{}"),
        ] {
            metric.record_frame(&StreamFrame {
                event,
                data: data.into(),
            });
        }
        assert_eq!(metric.frames, 5);
        assert_eq!(metric.token_frames, 2);
        assert_eq!(metric.ignored_frames, 1);

        let mut state = AnswerState::new();
        state.text = "ab".into();
        state.status = AnswerStatus::Done;
        metric.log_summary(&state, std::time::Duration::from_millis(5));
    }
}
