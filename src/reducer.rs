use crate::types::{
    parse_error_detail, parse_sources, parse_token_delta, AnswerState, AnswerStatus, FrameEvent,
    StreamFrame,
};

/// Receives a snapshot after every visible state change. Implementations
/// must treat the snapshot as immutable; the reducer is the only writer.
pub trait AnswerObserver {
    fn on_update(&mut self, state: &AnswerState);
}

/// Observer that discards updates, for headless drives and tests.
pub struct NullObserver;

impl AnswerObserver for NullObserver {
    fn on_update(&mut self, _state: &AnswerState) {}
}

/// Folds decoded frames into the state of a single in-progress answer.
///
/// The same reducer is driven by the streaming transport and by the
/// synthetic frames the fallback path produces, so whoever watches the
/// observer never learns which transport was used.
pub struct AnswerReducer<O: AnswerObserver> {
    state: AnswerState,
    observer: O,
}

impl<O: AnswerObserver> AnswerReducer<O> {
    pub fn new(observer: O) -> Self {
        Self {
            state: AnswerState::new(),
            observer,
        }
    }

    pub fn state(&self) -> &AnswerState {
        &self.state
    }

    pub fn has_text(&self) -> bool {
        !self.state.text.is_empty()
    }

    pub fn into_state(self) -> AnswerState {
        self.state
    }

    pub fn apply(&mut self, frame: &StreamFrame) {
        if self.state.status.is_terminal() {
            tracing::trace!("ignoring {} frame after terminal status", frame.event);
            return;
        }

        match &frame.event {
            FrameEvent::Token => {
                self.state.text.push_str(&parse_token_delta(&frame.data));
            }
            FrameEvent::Sources => {
                self.state.sources = parse_sources(&frame.data);
            }
            FrameEvent::Done => {
                self.state.status = AnswerStatus::Done;
            }
            FrameEvent::Error => {
                let detail = match parse_error_detail(&frame.data) {
                    Some(d) => d,
                    None => "Streaming failed".to_string(),
                };
                // The error supersedes any partial streamed text.
                self.state.text = format!("Error: {}", detail);
                self.state.status = AnswerStatus::Errored;
            }
            FrameEvent::Message | FrameEvent::Other(_) => {
                tracing::trace!("ignoring unrecognized {} frame", frame.event);
                return;
            }
        }

        self.observer.on_update(&self.state);
    }

    /// The stream ended without a `done`/`error` frame. Accumulated text
    /// counts as an implicit success; an empty answer leaves the status at
    /// `Streaming` so the caller knows to try the fallback transport.
    pub fn finish(&mut self) {
        if self.state.status.is_terminal() {
            return;
        }
        if self.has_text() {
            self.state.status = AnswerStatus::Done;
            self.observer.on_update(&self.state);
        }
    }

    /// The transport dropped mid-answer; keep whatever streamed.
    pub fn interrupt(&mut self) {
        if self.state.status.is_terminal() {
            return;
        }
        self.state.status = AnswerStatus::Interrupted;
        self.observer.on_update(&self.state);
    }
}
