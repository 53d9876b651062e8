use crate::constants::{CHAT_PATH, MAX_STREAM_FRAMES};
use crate::logging::TurnMetric;
use crate::main_helper::AppContext;
use crate::reducer::{AnswerObserver, AnswerReducer};
use crate::streaming::{StreamAttempt, StreamClient};
use crate::types::{AnswerState, ChatRequest, ChatTurn, FrameEvent, StreamFrame};
use tokio_util::sync::CancellationToken;

/// Runs one chat turn to a terminal state.
///
/// The streaming transport is tried first; when it is unavailable, or ends
/// having produced no text, one blocking request does the whole turn and
/// the reducer is fed an equivalent synthetic frame sequence. The observer
/// cannot tell the transports apart.
pub async fn run_turn<O: AnswerObserver>(
    ctx: &AppContext,
    turn: &ChatTurn,
    observer: O,
    cancel: CancellationToken,
) -> AnswerState {
    let start = std::time::Instant::now();
    let mut reducer = AnswerReducer::new(observer);
    let mut metric = TurnMetric::new();
    tracing::info!(
        "turn start: conversation {} ({} chars, hybrid={})",
        turn.conversation_id.short(),
        turn.user_text.chars().count(),
        turn.hybrid
    );

    let token = ctx.bearer_token();
    let attempt =
        StreamClient::open(&ctx.client, &ctx.base_url, turn, token.as_deref(), cancel.clone())
            .await;

    match attempt {
        StreamAttempt::Open(mut frames) => {
            drive_stream(&mut frames, &mut reducer, &mut metric).await;
        }
        StreamAttempt::Unavailable => {}
    }

    if cancel.is_cancelled() {
        reducer.interrupt();
    }

    if !reducer.state().status.is_terminal() {
        fallback_turn(ctx, turn, &mut reducer, &mut metric, &cancel).await;
    }

    metric.log_summary(reducer.state(), start.elapsed());
    reducer.into_state()
}

/// Forwards frames to the reducer until a terminal frame, exhaustion,
/// cancellation, or a mid-stream failure.
async fn drive_stream<O: AnswerObserver>(
    frames: &mut crate::streaming::FrameStream,
    reducer: &mut AnswerReducer<O>,
    metric: &mut TurnMetric,
) {
    loop {
        match frames.next_frame().await {
            Some(Ok(frame)) => {
                metric.record_frame(&frame);
                if metric.frames > MAX_STREAM_FRAMES {
                    tracing::error!("stream exceeded max frame limit ({})", MAX_STREAM_FRAMES);
                    reducer.interrupt();
                    return;
                }
                reducer.apply(&frame);
                if reducer.state().status.is_terminal() {
                    return;
                }
            }
            Some(Err(e)) => {
                // Mid-stream failure: keep whatever already streamed rather
                // than re-running the turn from scratch.
                tracing::warn!("stream read failed: {}", e);
                if reducer.has_text() {
                    reducer.interrupt();
                }
                return;
            }
            None => {
                reducer.finish();
                return;
            }
        }
    }
}

/// One blocking request-response call, translated into the same frame
/// vocabulary the streaming path produces.
async fn fallback_turn<O: AnswerObserver>(
    ctx: &AppContext,
    turn: &ChatTurn,
    reducer: &mut AnswerReducer<O>,
    metric: &mut TurnMetric,
    cancel: &CancellationToken,
) {
    tracing::debug!("using blocking transport for conversation {}", turn.conversation_id.short());

    let mut request = ctx
        .client
        .post(ctx.endpoint(CHAT_PATH))
        .timeout(ctx.request_timeout())
        .json(&ChatRequest {
            conversation_id: turn.conversation_id.0.clone(),
            message: turn.user_text.clone(),
            hybrid: turn.hybrid,
        });
    if let Some(token) = ctx.bearer_token() {
        request = request.header("Authorization", format!("Bearer {}", token));
    }

    let response = tokio::select! {
        _ = cancel.cancelled() => {
            reducer.interrupt();
            return;
        }
        response = request.send() => response,
    };

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("blocking chat request failed: {}", e);
            apply_synthetic_error(reducer, metric, "Chat failed");
            return;
        }
    };

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let detail = crate::types::failure_detail(&body, "Chat failed");
        tracing::warn!("blocking chat returned {}: {}", status, detail);
        apply_synthetic_error(reducer, metric, &detail);
        return;
    }

    let parsed: crate::types::ChatResponse = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("blocking chat response did not parse: {}", e);
            apply_synthetic_error(reducer, metric, "Chat failed");
            return;
        }
    };

    for frame in [
        StreamFrame {
            event: FrameEvent::Token,
            data: serde_json::json!({ "t": parsed.answer }).to_string(),
        },
        StreamFrame {
            event: FrameEvent::Sources,
            data: serde_json::json!({ "sources": parsed.sources }).to_string(),
        },
        StreamFrame {
            event: FrameEvent::Done,
            data: "{}".to_string(),
        },
    ] {
        metric.record_frame(&frame);
        reducer.apply(&frame);
    }
}

fn apply_synthetic_error<O: AnswerObserver>(
    reducer: &mut AnswerReducer<O>,
    metric: &mut TurnMetric,
    detail: &str,
) {
    let frame = StreamFrame {
        event: FrameEvent::Error,
        data: serde_json::json!({ "detail": detail }).to_string(),
    };
    metric.record_frame(&frame);
    reducer.apply(&frame);
}
