use crate::constants::CHAT_STREAM_PATH;
use crate::framing::FrameCodec;
use crate::types::{ChatTurn, RaglineError, StreamFrame};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

type ByteSource =
    Pin<Box<dyn Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> + Send>>;

/// Outcome of trying to open the streaming transport. `Unavailable` is not
/// an error; it tells the caller to use the blocking fallback.
pub enum StreamAttempt {
    Open(FrameStream),
    Unavailable,
}

pub struct StreamClient;

impl StreamClient {
    /// Opens an authenticated SSE read for one chat turn.
    ///
    /// Without a bearer token no request is issued at all. A send failure
    /// or non-2xx response also yields `Unavailable`.
    pub async fn open(
        client: &reqwest::Client,
        base_url: &str,
        turn: &ChatTurn,
        token: Option<&str>,
        cancel: CancellationToken,
    ) -> StreamAttempt {
        let Some(token) = token else {
            tracing::debug!("no bearer token; streaming transport unavailable");
            return StreamAttempt::Unavailable;
        };

        let url = format!("{}{}", base_url, CHAT_STREAM_PATH);
        let hybrid = if turn.hybrid { "1" } else { "0" };
        let request = client
            .get(&url)
            .query(&[
                ("conversation_id", turn.conversation_id.0.as_str()),
                ("message", turn.user_text.as_str()),
                ("hybrid", hybrid),
            ])
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "text/event-stream");

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("streaming request failed: {}; will fall back", e);
                return StreamAttempt::Unavailable;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "streaming endpoint returned {}; will fall back",
                response.status()
            );
            return StreamAttempt::Unavailable;
        }

        let bytes: ByteSource = Box::pin(
            response
                .bytes_stream()
                .map(|r| r.map_err(std::io::Error::other)),
        );
        let frames = FramedRead::new(StreamReader::new(bytes), FrameCodec::new());
        StreamAttempt::Open(FrameStream {
            frames,
            cancel,
            finished: false,
        })
    }
}

/// Lazy, single-pass sequence of decoded frames.
///
/// Stops after a terminal (`done`/`error`) frame or on cancellation, and
/// never yields again afterwards. Dropping it releases the connection.
pub struct FrameStream {
    frames: FramedRead<StreamReader<ByteSource, bytes::Bytes>, FrameCodec>,
    cancel: CancellationToken,
    finished: bool,
}

impl FrameStream {
    /// Next frame, a decode/transport error, or None once the sequence is
    /// over. Frames come out strictly in transmission order.
    pub async fn next_frame(&mut self) -> Option<std::result::Result<StreamFrame, RaglineError>> {
        if self.finished || self.cancel.is_cancelled() {
            return None;
        }

        let item = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!("frame stream cancelled; abandoning in-flight read");
                self.finished = true;
                return None;
            }
            item = self.frames.next() => item,
        };

        match item {
            Some(Ok(frame)) => {
                if frame.event.is_terminal() {
                    self.finished = true;
                }
                Some(Ok(frame))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}
