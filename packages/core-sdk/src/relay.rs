use std::time::Duration;

use async_stream::stream;
use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use tracing::error;

use crate::{error::RelayError, models::StreamChunk};

/** \brief 回放兜底文本时每个字符之间的默认间隔。 */
pub const DEFAULT_REPLAY_DELAY: Duration = Duration::from_millis(50);

/** \brief 流式过程中失败时推送给客户端的错误文本。 */
pub const STREAM_FAILED: &str = "Failed to get response from AI";

/**
 * \brief 流结束标记的两种写法，按接口固定其一。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /** \brief `data: [DONE]` */
    DoneMarker,
    /** \brief `data: {"text":"","done":true}` */
    DoneChunk,
}

/**
 * \brief 一个 SSE 事件。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Chunk(StreamChunk),
    Done(Framing),
}

impl SseFrame {
    pub fn data(&self) -> String {
        match self {
            SseFrame::Chunk(chunk) => chunk_json(chunk),
            SseFrame::Done(Framing::DoneMarker) => "[DONE]".to_string(),
            SseFrame::Done(Framing::DoneChunk) => chunk_json(&StreamChunk::done()),
        }
    }

    /**
     * \brief 按 `data: <payload>\n\n` 编码。
     */
    #[cfg(test)]
    fn encode(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    pub fn into_event(self) -> Event {
        Event::default().data(self.data())
    }

    #[cfg(test)]
    fn is_terminal(&self) -> bool {
        match self {
            SseFrame::Chunk(chunk) => chunk.done,
            SseFrame::Done(_) => true,
        }
    }
}

fn chunk_json(chunk: &StreamChunk) -> String {
    serde_json::to_string(chunk).unwrap_or_else(|_| r#"{"text":"","done":true}"#.to_string())
}

/**
 * \brief 实时模式：转发 Provider 增量，跳过空片段；正常结束后发送结束标记。
 * 中途出错时发送一条带 error 的终止事件，不再发送结束标记。
 *
 * 返回的流被丢弃（客户端断开）时，上游流随之释放。
 */
pub fn live<S>(upstream: S, framing: Framing) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<String, RelayError>> + Send + 'static,
{
    stream! {
        let mut upstream = Box::pin(upstream);
        let mut failed = false;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(text) => {
                    if !text.is_empty() {
                        yield SseFrame::Chunk(StreamChunk::text(text));
                    }
                }
                Err(err) => {
                    error!(error = %err, "upstream stream failed");
                    yield SseFrame::Chunk(StreamChunk::error(STREAM_FAILED));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            yield SseFrame::Done(framing);
        }
    }
}

/**
 * \brief 回放模式：逐字符推送整段文本，每个字符后等待 delay，最后发送结束标记。
 */
pub fn replay(
    text: impl Into<String>,
    delay: Duration,
    framing: Framing,
) -> impl Stream<Item = SseFrame> + Send {
    let text = text.into();
    stream! {
        for ch in text.chars() {
            yield SseFrame::Chunk(StreamChunk::text(ch.to_string()));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        yield SseFrame::Done(framing);
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn frames_encode_as_data_lines() {
        assert_eq!(
            SseFrame::Chunk(StreamChunk::text("Hi")).encode(),
            "data: {\"text\":\"Hi\",\"done\":false}\n\n"
        );
        assert_eq!(SseFrame::Done(Framing::DoneMarker).encode(), "data: [DONE]\n\n");
        assert_eq!(
            SseFrame::Done(Framing::DoneChunk).encode(),
            "data: {\"text\":\"\",\"done\":true}\n\n"
        );
        assert_eq!(
            SseFrame::Chunk(StreamChunk::error("boom")).encode(),
            "data: {\"text\":\"\",\"done\":true,\"error\":\"boom\"}\n\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn replay_emits_one_event_per_char() {
        let frames = replay("Hi", DEFAULT_REPLAY_DELAY, Framing::DoneChunk);
        futures_util::pin_mut!(frames);

        let mut seen = Vec::new();
        while let Some(frame) = frames.next().await {
            seen.push((Instant::now(), frame));
        }

        let kinds: Vec<SseFrame> = seen.iter().map(|(_, f)| f.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                SseFrame::Chunk(StreamChunk::text("H")),
                SseFrame::Chunk(StreamChunk::text("i")),
                SseFrame::Done(Framing::DoneChunk),
            ]
        );
        assert_eq!(seen[1].0 - seen[0].0, DEFAULT_REPLAY_DELAY);
        assert_eq!(seen[2].0 - seen[1].0, DEFAULT_REPLAY_DELAY);
    }

    #[tokio::test]
    async fn replay_handles_multibyte_text() {
        let frames: Vec<SseFrame> = replay("é✓", Duration::ZERO, Framing::DoneMarker)
            .collect()
            .await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], SseFrame::Chunk(StreamChunk::text("✓")));
    }

    #[tokio::test]
    async fn live_skips_empty_fragments() {
        let upstream = stream::iter(vec![
            Ok::<_, RelayError>("Hel".to_string()),
            Ok(String::new()),
            Ok("lo".to_string()),
        ]);
        let frames: Vec<SseFrame> = live(upstream, Framing::DoneMarker).collect().await;
        assert_eq!(
            frames,
            vec![
                SseFrame::Chunk(StreamChunk::text("Hel")),
                SseFrame::Chunk(StreamChunk::text("lo")),
                SseFrame::Done(Framing::DoneMarker),
            ]
        );
    }

    #[tokio::test]
    async fn live_error_ends_stream_in_band() {
        let upstream = stream::iter(vec![
            Ok("partial".to_string()),
            Err(RelayError::Provider("connection reset".into())),
            Ok("never".to_string()),
        ]);
        let frames: Vec<SseFrame> = live(upstream, Framing::DoneChunk).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], SseFrame::Chunk(StreamChunk::error(STREAM_FAILED)));
        assert!(frames[1].is_terminal());
    }
}
