use std::{pin::Pin, sync::Arc, time::Duration};

use futures_util::Stream;
use tracing::{debug, info};

use crate::{
    config::ChatProfile,
    error::RelayError,
    failover::{FailoverOutcome, ModelFailover},
    fallback,
    history::normalize_history,
    llm::{ChatProvider, HttpProvider, TextStream},
    models::RawHistoryEntry,
    relay::{self, SseFrame},
    retry::RetryPolicy,
};

pub type FrameStream = Pin<Box<dyn Stream<Item = SseFrame> + Send>>;

/**
 * \brief 流式请求的结果：模型实时流或兜底文本。
 */
pub enum ChatReply {
    Live { model: String, stream: TextStream },
    Fallback {
        text: &'static str,
        last_error: Option<RelayError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    Model(String),
    Fallback,
}

/**
 * \brief 非流式请求的结果。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReply {
    pub source: ReplySource,
    pub text: String,
}

/**
 * \brief 一个接口的完整处理链：整理历史 → 模型故障转移 → 兜底 → 输出。
 * 与传输方式无关，HTTP 服务与 CLI 共用。
 */
pub struct ChatService {
    profile: ChatProfile,
    provider: Arc<dyn ChatProvider>,
    failover: ModelFailover,
    replay_delay: Duration,
}

impl ChatService {
    pub fn new(
        profile: ChatProfile,
        provider: Arc<dyn ChatProvider>,
        retry: RetryPolicy,
        replay_delay: Duration,
    ) -> Self {
        Self {
            profile,
            provider,
            failover: ModelFailover::new(retry),
            replay_delay,
        }
    }

    /**
     * \brief 使用 HTTP Provider 构建。
     */
    pub fn from_profile(
        profile: ChatProfile,
        retry: RetryPolicy,
        replay_delay: Duration,
    ) -> Result<Self, RelayError> {
        let provider = HttpProvider::new(profile.provider.clone())?;
        Ok(Self::new(profile, Arc::new(provider), retry, replay_delay))
    }

    pub fn profile(&self) -> &ChatProfile {
        &self.profile
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /**
     * \brief 打开流式回复。不可重试的错误直接返回（此时尚未向客户端写出任何内容）。
     */
    pub async fn open_stream(
        &self,
        message: &str,
        history: &[RawHistoryEntry],
    ) -> Result<ChatReply, RelayError> {
        let messages = normalize_history(&self.profile.system_prompt, history, message);
        let messages = &messages;
        let provider = &self.provider;
        let params = &self.profile.params;

        let result = self
            .failover
            .run(&self.profile.models, |model| {
                let model = model.to_string();
                async move { provider.stream_chat(&model, messages, params).await }
            })
            .await;
        debug!(profile = %self.profile.name, attempts = ?result.attempts, "failover finished");

        match result.outcome {
            FailoverOutcome::Succeeded { model, value } => Ok(ChatReply::Live {
                model,
                stream: value,
            }),
            FailoverOutcome::Fatal { error, .. } => Err(error),
            FailoverOutcome::Exhausted { last_error } => {
                info!(profile = %self.profile.name, "all models failed, providing fallback response");
                Ok(ChatReply::Fallback {
                    text: fallback::respond(message),
                    last_error,
                })
            }
        }
    }

    /**
     * \brief 非流式回复，故障转移与兜底规则与流式一致。
     */
    pub async fn complete(
        &self,
        message: &str,
        history: &[RawHistoryEntry],
    ) -> Result<CompletedReply, RelayError> {
        let messages = normalize_history(&self.profile.system_prompt, history, message);
        let messages = &messages;
        let provider = &self.provider;
        let params = &self.profile.params;

        let result = self
            .failover
            .run(&self.profile.models, |model| {
                let model = model.to_string();
                async move { provider.chat_once(&model, messages, params).await }
            })
            .await;
        debug!(profile = %self.profile.name, attempts = ?result.attempts, "failover finished");

        match result.outcome {
            FailoverOutcome::Succeeded { model, value } => Ok(CompletedReply {
                source: ReplySource::Model(model),
                text: value,
            }),
            FailoverOutcome::Fatal { error, .. } => Err(error),
            FailoverOutcome::Exhausted { .. } => {
                info!(profile = %self.profile.name, "all models failed, providing fallback response");
                Ok(CompletedReply {
                    source: ReplySource::Fallback,
                    text: fallback::respond(message).to_string(),
                })
            }
        }
    }

    /**
     * \brief 将回复转为 SSE 事件流：实时流直接转发，兜底文本逐字回放。
     */
    pub fn frames(&self, reply: ChatReply) -> FrameStream {
        let framing = self.profile.framing;
        match reply {
            ChatReply::Live { stream, .. } => Box::pin(relay::live(stream, framing)),
            ChatReply::Fallback { text, .. } => {
                Box::pin(relay::replay(text, self.replay_delay, framing))
            }
        }
    }
}
