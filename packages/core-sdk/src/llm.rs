use std::pin::Pin;

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::{
    error::RelayError,
    models::{ChatMessage, GenerationParams, ProviderKind, ProviderSettings, Role},
};

/** \brief Provider 增量文本流。 */
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/**
 * \brief 对外部 LLM 的抽象：给定模型与消息，返回完整文本或增量流。
 * 实现需无状态、可在并发请求间共享。
 */
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<TextStream, RelayError>;

    async fn chat_once(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, RelayError>;

    async fn list_models(&self) -> Result<Vec<String>, RelayError>;
}

/**
 * \brief 基于 reqwest 的 OpenAI / Gemini 客户端，进程内构建一次后复用。
 */
#[derive(Debug, Clone)]
pub struct HttpProvider {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { settings, client })
    }

    fn openai_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    fn gemini_url(&self, path: &str) -> String {
        format!("{}/{}", normalize_gemini_base(&self.settings.api_base), path)
    }

    async fn send_openai(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response, RelayError> {
        let body = json!({
            "model": model,
            "messages": messages,
            "stream": stream,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "top_p": params.top_p,
        });
        let resp = self
            .client
            .post(self.openai_url("chat/completions"))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()
            .await?;
        ensure_success(resp, "openai request failed").await
    }

    async fn send_gemini(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response, RelayError> {
        let (system_prompt, contents) = gemini_payload(messages);
        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_tokens,
                "topP": params.top_p,
            },
        });
        if let Some(sys) = system_prompt {
            body["system_instruction"] = json!({
                "parts": [{"text": sys}]
            });
        }

        let request = if stream {
            self.client
                .post(self.gemini_url(&format!("models/{}:streamGenerateContent", model)))
                .query(&[("alt", "sse"), ("key", self.settings.api_key.as_str())])
        } else {
            self.client
                .post(self.gemini_url(&format!("models/{}:generateContent", model)))
                .query(&[("key", self.settings.api_key.as_str())])
        };
        let resp = request.json(&body).send().await?;
        ensure_success(resp, "gemini request failed").await
    }
}

#[async_trait]
impl ChatProvider for HttpProvider {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<TextStream, RelayError> {
        match self.settings.kind {
            ProviderKind::OpenAI => {
                let resp = self.send_openai(model, messages, params, true).await?;
                Ok(Box::pin(
                    sse_payloads(resp).filter_map(|item| async move {
                        match item {
                            Ok(line) => parse_openai_event(&line),
                            Err(e) => Some(Err(e)),
                        }
                    }),
                ))
            }
            ProviderKind::Gemini => {
                let resp = self.send_gemini(model, messages, params, true).await?;
                Ok(Box::pin(
                    sse_payloads(resp).filter_map(|item| async move {
                        match item {
                            Ok(line) => parse_gemini_event(&line),
                            Err(e) => Some(Err(e)),
                        }
                    }),
                ))
            }
        }
    }

    async fn chat_once(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, RelayError> {
        match self.settings.kind {
            ProviderKind::OpenAI => {
                let resp = self.send_openai(model, messages, params, false).await?;
                let v: Value = resp.json().await?;
                Ok(extract_openai_content(&v))
            }
            ProviderKind::Gemini => {
                let resp = self.send_gemini(model, messages, params, false).await?;
                let v: Value = resp.json().await?;
                if let Some(reason) = gemini_block_reason(&v) {
                    return Err(RelayError::from_provider_message(format!(
                        "gemini response blocked: {}",
                        reason
                    )));
                }
                Ok(extract_gemini_content(&v))
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, RelayError> {
        match self.settings.kind {
            ProviderKind::OpenAI => {
                let resp = self
                    .client
                    .get(self.openai_url("models"))
                    .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
                    .send()
                    .await?;
                let resp = ensure_success(resp, "list models failed").await?;
                parse_model_list(resp.json().await?)
            }
            ProviderKind::Gemini => {
                let resp = self
                    .client
                    .get(self.gemini_url("models"))
                    .query(&[("key", self.settings.api_key.as_str())])
                    .send()
                    .await?;
                let resp = ensure_success(resp, "gemini list models failed").await?;
                parse_gemini_model_list(resp.json().await?)
            }
        }
    }
}

/**
 * \brief 非 2xx 响应转为错误；错误文本包含状态码与响应体，供重试策略分类。
 */
async fn ensure_success(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, RelayError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    Err(RelayError::from_provider_message(format!(
        "{}: {} -> {}",
        what, status, text
    )))
}

/**
 * \brief 将响应体按 SSE 事件切分，逐个产出 data 内容，遇到 `[DONE]` 结束。
 */
fn sse_payloads(resp: reqwest::Response) -> impl Stream<Item = Result<String, RelayError>> + Send {
    let mut stream = resp.bytes_stream();
    try_stream! {
        let mut buf = Vec::<u8>::new();
        let mut finished = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(&chunk);
            while let Some((pos, len)) = find_event_boundary(&buf) {
                let block = buf.drain(..pos + len).collect::<Vec<u8>>();
                if let Some(line) = extract_data_line(&block) {
                    if line == "[DONE]" {
                        finished = true;
                        break;
                    }
                    yield line;
                }
            }
            if finished {
                break;
            }
        }
        if !finished {
            if let Some(line) = extract_data_line(&buf) {
                if line != "[DONE]" {
                    yield line;
                }
            }
        }
    }
}

fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn extract_data_line(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    for line in text.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix("data:") {
            return Some(rest.trim().to_string());
        }
    }
    None
}

fn parse_openai_event(line: &str) -> Option<Result<String, RelayError>> {
    let v: Value = serde_json::from_str(line).ok()?;
    if let Some(err) = v.get("error") {
        return Some(Err(RelayError::from_provider_message(format!(
            "openai stream error: {}",
            err
        ))));
    }
    v.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(|s| Ok(s.to_string()))
}

fn parse_gemini_event(line: &str) -> Option<Result<String, RelayError>> {
    let v: Value = serde_json::from_str(line).ok()?;
    if let Some(err) = v.get("error") {
        return Some(Err(RelayError::from_provider_message(format!(
            "gemini stream error: {}",
            err
        ))));
    }
    if let Some(reason) = gemini_block_reason(&v) {
        return Some(Err(RelayError::from_provider_message(format!(
            "gemini response blocked: {}",
            reason
        ))));
    }
    Some(Ok(extract_gemini_content(&v)))
}

fn extract_openai_content(v: &Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_gemini_content(v: &Value) -> String {
    if let Some(candidates) = v.get("candidates").and_then(|c| c.as_array()) {
        if let Some(first) = candidates.first() {
            if let Some(content) = first.get("content") {
                if let Some(parts) = content.get("parts").and_then(|p| p.as_array()) {
                    return parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                        .collect::<Vec<_>>()
                        .join("");
                }
            }
        }
    }
    v.get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string()
}

/** \brief 候选内容被拦截时 Gemini 给出的 finishReason。 */
const GEMINI_BLOCKED_FINISH: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/**
 * \brief 提示词被拦截（promptFeedback.blockReason）或候选因拦截而终止
 * （candidates[0].finishReason）时返回原因。
 */
fn gemini_block_reason(v: &Value) -> Option<String> {
    let prompt = v
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str());
    let finish = v
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("finishReason"))
        .and_then(|r| r.as_str())
        .filter(|r| GEMINI_BLOCKED_FINISH.contains(r));
    prompt.or(finish).map(|r| r.to_string())
}

fn gemini_payload(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(msg.content.clone()),
            Role::Assistant => contents.push(json!({
                "role": "model",
                "parts": [{"text": msg.content}]
            })),
            Role::User => contents.push(json!({
                "role": "user",
                "parts": [{"text": msg.content}]
            })),
        }
    }
    let system_prompt = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system_prompt, contents)
}

fn parse_model_list(v: Value) -> Result<Vec<String>, RelayError> {
    if let Some(arr) = v.get("data").and_then(|x| x.as_array()) {
        Ok(arr
            .iter()
            .filter_map(|item| item.get("id").and_then(|s| s.as_str()))
            .map(|s| s.to_string())
            .collect())
    } else {
        Err(RelayError::Provider(format!("unexpected models payload: {}", v)))
    }
}

fn normalize_gemini_base(api_base: &str) -> String {
    let trimmed = api_base.trim_end_matches('/');
    if trimmed.ends_with("/v1")
        || trimmed.ends_with("/v1beta")
        || trimmed.contains("/v1/")
        || trimmed.contains("/v1beta/")
    {
        trimmed.to_string()
    } else {
        format!("{}/v1beta", trimmed)
    }
}

fn parse_gemini_model_list(v: Value) -> Result<Vec<String>, RelayError> {
    if let Some(arr) = v.get("models").and_then(|x| x.as_array()) {
        Ok(arr
            .iter()
            .filter_map(|item| item.get("name").and_then(|s| s.as_str()))
            .map(|s| s.to_string())
            .collect())
    } else {
        Err(RelayError::Provider(format!(
            "unexpected gemini models payload: {}",
            v
        )))
    }
}
