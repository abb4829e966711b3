use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::{
    models::{GenerationParams, ProviderKind, ProviderSettings},
    prompts::{PRODUCT_EXPERT_PROMPT, VET_ASSISTANT_PROMPT},
    relay::{Framing, DEFAULT_REPLAY_DELAY},
    retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES},
};

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENAI_MODELS: &[&str] = &["gpt-3.5-turbo"];
pub const DEFAULT_GEMINI_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];

/**
 * \brief 单个接口使用的对话配置：Provider、模型优先级、人设与结束标记。
 */
#[derive(Debug, Clone)]
pub struct ChatProfile {
    pub name: String,
    pub provider: ProviderSettings,
    /** \brief 按优先级排列的模型名 */
    pub models: Vec<String>,
    pub system_prompt: String,
    pub params: GenerationParams,
    pub framing: Framing,
}

/**
 * \brief 服务整体配置。
 */
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /** \brief 监听地址，如 "127.0.0.1:5000" */
    pub addr: String,
    /** \brief `/api/chat` 使用的配置 */
    pub assistant: ChatProfile,
    /** \brief `/api/gemini*` 使用的配置 */
    pub product: ChatProfile,
    pub retry: RetryPolicy,
    /** \brief 兜底文本逐字回放的间隔 */
    pub replay_delay: Duration,
}

impl RelayConfig {
    /**
     * \brief 从进程环境变量读取配置。
     */
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = get("CHATRELAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let assistant = ChatProfile {
            name: "assistant".to_string(),
            provider: ProviderSettings {
                kind: ProviderKind::OpenAI,
                api_base: get("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string()),
                api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            },
            models: model_list(get("CHATRELAY_OPENAI_MODELS"), DEFAULT_OPENAI_MODELS),
            system_prompt: VET_ASSISTANT_PROMPT.to_string(),
            params: GenerationParams::default(),
            framing: Framing::DoneMarker,
        };

        let product = ChatProfile {
            name: "product".to_string(),
            provider: ProviderSettings {
                kind: ProviderKind::Gemini,
                api_base: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_BASE.to_string()),
                api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            },
            models: model_list(get("CHATRELAY_GEMINI_MODELS"), DEFAULT_GEMINI_MODELS),
            system_prompt: PRODUCT_EXPERT_PROMPT.to_string(),
            params: GenerationParams::default(),
            framing: Framing::DoneChunk,
        };

        let max_retries = parse_or(
            "CHATRELAY_MAX_RETRIES",
            get("CHATRELAY_MAX_RETRIES"),
            DEFAULT_MAX_RETRIES,
        )?;
        let base_delay_ms = parse_or(
            "CHATRELAY_BASE_DELAY_MS",
            get("CHATRELAY_BASE_DELAY_MS"),
            DEFAULT_BASE_DELAY.as_millis() as u64,
        )?;
        let replay_delay_ms = parse_or(
            "CHATRELAY_REPLAY_DELAY_MS",
            get("CHATRELAY_REPLAY_DELAY_MS"),
            DEFAULT_REPLAY_DELAY.as_millis() as u64,
        )?;

        let config = Self {
            addr,
            assistant,
            product,
            retry: RetryPolicy::new(max_retries, Duration::from_millis(base_delay_ms)),
            replay_delay: Duration::from_millis(replay_delay_ms),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for profile in [&self.assistant, &self.product] {
            if profile.models.is_empty() {
                return Err(anyhow!("profile {} has no models configured", profile.name));
            }
        }
        Ok(())
    }
}

fn model_list(raw: Option<String>, defaults: &[&str]) -> Vec<String> {
    match raw {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => defaults.iter().map(|s| s.to_string()).collect(),
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<RelayConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.assistant.models, vec!["gpt-3.5-turbo"]);
        assert_eq!(
            config.product.models,
            vec!["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"]
        );
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.replay_delay, Duration::from_millis(50));
        assert_eq!(config.assistant.framing, Framing::DoneMarker);
        assert_eq!(config.product.framing, Framing::DoneChunk);
    }

    #[test]
    fn env_overrides_models_and_timing() {
        let config = config_from(&[
            ("CHATRELAY_GEMINI_MODELS", " a , b,,"),
            ("CHATRELAY_MAX_RETRIES", "1"),
            ("CHATRELAY_REPLAY_DELAY_MS", "0"),
            ("GEMINI_API_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(config.product.models, vec!["a", "b"]);
        assert_eq!(config.retry.max_retries, 1);
        assert!(config.replay_delay.is_zero());
        assert_eq!(config.product.provider.api_key, "secret");
    }

    #[test]
    fn rejects_bad_numbers_and_empty_model_lists() {
        let err = config_from(&[("CHATRELAY_MAX_RETRIES", "many")]).unwrap_err();
        assert!(err.to_string().contains("CHATRELAY_MAX_RETRIES"));
        assert!(config_from(&[("CHATRELAY_OPENAI_MODELS", ",")]).is_err());
    }
}
