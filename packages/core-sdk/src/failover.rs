use std::future::Future;

use tracing::{info, warn};

use crate::{
    error::{RelayError, Retryable},
    retry::RetryPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Succeeded,
    RetryableFailure,
    FatalFailure,
}

/**
 * \brief 单次模型尝试的记录，仅在一次请求内存在。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub status: AttemptStatus,
    pub error: Option<String>,
}

/**
 * \brief 故障转移的终态。
 */
#[derive(Debug)]
pub enum FailoverOutcome<T> {
    /** \brief 某个模型成功，后续模型不再尝试。 */
    Succeeded { model: String, value: T },
    /** \brief 不可重试错误：与模型无关，直接中止整个循环。 */
    Fatal { model: String, error: RelayError },
    /** \brief 所有模型均以可重试错误失败（或模型列表为空）。 */
    Exhausted { last_error: Option<RelayError> },
}

#[derive(Debug)]
pub struct Failover<T> {
    pub outcome: FailoverOutcome<T>,
    pub attempts: Vec<ModelAttempt>,
}

/**
 * \brief 按优先级依次尝试模型，每个模型的调用都经过重试策略。
 */
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelFailover {
    retry: RetryPolicy,
}

impl ModelFailover {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub async fn run<T, F, Fut>(&self, models: &[String], mut attempt: F) -> Failover<T>
    where
        F: FnMut(&str) -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let mut attempts = Vec::with_capacity(models.len());
        let mut last_error = None;

        for model in models {
            info!(model = %model, "attempting model");
            match self.retry.run(|| attempt(model.as_str())).await {
                Ok(value) => {
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        status: AttemptStatus::Succeeded,
                        error: None,
                    });
                    return Failover {
                        outcome: FailoverOutcome::Succeeded {
                            model: model.clone(),
                            value,
                        },
                        attempts,
                    };
                }
                Err(error) if error.is_retryable() => {
                    warn!(model = %model, error = %error, "model unavailable, trying next");
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        status: AttemptStatus::RetryableFailure,
                        error: Some(error.to_string()),
                    });
                    last_error = Some(error);
                }
                Err(error) => {
                    warn!(model = %model, error = %error, "model failed with fatal error");
                    attempts.push(ModelAttempt {
                        model: model.clone(),
                        status: AttemptStatus::FatalFailure,
                        error: Some(error.to_string()),
                    });
                    return Failover {
                        outcome: FailoverOutcome::Fatal {
                            model: model.clone(),
                            error,
                        },
                        attempts,
                    };
                }
            }
        }

        Failover {
            outcome: FailoverOutcome::Exhausted { last_error },
            attempts,
        }
    }
}
