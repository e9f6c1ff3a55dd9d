use std::future::Future;
use std::time::Duration;

use crate::proxy::config::ModelTier;

/// One entry of an ordered attempt list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub model: String,
    pub timeout: Duration,
}

impl Attempt {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            timeout,
        }
    }
}

impl From<&ModelTier> for Attempt {
    fn from(tier: &ModelTier) -> Self {
        Attempt::new(tier.name.clone(), tier.timeout())
    }
}

#[derive(Debug)]
pub enum FallbackOutcome<T, E> {
    Success {
        value: T,
        model: String,
        index: usize,
    },
    /// Every attempt made failed, or a failure was not eligible for fallback.
    Exhausted { errors: Vec<(String, E)> },
}

#[cfg(test)]
impl<T, E> FallbackOutcome<T, E> {
    fn last_error(&self) -> Option<&E> {
        match self {
            FallbackOutcome::Success { .. } => None,
            FallbackOutcome::Exhausted { errors } => errors.last().map(|(_, e)| e),
        }
    }
}

/// Runs `call` against each attempt in order, strictly one at a time, and
/// stops at the first success. A failure for which `should_continue` returns
/// false ends the run without trying the remaining attempts.
pub async fn run_with_fallback<T, E, F, Fut, P>(
    attempts: &[Attempt],
    should_continue: P,
    mut call: F,
) -> FallbackOutcome<T, E>
where
    F: FnMut(usize, &Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut errors = Vec::new();
    for (index, attempt) in attempts.iter().enumerate() {
        match call(index, attempt).await {
            Ok(value) => {
                if index > 0 {
                    tracing::info!(
                        model = %attempt.model,
                        attempt = index + 1,
                        "Fallback model succeeded"
                    );
                }
                return FallbackOutcome::Success {
                    value,
                    model: attempt.model.clone(),
                    index,
                };
            }
            Err(e) => {
                let has_next = index + 1 < attempts.len();
                let eligible = should_continue(&e);
                if has_next && eligible {
                    tracing::warn!(
                        model = %attempt.model,
                        next_model = %attempts[index + 1].model,
                        "Model attempt failed, falling back: {}",
                        e
                    );
                } else {
                    tracing::warn!(model = %attempt.model, "Model attempt failed: {}", e);
                }
                errors.push((attempt.model.clone(), e));
                if !eligible {
                    break;
                }
            }
        }
    }
    FallbackOutcome::Exhausted { errors }
}
