use std::future::Future;

/// Per-request identity carried through the task that serves it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub client_ip: Option<String>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            client_ip: Some(client_ip.into()),
        }
    }
}

tokio::task_local! {
    static CURRENT: RequestContext;
}

pub async fn with_request_context<F, T>(ctx: RequestContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT.scope(ctx, fut).await
}

pub fn try_get() -> Option<RequestContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

pub fn current_request_id() -> Option<String> {
    try_get().and_then(|ctx| ctx.request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_visible_inside_scope_only() {
        assert!(try_get().is_none());
        let seen = with_request_context(RequestContext::new("req-1", "10.0.0.1"), async {
            current_request_id()
        })
        .await;
        assert_eq!(seen.as_deref(), Some("req-1"));
        assert!(current_request_id().is_none());
    }
}
