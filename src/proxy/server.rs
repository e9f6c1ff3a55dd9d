use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error};

use crate::proxy::config::GatewayConfig;
use crate::proxy::handlers::errors::{handle_not_found, handle_panic};
use crate::proxy::middleware::{cors_middleware, request_context_middleware};
use crate::proxy::rate_limit::RateLimiter;
use crate::proxy::state::AppState;

/// Full application: routes plus, outermost first, request context, CORS,
/// panic catch and body limit.
pub fn build_app(state: AppState) -> Router {
    crate::proxy::routes::build_api_routes()
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            cors_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_context_middleware,
        ))
        .with_state(state)
}

pub struct AxumServer {
    pub local_addr: SocketAddr,
    purge_task: tokio::task::JoinHandle<()>,
}

impl AxumServer {
    pub async fn start(
        config: &GatewayConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let rate_limiter = Arc::new(RateLimiter::new());
        let state = AppState::with_rate_limiter(config, rate_limiter.clone())
            .map_err(|e| format!("Failed to build gateway state: {}", e))?;
        let purge_task = rate_limiter.spawn_purge_task(Duration::from_secs(
            config.rate_limits.purge_interval_secs.max(1),
        ));

        tracing::info!(
            "Request body size limit: {} MB",
            config.max_body_size / 1024 / 1024
        );
        let app = build_app(state);

        let addr = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Address {} binding failed: {}", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        tracing::info!("Gateway started at http://{}", local_addr);

        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                match listener.accept().await {
                    Ok((stream, remote_addr)) => {
                        let io = TokioIo::new(stream);
                        use hyper::body::Incoming;
                        use tower::ServiceExt;
                        let app_with_info = app.clone().map_request(
                            move |mut req: axum::http::Request<Incoming>| {
                                req.extensions_mut()
                                    .insert(axum::extract::ConnectInfo(remote_addr));
                                req
                            },
                        );

                        let service = TowerToHyperService::new(app_with_info);

                        tokio::task::spawn(async move {
                            if let Err(err) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection handling ended or failed: {:?}", err);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {:?}", e);
                    }
                }
            }
        });

        Ok((
            Self {
                local_addr,
                purge_task,
            },
            handle,
        ))
    }

    pub fn shutdown(&self) {
        self.purge_task.abort();
        tracing::info!("Rate-limit purge task stopped");
    }
}
