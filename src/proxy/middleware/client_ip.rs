use axum::extract::Request;

/// Rate-limit key for the caller, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Edge header first, then the socket peer, then `unknown`.
pub(crate) fn extract_client_ip(request: &Request, header_name: &str) -> String {
    let from_header = request
        .headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    from_header
        .or_else(|| {
            request
                .extensions()
                .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::extract_client_ip;
    use axum::{body::Body, extract::ConnectInfo, http::Request};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    #[test]
    fn prefers_configured_header() {
        let socket = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 8080);
        let mut req = Request::builder()
            .uri("/api/chat")
            .header("cf-connecting-ip", " 203.0.113.10 ")
            .body(Body::empty())
            .expect("request build");
        req.extensions_mut().insert(ConnectInfo(socket));

        assert_eq!(extract_client_ip(&req, "cf-connecting-ip"), "203.0.113.10");
    }

    #[test]
    fn ignores_other_forwarding_headers() {
        let socket = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 10, 20)), 9000);
        let mut req = Request::builder()
            .uri("/api/chat")
            .header("x-forwarded-for", "203.0.113.10, 198.51.100.4")
            .body(Body::empty())
            .expect("request build");
        req.extensions_mut().insert(ConnectInfo(socket));

        assert_eq!(extract_client_ip(&req, "cf-connecting-ip"), "192.168.10.20");
    }

    #[test]
    fn falls_back_to_unknown() {
        let req = Request::builder()
            .uri("/api/chat")
            .header("cf-connecting-ip", "")
            .body(Body::empty())
            .expect("request build");

        assert_eq!(extract_client_ip(&req, "cf-connecting-ip"), "unknown");
    }
}
