//! Request extractors

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Method, header};

/// Request metadata recorded on the request transaction.
///
/// Never rejects: a missing user agent becomes an empty string and the remote
/// address is only known when the router was served with connect info.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub target: String,
    pub user_agent: String,
    pub remote_addr: Option<SocketAddr>,
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            method: parts.method.clone(),
            target,
            user_agent,
            remote_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> RequestMeta {
        let (mut parts, _) = req.into_parts();
        RequestMeta::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_extracts_method_target_and_agent() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/?batch=1")
            .header(header::USER_AGENT, "curl/8.0")
            .body(())
            .unwrap();
        let meta = extract(req).await;
        assert_eq!(meta.method, Method::POST);
        assert_eq!(meta.target, "/?batch=1");
        assert_eq!(meta.user_agent, "curl/8.0");
        assert!(meta.remote_addr.is_none());
    }

    #[tokio::test]
    async fn test_missing_user_agent_is_empty() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let meta = extract(req).await;
        assert_eq!(meta.user_agent, "");
    }

    #[tokio::test]
    async fn test_reads_connect_info() {
        let addr: SocketAddr = "10.0.0.7:51000".parse().unwrap();
        let mut req = Request::builder().uri("/").body(()).unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        let meta = extract(req).await;
        assert_eq!(meta.remote_addr, Some(addr));
    }
}
