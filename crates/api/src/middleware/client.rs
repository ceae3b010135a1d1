//! Caller context extractor.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use agora_core::client::{ClientType, CLIENT_TYPE_HEADER, CLIENT_TYPE_QUERY_PARAM};
use axum::extract::{ConnectInfo, FromRequestParts, Query};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::service::ClientContext;

/// Client type from the `x-client-type` header, else the `client_type`
/// query parameter.
pub fn client_type(parts: &Parts) -> ClientType {
    let header = parts
        .headers
        .get(CLIENT_TYPE_HEADER)
        .and_then(|v| v.to_str().ok());
    if header.is_some() {
        return ClientType::from_value(header);
    }

    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri).ok();
    let value = query
        .as_ref()
        .and_then(|Query(params)| params.get(CLIENT_TYPE_QUERY_PARAM))
        .map(String::as_str);
    ClientType::from_value(value)
}

/// First `x-forwarded-for` entry, else the socket peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientContext {
            client_type: client_type(parts),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            ip_address: client_ip(&parts.headers, peer),
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_wins_over_query() {
        let p = parts("/x?client_type=web", &[("x-client-type", "mobile")]);
        assert_eq!(client_type(&p), ClientType::Other);
    }

    #[test]
    fn query_param_selects_web() {
        let p = parts("/api/v1/auth/google?client_type=web", &[]);
        assert_eq!(client_type(&p), ClientType::Web);
        assert_eq!(client_type(&parts("/x", &[])), ClientType::Other);
    }

    #[test]
    fn query_param_is_percent_decoded() {
        let p = parts("/api/v1/auth/google?state=a%26b&client_type=%77eb", &[]);
        assert_eq!(client_type(&p), ClientType::Web);
        let p = parts("/api/v1/auth/google?client_type=%6Dobile", &[]);
        assert_eq!(client_type(&p), ClientType::Other);
    }

    #[test]
    fn forwarded_for_first_hop() {
        let p = parts("/", &[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_ip(&p.headers, Some(peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)).as_deref(), Some("127.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[tokio::test]
    async fn extracts_full_context() {
        let mut p = parts(
            "/",
            &[("x-client-type", "web"), ("user-agent", "curl/8.0")],
        );
        let ctx = ClientContext::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(ctx.client_type, ClientType::Web);
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(ctx.ip_address, None);
    }
}
