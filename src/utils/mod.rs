use std::net::SocketAddr;

use axum::http::HeaderMap;
use uuid::Uuid;

/// 请求关联 ID 的响应头
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 无法识别客户端时使用的限流键
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 优先沿用请求自带的关联 ID，否则生成新的
pub fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 解析客户端标识，仅在信任代理时读取转发头
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let remote_ip = peer.map(|addr| addr.ip().to_string());

    let forwarded = trust_proxy
        .then(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .filter(|ip| !ip.trim().is_empty())
                .or_else(|| {
                    headers
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
                })
        })
        .flatten();

    forwarded
        .or(remote_ip.as_deref())
        .unwrap_or(UNKNOWN_CLIENT)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn request_id_is_echoed_or_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(request_id_from(&headers), "abc");

        let generated = request_id_from(&HeaderMap::new());
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn forwarded_headers_need_trust() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 10.0.0.7, 10.0.0.1"));
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.5");
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.7");

        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        assert_eq!(client_key(&headers, Some(peer), true), "10.9.9.9");
    }

    #[test]
    fn unknown_peer() {
        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }
}
