//! Transport-neutral view of an incoming request.

use axum::http::{HeaderMap, header::COOKIE};
use std::{collections::HashMap, net::IpAddr};

pub const SESSION_COOKIE_NAME: &str = "CASTGC";

/// What the core needs from an HTTP request: the peer address, the headers
/// (trust authentication, cookies) and the merged query + form parameters.
#[derive(Clone, Debug)]
pub struct CasRequest {
    pub remote_addr: IpAddr,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
}

impl CasRequest {
    #[must_use]
    pub fn new(remote_addr: IpAddr) -> Self {
        Self {
            remote_addr,
            headers: HeaderMap::new(),
            params: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    /// Parameter value, empty when absent.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map_or("", String::as_str)
    }

    /// CAS boolean parameters are only set by the literal `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.param(key) == "true"
    }

    pub fn service(&self) -> &str {
        self.param("service")
    }

    /// Value of the `CASTGC` cookie, if sent.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let mut parts = pair.trim().splitn(2, '=');
                let key = parts.next()?.trim();
                let val = parts.next()?.trim();
                (key == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
            })
    }
}

/// Merge `application/x-www-form-urlencoded` query and body parameters.
/// Body values win over query values with the same name.
pub fn form_params(query: Option<&str>, body: &[u8]) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    params.extend(url::form_urlencoded::parse(body).into_owned());
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::Ipv4Addr;

    fn request() -> CasRequest {
        CasRequest::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn flag_requires_literal_true() {
        let req = request()
            .with_param("renew", "true")
            .with_param("gateway", "1");
        assert!(req.flag("renew"));
        assert!(!req.flag("gateway"));
        assert!(!req.flag("missing"));
    }

    #[test]
    fn session_cookie_is_extracted_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; CASTGC=TGT-abc; lang=en"),
        );
        let req = request().with_headers(headers);
        assert_eq!(req.session_cookie(), Some("TGT-abc".to_string()));
    }

    #[test]
    fn empty_session_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("CASTGC="));
        assert_eq!(request().with_headers(headers).session_cookie(), None);
        assert_eq!(request().session_cookie(), None);
    }

    #[test]
    fn form_params_prefer_body_over_query() {
        let params = form_params(
            Some("service=https%3A%2F%2Fa.example.com&renew=true"),
            b"service=https%3A%2F%2Fb.example.com&lt=LT-1",
        );
        assert_eq!(
            params.get("service").map(String::as_str),
            Some("https://b.example.com")
        );
        assert_eq!(params.get("renew").map(String::as_str), Some("true"));
        assert_eq!(params.get("lt").map(String::as_str), Some("LT-1"));
    }
}
