use crate::urls::QueryParams;
use axum::{
    extract::Request,
    http::{header, HeaderMap, Method, Uri},
};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Per-request view the flow handlers work from.
///
/// Built fresh for every request; nothing here is ever stored on the shared
/// [`WebFlow`](super::WebFlow).
#[derive(Clone, Debug)]
pub struct FlowRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    /// Request target as received (path and query, or absolute form)
    pub url: String,
    /// External origin, e.g. `https://app.example.com`
    pub host: String,
}

impl FlowRequest {
    pub(crate) fn from_request(req: &Request, origin: Option<&str>) -> Self {
        let uri = req.uri();
        let host = match origin {
            Some(origin) => origin.to_string(),
            None => infer_host(uri, req.headers()),
        };

        Self {
            method: req.method().clone(),
            path: uri.path().to_string(),
            query: QueryParams::parse(uri.query()),
            url: uri.to_string(),
            host,
        }
    }

    /// First value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    /// Request path lowercased with any trailing slash removed.
    pub(crate) fn normalized_path(&self) -> String {
        self.path.trim_end_matches('/').to_ascii_lowercase()
    }
}

fn infer_host(uri: &Uri, headers: &HeaderMap) -> String {
    let authority = uri
        .authority()
        .map(|authority| authority.as_str().to_string())
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "localhost".to_string());

    let forwarded_https = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false);

    let scheme = if forwarded_https {
        "https"
    } else {
        uri.scheme_str().unwrap_or("http")
    };

    format!("{}://{}", scheme, authority)
}
