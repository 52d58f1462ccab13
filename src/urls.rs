//! Hostname sanitization, OAuth `state` encoding and query-string helpers.
//!
//! The `state` value round-trips the caller's post-login destination through
//! the identity provider with one extra `endpoint` query field naming the
//! tenant. The destination's own query segments are carried verbatim (they
//! are never decoded and re-encoded), so decoding yields the original bytes.

use crate::endpoints::TenantId;
use url::form_urlencoded;
use url::Url;

/// Query field injected into the state value to carry the tenant id.
pub const STATE_TENANT_FIELD: &str = "endpoint";

/// Return the lowercase host of a bare domain or full URL.
pub fn sanitize_host(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let lower = input.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.trim().to_ascii_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Normalize a tenant-specific hint to `<prefix><suffix>`.
///
/// Anything from the first occurrence of `suffix` onwards is replaced by the
/// suffix itself. When the suffix is absent the whole host is the prefix.
pub fn canonicalize_tenant_hint(input: &str, suffix: &str) -> Option<String> {
    let host = sanitize_host(input)?;
    let suffix = suffix.trim().to_ascii_lowercase();
    if suffix.is_empty() {
        return Some(host);
    }

    let prefix = match host.find(&suffix) {
        Some(idx) => &host[..idx],
        None => host.as_str(),
    };
    if prefix.is_empty() {
        return None;
    }

    Some(format!("{}{}", prefix, suffix))
}

/// Decoded OAuth `state`: where to send the browser after login, and which
/// tenant issued the authorize request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthState {
    pub destination: String,
    pub tenant: Option<TenantId>,
}

impl OAuthState {
    pub fn new(destination: impl Into<String>, tenant: TenantId) -> Self {
        Self {
            destination: destination.into(),
            tenant: Some(tenant),
        }
    }

    pub fn encode(&self) -> String {
        let segments = self
            .split_destination()
            .query_segments()
            .into_iter()
            .filter(|segment| !is_tenant_segment(segment))
            .map(str::to_string);

        let tenant = self.tenant.as_ref().map(|tenant| {
            format!(
                "{}={}",
                STATE_TENANT_FIELD,
                form_urlencoded::byte_serialize(tenant.as_str().as_bytes()).collect::<String>()
            )
        });

        let query: Vec<String> = segments.chain(tenant).collect();
        self.split_destination().rebuild(&query)
    }

    /// Inverse of [`OAuthState::encode`]. A missing `endpoint` field yields
    /// no tenant; the first occurrence wins when repeated.
    pub fn decode(raw: &str) -> Self {
        let parts = DestinationParts::split(raw);
        let mut tenant = None;
        let mut kept = Vec::new();

        for segment in parts.query_segments() {
            if is_tenant_segment(segment) {
                if tenant.is_none() {
                    tenant = form_urlencoded::parse(segment.as_bytes())
                        .next()
                        .map(|(_, value)| value.trim().to_string())
                        .filter(|value| !value.is_empty())
                        .map(TenantId::new);
                }
            } else {
                kept.push(segment.to_string());
            }
        }

        Self {
            destination: parts.rebuild(&kept),
            tenant,
        }
    }

    fn split_destination(&self) -> DestinationParts<'_> {
        DestinationParts::split(&self.destination)
    }
}

/// Merge the tenant id into `destination`'s query and serialize.
pub fn encode_state(destination: &str, tenant: &TenantId) -> String {
    OAuthState::new(destination, tenant.clone()).encode()
}

/// Split a state value back into destination and tenant id.
pub fn decode_state(raw: &str) -> OAuthState {
    OAuthState::decode(raw)
}

/// Raw pieces of a URL or path: everything before `?`, the raw query, and the
/// raw fragment.
struct DestinationParts<'a> {
    base: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> DestinationParts<'a> {
    fn split(input: &'a str) -> Self {
        let (rest, fragment) = match input.split_once('#') {
            Some((head, frag)) => (head, Some(frag)),
            None => (input, None),
        };
        let (base, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };
        Self {
            base,
            query,
            fragment,
        }
    }

    fn query_segments(&self) -> Vec<&'a str> {
        match self.query {
            Some(query) if !query.is_empty() => query.split('&').collect(),
            _ => Vec::new(),
        }
    }

    fn rebuild(&self, query: &[String]) -> String {
        let mut out = self.base.to_string();
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query.join("&"));
        }
        if let Some(fragment) = self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

fn is_tenant_segment(segment: &str) -> bool {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(key, _)| key == STATE_TENANT_FIELD)
        .unwrap_or(false)
}

/// Every value of a possibly repeated query parameter, in original order.
///
/// Returns `None` when the URL is blank, unparsable, or has no query.
pub fn repeated_param(url: &str, name: &str) -> Option<Vec<String>> {
    if url.trim().is_empty() {
        return None;
    }
    let parsed = parse_url_or_path(url)?;
    let query = parsed.query().filter(|q| !q.is_empty())?;

    Some(
        form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .collect(),
    )
}

fn parse_url_or_path(url_or_path: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(url_or_path) {
        return Some(url);
    }

    let normalized = if url_or_path.starts_with('/') {
        format!("http://localhost{url_or_path}")
    } else {
        format!("http://localhost/{url_or_path}")
    };

    Url::parse(&normalized).ok()
}

/// Decoded query parameters of one request, in order.
#[derive(Clone, Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self(pairs)
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name`, ignoring blank values.
    pub fn get_nonblank(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }
}

/// Append form-encoded pairs to a path.
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    format!("{}?{}", path, query)
}
