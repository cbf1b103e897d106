use crate::dispatcher::ValueMap;
use may_minihttp::Request;
use std::io::Read;
use tracing::debug;

/// Parsed HTTP request data used by `ApiService`.
///
/// Everything the dispatch engine needs, extracted from the raw request:
/// lowercased headers, cookies, query parameters, and a JSON body when one
/// was sent.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// HTTP headers (lowercase keys)
    pub headers: ValueMap,
    /// Cookies parsed from the Cookie header
    pub cookies: ValueMap,
    /// Parsed query string parameters
    pub query_params: ValueMap,
    /// Request body parsed as JSON (if present and valid)
    pub body: Option<serde_json::Value>,
}

/// Split the `cookie` header into a name/value map.
#[must_use]
pub fn parse_cookies(headers: &ValueMap) -> ValueMap {
    headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse and URL-decode query parameters from a full request path.
#[must_use]
pub fn parse_query_params(path: &str) -> ValueMap {
    if let Some(pos) = path.find('?') {
        let query_str = &path[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        ValueMap::new()
    }
}

/// Extract method, path, headers, cookies, query, and JSON body from a raw
/// `may_minihttp` request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: ValueMap = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let cookies = parse_cookies(&headers);
    let query_params = parse_query_params(&raw_path);

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => serde_json::from_str(&body_str).ok(),
            _ => None,
        }
    };

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        cookie_count = cookies.len(),
        query_count = query_params.len(),
        has_body = body.is_some(),
        "HTTP request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
        cookies,
        query_params,
        body,
    }
}
