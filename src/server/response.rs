//! Response encoding: success results, errors, and the JSONP contract.
//!
//! A `callback` query parameter switches both paths into
//! `<callback>(<json-body>)` form with status 200, so a script-tag load on
//! the client side always succeeds and inspects the payload instead.

use crate::dispatcher::{ApiResult, SetCookie, ValueMap};
use crate::error::ApiError;
use may_minihttp::Response;
use serde_json::{json, Value};
use tracing::error;

/// Content type of every API response (the original wire format).
pub const JSON_MIME_TYPE: &str = "application/x-javascript; charset=UTF-8";

const CONTENT_TYPE_HEADER: &str = "Content-Type: application/x-javascript; charset=UTF-8";

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Final wire body for a successful result: a string body verbatim, any
/// other body JSON-serialized, wrapped in the callback invocation when
/// JSONP is requested.
#[must_use]
pub fn finalize_body(result: &ApiResult, callback: Option<&str>) -> String {
    let body = match &result.body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match callback {
        Some(cb) => format!("{cb}({body})"),
        None => body,
    }
}

/// JSON error payload. Production configuration discloses only the code;
/// debug adds the description and the cause's backtrace rendering.
#[must_use]
pub fn error_body(err: &ApiError, debug: bool) -> Value {
    if debug {
        let stack = err
            .cause
            .as_ref()
            .map(|c| format!("{c:?}"))
            .unwrap_or_default();
        json!({
            "error": err.code,
            "description": err.description,
            "stack": stack,
        })
    } else {
        json!({ "error": err.code })
    }
}

/// Render one cookie-set operation as a full `Set-Cookie` header line.
#[must_use]
pub fn cookie_header(cookie: &SetCookie) -> String {
    let mut line = format!("Set-Cookie: {}={}", cookie.name, cookie.value);
    let opts = &cookie.options;
    if let Some(path) = &opts.path {
        line.push_str("; Path=");
        line.push_str(path);
    }
    if let Some(domain) = &opts.domain {
        line.push_str("; Domain=");
        line.push_str(domain);
    }
    if let Some(max_age) = opts.max_age {
        line.push_str(&format!("; Max-Age={max_age}"));
    }
    if opts.secure {
        line.push_str("; Secure");
    }
    if opts.http_only {
        line.push_str("; HttpOnly");
    }
    line
}

// may_minihttp wants 'static header strings; dynamic values are leaked the
// way the reference service code does for computed headers.
fn dynamic_header(res: &mut Response, line: String) {
    res.header(Box::leak(line.into_boxed_str()));
}

/// Encode a successful result onto the response: content type, optional
/// ETag / Cache-Control, cookie operations, the no-cache marker, and the
/// finalized (possibly JSONP-wrapped) body with status 200.
pub fn write_api_response(res: &mut Response, result: &ApiResult, callback: Option<&str>) {
    res.status_code(200, "OK");
    res.header(CONTENT_TYPE_HEADER);
    if let Some(etag) = &result.etag {
        dynamic_header(res, format!("ETag: {etag}"));
    }
    if let Some(cc) = &result.cache_control {
        dynamic_header(res, format!("Cache-Control: {cc}"));
    }
    for cookie in &result.cookies {
        dynamic_header(res, cookie_header(cookie));
    }
    if result.do_not_cache {
        res.header("Cache-Control: no-cache");
    }
    res.body_vec(finalize_body(result, callback).into_bytes());
}

/// Encode an error onto the response.
///
/// Logs the underlying cause with request context when one exists. In
/// JSONP mode the HTTP status is forced to 200, the body is wrapped in the
/// callback invocation, and the response is marked not cacheable;
/// otherwise the error's own code is sent (default 500 when zero).
pub fn write_api_error(
    res: &mut Response,
    err: &ApiError,
    callback: Option<&str>,
    debug: bool,
    url: &str,
    headers: &ValueMap,
) {
    if let Some(cause) = &err.cause {
        error!(
            url = %url,
            headers = ?headers,
            code = err.code,
            error = %cause,
            "API handler exception"
        );
    }

    let body = error_body(err, debug).to_string();
    match callback {
        Some(cb) => {
            res.status_code(200, "OK");
            res.header(CONTENT_TYPE_HEADER);
            res.header("Cache-Control: no-cache");
            res.body_vec(format!("{cb}({body})").into_bytes());
        }
        None => {
            let code = if err.code == 0 { 500 } else { err.code };
            res.status_code(code as usize, status_reason(code));
            res.header(CONTENT_TYPE_HEADER);
            res.body_vec(body.into_bytes());
        }
    }
}
