use super::request::{parse_request, ParsedRequest};
use super::response::{write_api_error, write_api_response};
use crate::dispatcher::{Api, ValueMap};
use crate::error::ApiError;
use crate::ids::RequestId;
use crate::runtime_config::RuntimeConfig;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use serde_json::Value;
use std::io;
use std::sync::Arc;

/// HTTP adapter around the dispatch engine.
///
/// Parses each raw request, merges a JSON-object body into the query map,
/// resolves and invokes the handler, and encodes the outcome (honoring
/// JSONP when the query carries a `callback` parameter).
#[derive(Clone)]
pub struct ApiService {
    pub api: Arc<Api>,
    /// Whether error responses disclose descriptions and backtraces.
    pub debug: bool,
}

impl ApiService {
    /// Create a service with debug mode taken from the environment.
    #[must_use]
    pub fn new(api: Arc<Api>) -> Self {
        Self {
            api,
            debug: RuntimeConfig::from_env().debug,
        }
    }

    #[must_use]
    pub fn with_debug(api: Arc<Api>, debug: bool) -> Self {
        Self { api, debug }
    }
}

impl HttpService for ApiService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let ParsedRequest {
            method,
            path,
            headers,
            cookies,
            mut query_params,
            body,
        } = parse_request(req);

        // A JSON-object body augments the query map, string values verbatim
        // and anything else in serialized form.
        if let Some(Value::Object(map)) = body {
            for (k, v) in map {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                query_params.insert(k, v);
            }
        }

        let callback = query_params.get("callback").cloned();
        let request_id =
            RequestId::from_header_or_new(headers.get("x-request-id").map(String::as_str));

        let method = match method.to_uppercase().parse::<Method>() {
            Ok(m) => m,
            Err(_) => {
                let err = ApiError::new(500, format!("Unsupported method \"{method}\""));
                write_api_error(res, &err, callback.as_deref(), self.debug, &path, &headers);
                return Ok(());
            }
        };

        let outcome = self.api.lookup(&method, &path).and_then(|found| {
            self.api.invoke_with_request_id(
                &found.entry,
                found.url_params,
                headers.clone(),
                query_params,
                // No path-parameter middleware sits in front of this sink;
                // only the direct `call` surface can supply a params map.
                ValueMap::new(),
                cookies,
                request_id,
            )
        });

        match outcome {
            Ok(result) => write_api_response(res, &result, callback.as_deref()),
            Err(err) => {
                write_api_error(res, &err, callback.as_deref(), self.debug, &path, &headers);
            }
        }
        Ok(())
    }
}
