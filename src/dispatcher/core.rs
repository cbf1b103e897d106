use crate::error::ApiError;
use crate::ids::RequestId;
use crate::registry::{HandlerEntry, Registry};
use http::Method;
use may::sync::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Maximum inline argument slots before heap allocation.
/// Most handlers declare well under 8 parameters.
pub const MAX_INLINE_ARGS: usize = 8;

/// Stack-allocated argument vector for the dispatch hot path.
pub type ArgVec = SmallVec<[Arg; MAX_INLINE_ARGS]>;

/// Side-channel value maps (headers, query, params, cookies).
pub type ValueMap = HashMap<String, String>;

/// Channel sender that delivers calls to a handler coroutine.
pub type HandlerSender = mpsc::Sender<ApiCall>;

/// What a handler's continuation carries: a result or an error.
pub type ApiOutcome = Result<ApiResult, ApiError>;

/// One slot in a handler's assembled argument vector.
///
/// Positional URL segments arrive as [`Arg::Segment`]; a positional slot
/// the request did not supply arrives as [`Arg::Absent`] rather than being
/// omitted, so handler argument positions stay stable.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Declared slot the request did not fill.
    Absent,
    /// Positional URL segment.
    Segment(String),
    /// Request header map (lowercased names).
    Headers(ValueMap),
    /// Path-parameter map.
    Params(ValueMap),
    /// Query-parameter map (request body merged in when it was an object).
    Query(ValueMap),
    /// Cookie map.
    Cookies(ValueMap),
}

impl Arg {
    /// The segment string, when this slot is positional and filled.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Segment(s) => Some(s),
            _ => None,
        }
    }

    /// The map payload, when this slot carries a side-channel map.
    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Arg::Headers(m) | Arg::Params(m) | Arg::Query(m) | Arg::Cookies(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Arg::Absent)
    }
}

/// A call delivered to a handler coroutine.
///
/// The handler completes it by consuming the call with [`ApiCall::finish`]
/// (or the `succeed`/`fail` shorthands); consuming `self` makes a second
/// completion unrepresentable, which is the single-completion guarantee.
#[derive(Debug)]
pub struct ApiCall {
    /// Unique request ID for tracing and correlation.
    pub request_id: RequestId,
    /// HTTP method of the originating request.
    pub method: Method,
    /// Resolved handler name.
    pub name: String,
    /// Argument vector assembled according to the entry's binding plan.
    pub args: ArgVec,
    pub(crate) reply_tx: mpsc::Sender<ApiOutcome>,
}

static ABSENT: Arg = Arg::Absent;

impl ApiCall {
    /// Argument at `index`, or [`Arg::Absent`] when out of range.
    #[must_use]
    pub fn arg(&self, index: usize) -> &Arg {
        self.args.get(index).unwrap_or(&ABSENT)
    }

    /// Positional segment at `index`, when filled.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.arg(index).as_str()
    }

    /// The bound header map, when the handler declared `headers`.
    #[must_use]
    pub fn headers(&self) -> Option<&ValueMap> {
        self.find_map(|a| matches!(a, Arg::Headers(_)))
    }

    /// The bound path-parameter map, when the handler declared `params`.
    #[must_use]
    pub fn params(&self) -> Option<&ValueMap> {
        self.find_map(|a| matches!(a, Arg::Params(_)))
    }

    /// The bound query map, when the handler declared `query`.
    #[must_use]
    pub fn query(&self) -> Option<&ValueMap> {
        self.find_map(|a| matches!(a, Arg::Query(_)))
    }

    /// The bound cookie map, when the handler declared `cookies`.
    #[must_use]
    pub fn cookies(&self) -> Option<&ValueMap> {
        self.find_map(|a| matches!(a, Arg::Cookies(_)))
    }

    fn find_map(&self, pred: impl Fn(&Arg) -> bool) -> Option<&ValueMap> {
        self.args.iter().find(|a| pred(a)).and_then(Arg::as_map)
    }

    /// Complete this call with `outcome`. Fires the continuation exactly
    /// once; a receiver that already went away is logged and ignored.
    pub fn finish(self, outcome: ApiOutcome) {
        if self.reply_tx.send(outcome).is_err() {
            error!(
                request_id = %self.request_id,
                handler_name = %self.name,
                "Reply receiver dropped before handler completion"
            );
        }
    }

    /// Complete with a successful result.
    pub fn succeed(self, result: impl Into<ApiResult>) {
        self.finish(Ok(result.into()));
    }

    /// Complete with an error.
    pub fn fail(self, err: ApiError) {
        self.finish(Err(err));
    }
}

/// Cookie attributes applied when a result sets a cookie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Lifetime in seconds.
    pub max_age: Option<u64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

/// One cookie-set operation carried on a successful result.
#[derive(Debug, Clone)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

/// Successful handler result.
///
/// A plain JSON value converts into a result with just a body; the
/// structured fields cover the caching and cookie side effects a handler
/// may request. A `Value::String` body is sent verbatim; any other value
/// is JSON-serialized by the encoder.
#[derive(Debug, Clone, Default)]
pub struct ApiResult {
    pub body: Value,
    pub etag: Option<String>,
    pub cache_control: Option<String>,
    pub cookies: Vec<SetCookie>,
    pub do_not_cache: bool,
}

impl ApiResult {
    #[must_use]
    pub fn body(body: Value) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    #[must_use]
    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_cookie(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        options: CookieOptions,
    ) -> Self {
        self.cookies.push(SetCookie {
            name: name.into(),
            value: value.into(),
            options,
        });
        self
    }

    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.do_not_cache = true;
        self
    }
}

impl From<Value> for ApiResult {
    fn from(body: Value) -> Self {
        Self::body(body)
    }
}

/// Result of resolving a request path to a handler entry.
///
/// Lives only for the duration of one request.
#[derive(Clone)]
pub struct LookupResult {
    /// Resolved handler name.
    pub name: String,
    /// Leftover path segments beyond the handler name, in order.
    pub url_params: Vec<String>,
    /// The resolved entry, plan compiled.
    pub entry: Arc<HandlerEntry>,
}

impl std::fmt::Debug for LookupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupResult")
            .field("name", &self.name)
            .field("url_params", &self.url_params)
            .field("method", &self.entry.method)
            .finish()
    }
}

/// The dispatch engine: a configured API path prefix plus the handler
/// registry, exposing lookup, invoke, and the direct `call` surface.
pub struct Api {
    api_path: String,
    registry: Registry,
}

impl Api {
    /// Create an engine rooted at `api_path` (trailing `/` stripped).
    #[must_use]
    pub fn new(api_path: &str) -> Self {
        let api_path = api_path.strip_suffix('/').unwrap_or(api_path);
        Self {
            api_path: api_path.to_string(),
            registry: Registry::new(),
        }
    }

    /// The configured API path prefix.
    #[must_use]
    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a GET handler.
    ///
    /// # Safety
    ///
    /// Spawns a `may` coroutine; see [`Registry::define`].
    pub unsafe fn get<F>(
        &mut self,
        name: &str,
        docs: Option<&str>,
        param_names: &[&str],
        handler_fn: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(ApiCall) + Send + 'static,
    {
        self.registry
            .define(Method::GET, name, docs, param_names, handler_fn)
    }

    /// Register a POST handler.
    ///
    /// # Safety
    ///
    /// Spawns a `may` coroutine; see [`Registry::define`].
    pub unsafe fn post<F>(
        &mut self,
        name: &str,
        docs: Option<&str>,
        param_names: &[&str],
        handler_fn: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(ApiCall) + Send + 'static,
    {
        self.registry
            .define(Method::POST, name, docs, param_names, handler_fn)
    }

    /// Register a PUT handler.
    ///
    /// # Safety
    ///
    /// Spawns a `may` coroutine; see [`Registry::define`].
    pub unsafe fn put<F>(
        &mut self,
        name: &str,
        docs: Option<&str>,
        param_names: &[&str],
        handler_fn: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(ApiCall) + Send + 'static,
    {
        self.registry
            .define(Method::PUT, name, docs, param_names, handler_fn)
    }

    /// Register a DELETE handler.
    ///
    /// # Safety
    ///
    /// Spawns a `may` coroutine; see [`Registry::define`].
    pub unsafe fn delete<F>(
        &mut self,
        name: &str,
        docs: Option<&str>,
        param_names: &[&str],
        handler_fn: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(ApiCall) + Send + 'static,
    {
        self.registry
            .define(Method::DELETE, name, docs, param_names, handler_fn)
    }

    /// Resolve `(method, pathname)` to a handler entry.
    ///
    /// Strips the API path prefix wherever it occurs in `pathname`, takes
    /// the next segment as the handler name and the rest as positional URL
    /// parameters, and compiles the entry's binding plan on first use.
    ///
    /// Errors: `Not an API call` (404) when the prefix is absent,
    /// `Function name required` (404) when nothing follows the prefix,
    /// `not found` (404) for an unknown name, and the legacy 500 when the
    /// name exists but the method does not.
    pub fn lookup(&self, method: &Method, pathname: &str) -> Result<LookupResult, ApiError> {
        debug!(method = %method, pathname = %pathname, "Lookup attempt");

        let prefix_at = pathname
            .find(&self.api_path)
            .ok_or_else(ApiError::not_api_call)?;

        let rest = &pathname[prefix_at + self.api_path.len()..];
        let rest = rest.strip_prefix('/').unwrap_or(rest);

        let mut segments = rest.split('/');
        let name = segments.next().unwrap_or("");
        if name.is_empty() {
            return Err(ApiError::function_name_required());
        }
        let url_params: Vec<String> = segments.map(str::to_string).collect();

        let by_method = self
            .registry
            .methods(name)
            .ok_or_else(|| ApiError::function_not_found(name))?;
        let entry = by_method
            .get(method)
            .ok_or_else(|| ApiError::method_not_allowed(name, method))?;

        // Lazy one-time compile; racing requests converge on the same plan.
        entry.plan();

        info!(
            method = %method,
            handler_name = %name,
            url_params = ?url_params,
            "Lookup resolved"
        );

        Ok(LookupResult {
            name: name.to_string(),
            url_params,
            entry: Arc::clone(entry),
        })
    }

    /// Invoke `entry` with a fresh request ID.
    pub fn invoke(
        &self,
        entry: &HandlerEntry,
        url_params: Vec<String>,
        headers: ValueMap,
        query: ValueMap,
        params: ValueMap,
        cookies: ValueMap,
    ) -> ApiOutcome {
        self.invoke_with_request_id(
            entry,
            url_params,
            headers,
            query,
            params,
            cookies,
            RequestId::new(),
        )
    }

    /// Invoke `entry`, assembling the argument vector per its binding plan
    /// and blocking the calling coroutine until the handler completes.
    ///
    /// Missing trailing positional slots are filled with [`Arg::Absent`]
    /// rather than omitted; side-channel maps land at their compiled
    /// indices. The continuation is the reply channel: the handler fires
    /// it exactly once, and a closed channel (handler crashed or exited)
    /// surfaces as a 500.
    #[allow(clippy::too_many_arguments)]
    pub fn invoke_with_request_id(
        &self,
        entry: &HandlerEntry,
        url_params: Vec<String>,
        headers: ValueMap,
        query: ValueMap,
        params: ValueMap,
        cookies: ValueMap,
        request_id: RequestId,
    ) -> ApiOutcome {
        let plan = entry.plan();

        let mut args = ArgVec::new();
        if plan.arg_count > 0 {
            let mut segments = url_params.into_iter();
            for _ in 0..plan.arg_count {
                args.push(match segments.next() {
                    Some(s) => Arg::Segment(s),
                    None => Arg::Absent,
                });
            }
        }
        place(&mut args, plan.headers_index, Arg::Headers(headers));
        place(&mut args, plan.params_index, Arg::Params(params));
        place(&mut args, plan.query_index, Arg::Query(query));
        place(&mut args, plan.cookies_index, Arg::Cookies(cookies));

        let (reply_tx, reply_rx) = mpsc::channel();
        let call = ApiCall {
            request_id,
            method: entry.method.clone(),
            name: entry.name.clone(),
            args,
            reply_tx,
        };

        info!(
            request_id = %request_id,
            handler_name = %entry.name,
            method = %entry.method,
            "Call dispatched to handler"
        );
        let start = Instant::now();

        if entry.sender().send(call).is_err() {
            error!(
                request_id = %request_id,
                handler_name = %entry.name,
                "Failed to send call to handler - coroutine gone"
            );
            return Err(ApiError::handler(
                500,
                format!("Handler \"{}\" is not accepting calls", entry.name),
            ));
        }

        match reply_rx.recv() {
            Ok(outcome) => {
                info!(
                    request_id = %request_id,
                    handler_name = %entry.name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "Handler completed"
                );
                outcome
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    handler_name = %entry.name,
                    error = %e,
                    "Handler channel closed without completion"
                );
                Err(ApiError::handler(
                    500,
                    format!("Handler \"{}\" is not responding", entry.name),
                ))
            }
        }
    }

    /// Direct invocation surface for internal callers: resolve and invoke
    /// in one step, bypassing HTTP parsing.
    pub fn call(
        &self,
        method: &Method,
        pathname: &str,
        headers: ValueMap,
        query: ValueMap,
        params: ValueMap,
        cookies: ValueMap,
    ) -> ApiOutcome {
        let found = self.lookup(method, pathname)?;
        self.invoke(&found.entry, found.url_params, headers, query, params, cookies)
    }
}

/// Write `value` at `index`, growing the vector with absent slots.
fn place(args: &mut ArgVec, index: Option<usize>, value: Arg) {
    if let Some(i) = index {
        if args.len() <= i {
            args.resize(i + 1, Arg::Absent);
        }
        args[i] = value;
    }
}
