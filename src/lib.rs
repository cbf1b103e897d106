//! # apidispatch
//!
//! Named-function API dispatch over `may` coroutines.
//!
//! An incoming request like `GET /api/widgets/7` is resolved against a
//! declarative registry: the first path segment after the API prefix names
//! the handler, the remaining segments become positional arguments, and the
//! request's headers, query, path-parameter, and cookie maps are injected
//! wherever the handler declared the matching special parameter name. The
//! handler completes asynchronously through a continuation, and its result
//! (or error) is encoded as JSON, optionally wrapped in a JSONP callback
//! invocation when the request asks for one.
//!
//! ## Architecture
//!
//! - **[`registry`]** - handler registration, one coroutine per handler
//! - **[`binding`]** - compiles a handler's declared parameter names into a
//!   reusable binding plan (cached per entry, compiled once)
//! - **[`dispatcher`]** - path resolution, argument assembly, channel-based
//!   invocation, and the direct [`Api::call`] surface
//! - **[`server`]** - `may_minihttp` adapter: request parsing, response and
//!   error encoding, JSONP
//! - **[`runtime_config`]** - stack size and debug mode from environment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apidispatch::{Api, ApiService, HttpServer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut api = Api::new("/api");
//!
//! // Declared parameter names drive binding; the final name is the
//! // continuation slot. `id` receives the first URL segment, `query`
//! // receives the query map.
//! unsafe {
//!     api.get("widgets", Some("Fetch one widget"), &["id", "query", "cb"], |call| {
//!         let id = call.segment(0).unwrap_or("0").to_string();
//!         call.succeed(json!({ "id": id }));
//!     })?;
//! }
//!
//! let service = ApiService::new(Arc::new(api));
//! let handle = HttpServer(service).start("0.0.0.0:8080")?;
//! handle.join().ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Runtime Considerations
//!
//! Handlers run in `may` coroutines, not tokio tasks: each handler owns a
//! channel and processes calls sequentially, while many requests stay in
//! flight across handlers. Stack size is configured via
//! `APIDISPATCH_STACK_SIZE`; error-detail disclosure via `APIDISPATCH_ENV`.

pub mod binding;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod runtime_config;
pub mod server;

pub use binding::BindingPlan;
pub use dispatcher::{Api, ApiCall, ApiOutcome, ApiResult, Arg, CookieOptions, LookupResult, SetCookie, ValueMap};
pub use error::ApiError;
pub use ids::RequestId;
pub use registry::{HandlerEntry, Registry};
pub use runtime_config::RuntimeConfig;
pub use server::{ApiService, HttpServer, ServerHandle};
