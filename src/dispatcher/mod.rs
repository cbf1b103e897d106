//! # Dispatcher Module
//!
//! Resolves incoming calls to registered handlers and drives their
//! invocation over `may` coroutine channels.
//!
//! ## Request Flow
//!
//! 1. [`Api::lookup`] strips the API path prefix, isolates the handler name
//!    and leftover URL segments, and resolves the registry entry (compiling
//!    its binding plan on first use).
//! 2. [`Api::invoke`] assembles the argument vector per the plan and sends
//!    an [`ApiCall`] to the handler's coroutine.
//! 3. The handler completes the call through its continuation (the reply
//!    channel), exactly once; `invoke` blocks on the reply until then.
//!
//! The [`Api::call`] surface runs the same path for internal callers that
//! already have normalized maps, without HTTP parsing.
//!
//! ## Error Handling
//!
//! Resolver failures (unknown prefix, missing name, unknown handler,
//! unsupported method) short-circuit before invocation. Handler panics are
//! caught at registration and surface as 500 outcomes; a handler whose
//! channel closes without a completion also produces a 500.

mod core;

pub use core::{
    Api, ApiCall, ApiOutcome, ApiResult, Arg, ArgVec, CookieOptions, HandlerSender, LookupResult,
    SetCookie, ValueMap, MAX_INLINE_ARGS,
};
