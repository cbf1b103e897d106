//! Handler registry and registration surface.
//!
//! The registry maps a handler name to its per-method entries. It is built
//! by registration calls at startup and never shrinks; re-registering a
//! `(name, method)` pair overwrites the previous entry. Each registered
//! handler runs in its own `may` coroutine, consuming calls from an mpsc
//! channel and completing each one through the call's reply channel.

use crate::binding::BindingPlan;
use crate::dispatcher::{ApiCall, HandlerSender};
use crate::error::ApiError;
use crate::runtime_config::RuntimeConfig;
use anyhow::bail;
use http::Method;
use may::coroutine;
use may::sync::mpsc;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One registered handler: a `(name, method)` pair plus its coroutine's
/// channel sender and the lazily compiled binding plan.
///
/// The plan cell is written at most once; racing compilations compute the
/// same plan from the same fixed name list, so no locking is needed.
pub struct HandlerEntry {
    /// Handler name (first path segment after the API prefix).
    pub name: String,
    /// HTTP method this entry serves.
    pub method: Method,
    /// Optional documentation string supplied at registration.
    pub docs: Option<String>,
    /// Ordered declared parameter names; the final name is the continuation.
    pub param_names: Vec<String>,
    sender: HandlerSender,
    plan: OnceCell<BindingPlan>,
}

impl HandlerEntry {
    /// The compiled binding plan, computing it on first use.
    pub fn plan(&self) -> &BindingPlan {
        self.plan
            .get_or_init(|| BindingPlan::compile(&self.param_names))
    }

    /// Whether the binding plan has been compiled yet.
    #[must_use]
    pub fn compiled(&self) -> bool {
        self.plan.get().is_some()
    }

    pub(crate) fn sender(&self) -> &HandlerSender {
        &self.sender
    }
}

/// Registry of handler entries, keyed by name then method.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<String, HashMap<Method, Arc<HandlerEntry>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler_fn` under `(name, method)`.
    ///
    /// Spawns a coroutine that processes calls from a channel. The handler
    /// is wrapped with panic recovery: a panicking handler reports a 500
    /// outcome through the continuation instead of crashing the server.
    /// Re-registering a pair replaces the old entry; dropping the old
    /// sender closes its channel and lets the old coroutine exit.
    ///
    /// An empty `name` is rejected.
    ///
    /// # Safety
    ///
    /// Calls `may::coroutine::Builder::spawn()`, which is unsafe in the
    /// `may` runtime. The caller must ensure the May runtime is initialized
    /// before registering handlers.
    pub unsafe fn define<F>(
        &mut self,
        method: Method,
        name: &str,
        docs: Option<&str>,
        param_names: &[&str],
        handler_fn: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(ApiCall) + Send + 'static,
    {
        if name.is_empty() {
            bail!("handler name must not be empty");
        }

        let (tx, rx) = mpsc::channel::<ApiCall>();
        let stack_size = RuntimeConfig::from_env().stack_size;
        let coroutine_name = name.to_string();

        // SAFETY: spawn() is unsafe per the may runtime's requirements, not
        // this function's logic. The handler is Send + 'static and every
        // failure path reports through the reply channel rather than
        // unwinding into the runtime.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(
                        handler_name = %coroutine_name,
                        stack_size = stack_size,
                        "Handler coroutine start"
                    );

                    for call in rx.iter() {
                        let reply_tx = call.reply_tx.clone();
                        let request_id = call.request_id;
                        let handler_name = call.name.clone();

                        info!(
                            request_id = %request_id,
                            handler_name = %handler_name,
                            arg_count = call.args.len(),
                            "Handler execution start"
                        );

                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                handler_fn(call);
                            }))
                        {
                            let panic_message = format!("{panic:?}");
                            error!(
                                request_id = %request_id,
                                handler_name = %handler_name,
                                panic_message = %panic_message,
                                "Handler panicked"
                            );
                            let _ = reply_tx.send(Err(ApiError::handler(
                                500,
                                format!("Handler panicked: {panic_message}"),
                            )));
                        }
                    }
                })
        };

        if let Err(e) = spawn_result {
            error!(
                handler_name = %name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine"
            );
            bail!("failed to spawn handler coroutine for \"{name}\": {e}");
        }

        let entry = Arc::new(HandlerEntry {
            name: name.to_string(),
            method: method.clone(),
            docs: docs.map(str::to_string),
            param_names: param_names.iter().map(|s| (*s).to_string()).collect(),
            sender: tx,
            plan: OnceCell::new(),
        });

        let by_method = self.entries.entry(name.to_string()).or_default();
        if let Some(old) = by_method.insert(method.clone(), entry) {
            drop(old);
            warn!(
                handler_name = %name,
                method = %method,
                "Replaced existing handler - old coroutine will exit"
            );
        } else {
            info!(
                handler_name = %name,
                method = %method,
                "Handler registered"
            );
        }
        Ok(())
    }

    /// All method entries registered under `name`.
    #[must_use]
    pub fn methods(&self, name: &str) -> Option<&HashMap<Method, Arc<HandlerEntry>>> {
        self.entries.get(name)
    }

    /// The entry for `(name, method)`, if registered.
    #[must_use]
    pub fn entry(&self, name: &str, method: &Method) -> Option<&Arc<HandlerEntry>> {
        self.entries.get(name).and_then(|m| m.get(method))
    }

    /// Number of distinct handler names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
