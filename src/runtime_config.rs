//! Environment variable based runtime configuration.
//!
//! ## Environment Variables
//!
//! ### `APIDISPATCH_STACK_SIZE`
//!
//! Stack size for handler coroutines, decimal (`16384`) or hex (`0x4000`).
//! Default: `0x4000` (16 KB). Larger stacks support deeper call chains;
//! smaller stacks keep memory down when many handlers are registered.
//!
//! ### `APIDISPATCH_ENV`
//!
//! When set to `production`, error responses carry only the numeric code;
//! any other value (or unset) enables debug responses that include the
//! description and a captured backtrace of the underlying cause.

use std::env;

/// Runtime configuration loaded from environment variables.
///
/// Load once at startup with [`RuntimeConfig::from_env()`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for handler coroutines in bytes (default: 0x4000).
    pub stack_size: usize,
    /// Whether error responses may disclose descriptions and backtraces.
    pub debug: bool,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = match env::var("APIDISPATCH_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        let debug = env::var("APIDISPATCH_ENV")
            .map(|v| v != "production")
            .unwrap_or(true);
        RuntimeConfig { stack_size, debug }
    }
}
