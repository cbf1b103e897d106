//! Binding plan compilation.
//!
//! A handler declares an ordered list of parameter names at registration
//! time; the final name is always the continuation slot. Compilation turns
//! that list into a [`BindingPlan`]: how many leading positional URL
//! segments the handler takes, and where each of the four side-channel maps
//! (`headers`, `params`, `query`, `cookies`) lands in the argument vector.
//!
//! Compilation is a pure function of the name list, so computing it twice
//! yields the same plan. Entries cache it in a `OnceCell`, which makes a
//! concurrent first compile race harmless.

/// The four parameter names bound by position-independent injection.
pub const SPECIAL_NAMES: [&str; 4] = ["headers", "params", "query", "cookies"];

/// Compiled description of how to assemble a handler's argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    /// Number of leading positional URL-segment arguments.
    pub arg_count: usize,
    /// Slot for the request header map, when declared.
    pub headers_index: Option<usize>,
    /// Slot for the path-parameter map, when declared.
    pub params_index: Option<usize>,
    /// Slot for the query-parameter map, when declared.
    pub query_index: Option<usize>,
    /// Slot for the cookie map, when declared.
    pub cookies_index: Option<usize>,
}

impl BindingPlan {
    /// Compile a plan from an ordered declared-parameter-name list.
    ///
    /// Each special name takes the *last* occurrence if it repeats; a
    /// handler declaring `(query, a, query, cb)` binds the query map at
    /// index 2. That mirrors the original last-match rule and is kept
    /// as-is rather than rejected.
    ///
    /// `arg_count` is the index of the earliest special parameter; when no
    /// special name is declared it is the declared count minus one (the
    /// final name is the continuation and never receives data), and it is
    /// zero when a special name comes first.
    #[must_use]
    pub fn compile<S: AsRef<str>>(param_names: &[S]) -> Self {
        let last_index = |name: &str| -> Option<usize> {
            param_names
                .iter()
                .rposition(|p| p.as_ref() == name)
        };

        let [headers_index, params_index, query_index, cookies_index] =
            SPECIAL_NAMES.map(last_index);

        let first_meta = [headers_index, params_index, query_index, cookies_index]
            .into_iter()
            .flatten()
            .min();

        let arg_count = match first_meta {
            None => param_names.len().saturating_sub(1),
            Some(i) => i,
        };

        Self {
            arg_count,
            headers_index,
            params_index,
            query_index,
            cookies_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_then_query() {
        let plan = BindingPlan::compile(&["a", "b", "query", "cb"]);
        assert_eq!(plan.arg_count, 2);
        assert_eq!(plan.query_index, Some(2));
        assert_eq!(plan.headers_index, None);
        assert_eq!(plan.params_index, None);
        assert_eq!(plan.cookies_index, None);
    }

    #[test]
    fn special_first_means_zero_positional() {
        let plan = BindingPlan::compile(&["headers", "cb"]);
        assert_eq!(plan.arg_count, 0);
        assert_eq!(plan.headers_index, Some(0));
    }

    #[test]
    fn no_special_names_reserves_continuation() {
        let plan = BindingPlan::compile(&["a", "b", "cb"]);
        assert_eq!(plan.arg_count, 2);
        assert_eq!(plan.headers_index, None);
        assert_eq!(plan.params_index, None);
        assert_eq!(plan.query_index, None);
        assert_eq!(plan.cookies_index, None);
    }

    #[test]
    fn all_four_side_channels() {
        let plan = BindingPlan::compile(&["id", "headers", "params", "query", "cookies", "cb"]);
        assert_eq!(plan.arg_count, 1);
        assert_eq!(plan.headers_index, Some(1));
        assert_eq!(plan.params_index, Some(2));
        assert_eq!(plan.query_index, Some(3));
        assert_eq!(plan.cookies_index, Some(4));
    }

    #[test]
    fn repeated_special_name_takes_last_occurrence() {
        // Legacy last-match rule: only the last occurrence is honored, so
        // the earlier slot is treated as positional.
        let plan = BindingPlan::compile(&["query", "a", "query", "cb"]);
        assert_eq!(plan.query_index, Some(2));
        assert_eq!(plan.arg_count, 2);
    }

    #[test]
    fn continuation_only_handler() {
        let plan = BindingPlan::compile(&["cb"]);
        assert_eq!(plan.arg_count, 0);
    }

    #[test]
    fn compile_is_idempotent() {
        let names = ["a", "cookies", "cb"];
        assert_eq!(BindingPlan::compile(&names), BindingPlan::compile(&names));
    }
}
