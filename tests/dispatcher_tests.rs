//! In-process tests for the resolver, the invoker, and the direct `call`
//! surface: error taxonomy, argument assembly per the compiled binding
//! plan, handler error propagation, and registration semantics.

use apidispatch::{Api, ApiError, ValueMap};
use http::Method;
use serde_json::json;

mod common;
use common::test_server::setup_may_runtime;

fn sample_api() -> Api {
    setup_may_runtime();
    let mut api = Api::new("/api");
    unsafe {
        api.get(
            "widgets",
            Some("Fetch one widget"),
            &["id", "query", "cb"],
            |call| {
                let id = call.segment(0).map(str::to_string);
                let q = call.query().cloned().unwrap_or_default();
                call.succeed(json!({ "id": id, "query": q }));
            },
        )
        .expect("register widgets");

        api.post("widgets", None, &["params", "query", "cb"], |call| {
            let body = json!({
                "params": call.params(),
                "query": call.query(),
            });
            call.succeed(body);
        })
        .expect("register widgets POST");

        api.get("sparse", None, &["a", "b", "c", "cb"], |call| {
            let absent: Vec<bool> = call.args.iter().map(|a| a.is_absent()).collect();
            let body = json!({ "len": call.args.len(), "absent": absent });
            call.succeed(body);
        })
        .expect("register sparse");

        api.get("teapot", None, &["cb"], |call| {
            call.fail(ApiError::handler(418, "short and stout"));
        })
        .expect("register teapot");
    }
    api
}

fn no_values() -> (ValueMap, ValueMap, ValueMap, ValueMap) {
    (
        ValueMap::new(),
        ValueMap::new(),
        ValueMap::new(),
        ValueMap::new(),
    )
}

#[test]
fn lookup_returns_leftover_segments() {
    let api = sample_api();
    let found = api
        .lookup(&Method::GET, "/api/widgets/7")
        .expect("lookup widgets");
    assert_eq!(found.name, "widgets");
    assert_eq!(found.url_params, vec!["7".to_string()]);
}

#[test]
fn lookup_result_debug_names_the_handler() {
    let api = sample_api();
    let found = api
        .lookup(&Method::GET, "/api/widgets/7")
        .expect("lookup widgets");
    let rendered = format!("{found:?}");
    assert!(rendered.contains("widgets"));
    assert!(rendered.contains("url_params"));
}

#[test]
fn lookup_outside_prefix_is_not_an_api_call() {
    let api = sample_api();
    let err = api.lookup(&Method::GET, "/static/logo.png").unwrap_err();
    assert_eq!(err.code, 404);
    assert_eq!(err.description, "Not an API call.");
}

#[test]
fn lookup_without_function_name_fails() {
    let api = sample_api();
    for path in ["/api", "/api/"] {
        let err = api.lookup(&Method::GET, path).unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.description, "Function name required.");
    }
}

#[test]
fn lookup_unknown_function_names_the_handler() {
    let api = sample_api();
    let err = api.lookup(&Method::POST, "/api/unknown").unwrap_err();
    assert_eq!(err.code, 404);
    assert!(err.description.contains("unknown"));
}

#[test]
fn lookup_wrong_method_keeps_legacy_500() {
    let api = sample_api();
    let err = api.lookup(&Method::DELETE, "/api/widgets/7").unwrap_err();
    assert_eq!(err.code, 500);
    assert!(err.description.contains("DELETE"));
}

#[test]
fn lookup_compiles_plan_lazily_and_once() {
    let api = sample_api();
    let found = api
        .lookup(&Method::GET, "/api/widgets/7")
        .expect("lookup widgets");
    assert!(found.entry.compiled());

    let first = found.entry.plan().clone();
    let second = found.entry.plan().clone();
    assert_eq!(first, second);
    assert_eq!(first.arg_count, 1);
    assert_eq!(first.query_index, Some(1));
}

#[test]
fn call_binds_segments_and_query() {
    let api = sample_api();
    let (headers, mut query, params, cookies) = no_values();
    query.insert("debug".to_string(), "true".to_string());

    let result = api
        .call(&Method::GET, "/api/widgets/7", headers, query, params, cookies)
        .expect("call widgets");
    assert_eq!(result.body, json!({ "id": "7", "query": { "debug": "true" } }));
}

#[test]
fn call_binds_params_map_when_declared() {
    let api = sample_api();
    let (headers, query, mut params, cookies) = no_values();
    params.insert("tenant".to_string(), "acme".to_string());

    let result = api
        .call(&Method::POST, "/api/widgets", headers, query, params, cookies)
        .expect("call widgets POST");
    assert_eq!(result.body["params"], json!({ "tenant": "acme" }));
    assert_eq!(result.body["query"], json!({}));
}

#[test]
fn invoke_pads_all_missing_positional_slots() {
    // Boundary for arg_count > url_params.len() + 1: every unfilled
    // positional slot arrives as an absent marker, not omitted.
    let api = sample_api();
    let (headers, query, params, cookies) = no_values();

    let result = api
        .call(
            &Method::GET,
            "/api/sparse/only-one",
            headers,
            query,
            params,
            cookies,
        )
        .expect("call sparse");
    assert_eq!(result.body, json!({ "len": 3, "absent": [false, true, true] }));
}

#[test]
fn handler_error_flows_through_continuation() {
    let api = sample_api();
    let (headers, query, params, cookies) = no_values();

    let err = api
        .call(&Method::GET, "/api/teapot", headers, query, params, cookies)
        .unwrap_err();
    assert_eq!(err.code, 418);
    assert_eq!(err.description, "short and stout");
}

#[test]
fn redefining_a_handler_overwrites_the_first() {
    setup_may_runtime();
    let mut api = Api::new("/api");
    unsafe {
        api.get("version", None, &["cb"], |call| {
            call.succeed(json!({ "v": 1 }));
        })
        .expect("register v1");
        api.get("version", None, &["cb"], |call| {
            call.succeed(json!({ "v": 2 }));
        })
        .expect("register v2");
    }

    let (headers, query, params, cookies) = no_values();
    let result = api
        .call(&Method::GET, "/api/version", headers, query, params, cookies)
        .expect("call version");
    assert_eq!(result.body, json!({ "v": 2 }));
}

#[test]
fn empty_handler_name_is_rejected() {
    setup_may_runtime();
    let mut api = Api::new("/api");
    let result = unsafe {
        api.get("", None, &["cb"], |call| {
            call.succeed(json!(null));
        })
    };
    assert!(result.is_err());
}

#[test]
fn trailing_slash_in_prefix_is_normalized() {
    setup_may_runtime();
    let mut api = Api::new("/api/");
    unsafe {
        api.get("ping", None, &["cb"], |call| {
            call.succeed(json!("pong"));
        })
        .expect("register ping");
    }
    assert_eq!(api.api_path(), "/api");
    assert!(api.lookup(&Method::GET, "/api/ping").is_ok());
}

#[test]
fn panicking_handler_reports_500() {
    let api = {
        setup_may_runtime();
        let mut api = Api::new("/api");
        unsafe {
            api.get("boom", None, &["cb"], |_call| {
                panic!("kaboom");
            })
            .expect("register boom");
        }
        api
    };

    let (headers, query, params, cookies) = no_values();
    let err = api
        .call(&Method::GET, "/api/boom", headers, query, params, cookies)
        .unwrap_err();
    assert_eq!(err.code, 500);
    assert!(err.description.contains("panicked"));
}
