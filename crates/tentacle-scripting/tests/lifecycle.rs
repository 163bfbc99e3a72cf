//! Hook lifecycle tests for the script policy

use bytes::Bytes;
use mockall::mock;
use proptest::prelude::*;
use std::sync::Arc;
use tentacle_core::{
    ChainSignal, ExecutionContext, GatewayRequest, GatewayResponse, Hook, HookScripts,
    PolicyChain, PolicyFailure, RecordingChain,
};
use tentacle_scripting::{ScriptPolicy, ScriptRunner};

mock! {
    pub Chain {}

    impl PolicyChain for Chain {
        fn do_next(&self, request: &GatewayRequest, response: &GatewayResponse);
        fn fail_with(&self, failure: PolicyFailure);
        fn stream_fail_with(&self, failure: PolicyFailure);
    }
}

fn exchange(path: &str) -> (GatewayRequest, GatewayResponse, ExecutionContext) {
    let req = http::Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(())
        .unwrap();
    let (req, _) = GatewayRequest::from_request(req);
    let ctx = ExecutionContext::new(req.id());
    (req, GatewayResponse::pending(), ctx)
}

fn policy(scripts: HookScripts) -> ScriptPolicy {
    ScriptPolicy::with_runner(scripts, ScriptRunner::with_pool_size(2))
}

#[test]
fn test_absent_request_script_continues_once() {
    let (req, res, ctx) = exchange("/api/orders");
    let mut chain = MockChain::new();
    chain.expect_do_next().times(1).return_const(());
    chain.expect_fail_with().never();
    chain.expect_stream_fail_with().never();

    policy(HookScripts::new()).on_request(&req, &res, &ctx, &chain);
}

#[test]
fn test_response_content_upper_cased() {
    let (req, res, ctx) = exchange("/api/orders");
    let chain: Arc<dyn PolicyChain> = Arc::new(RecordingChain::new());
    let policy = policy(
        HookScripts::new().with(Hook::OnResponseContent, "response.content.to_upper()"),
    );

    let mut stream = policy
        .on_response_content(&req, &res, &ctx, chain)
        .expect("script configured");
    stream.write("hel");
    stream.write("lo");

    assert_eq!(stream.end().unwrap(), Some(Bytes::from_static(b"HELLO")));
    assert_eq!(res.header("content-length").as_deref(), Some("5"));
}

#[test]
fn test_request_script_fails_without_content_type() {
    let (req, res, ctx) = exchange("/api/orders");
    let mut chain = MockChain::new();
    chain.expect_do_next().never();
    chain
        .expect_fail_with()
        .withf(|f| f.status().as_u16() == 403 && f.message() == "blocked" && f.content_type().is_none())
        .times(1)
        .return_const(());

    let policy = policy(HookScripts::new().with(
        Hook::OnRequest,
        r#"
            result.state = State::FAILURE;
            result.code = 403;
            result.error = "blocked";
        "#,
    ));
    policy.on_request(&req, &res, &ctx, &chain);
}

#[test]
fn test_throwing_content_script_aborts_stream() {
    let (req, res, ctx) = exchange("/api/orders");
    let chain = Arc::new(RecordingChain::new());
    let policy = policy(HookScripts::new().with(
        Hook::OnResponseContent,
        r#"throw "cannot parse upstream body""#,
    ));

    let mut stream = policy
        .on_response_content(&req, &res, &ctx, chain.clone())
        .expect("script configured");
    stream.write(r#"{"id":1}"#);

    let err = stream.end().unwrap_err();
    assert!(err.message().contains("cannot parse upstream body"));
    assert!(chain.signals().is_empty());
}

#[test]
fn test_blank_content_script_passes_body_through() {
    let (req, res, ctx) = exchange("/api/orders");
    let chain: Arc<dyn PolicyChain> = Arc::new(RecordingChain::new());
    let policy = policy(HookScripts::new().with(Hook::OnRequestContent, " \n\t "));

    assert!(policy.on_request_content(&req, &res, &ctx, chain).is_none());
}

#[test]
fn test_empty_body_still_runs_content_script() {
    let (req, res, ctx) = exchange("/api/orders");
    let chain = Arc::new(RecordingChain::new());
    let policy = policy(HookScripts::new().with(
        Hook::OnRequestContent,
        r#"
            if request.content == "" {
                result.fail(400, "body required");
            }
            request.content
        "#,
    ));

    let stream = policy
        .on_request_content(&req, &res, &ctx, chain.clone())
        .expect("script configured");

    assert_eq!(stream.end().unwrap(), None);
    let failure = chain.failure().expect("empty body rejected");
    assert_eq!(failure.status().as_u16(), 400);
    assert_eq!(failure.message(), "body required");
    assert!(matches!(chain.last(), Some(ChainSignal::StreamFail(_))));
}

#[test]
fn test_content_failure_signals_stream_fail() {
    let (req, res, ctx) = exchange("/api/orders");
    let mut chain = MockChain::new();
    chain.expect_do_next().never();
    chain.expect_fail_with().never();
    chain
        .expect_stream_fail_with()
        .withf(|f| {
            f.status().as_u16() == 400
                && f.message() == r#"{"error":"missing id"}"#
                && f.content_type() == Some("application/json")
        })
        .times(1)
        .return_const(());

    let policy = policy(HookScripts::new().with(
        Hook::OnRequestContent,
        r#"
            let body = json_decode(request.content);
            if body.id == () {
                result.fail(400, json_encode(#{ error: "missing id" }), "application/json");
            }
            request.content
        "#,
    ));

    let mut stream = policy
        .on_request_content(&req, &res, &ctx, Arc::new(chain))
        .expect("script configured");
    stream.write(r#"{"name":"x"}"#);
    assert_eq!(stream.end().unwrap(), None);
}

#[test]
fn test_hooks_share_context_attributes() {
    let (req, res, ctx) = exchange("/api/orders");
    let chain = RecordingChain::new();
    let policy = policy(
        HookScripts::new()
            .with(Hook::OnRequest, r#"context["tenant"] = request.header("x-tenant") ?? "anonymous";"#)
            .with(Hook::OnResponse, r#"response.set_header("x-tenant", context["tenant"]);"#),
    );

    policy.on_request(&req, &res, &ctx, &chain);
    policy.on_response(&req, &res, &ctx, &chain);

    assert_eq!(chain.signals(), vec![ChainSignal::Next, ChainSignal::Next]);
    assert_eq!(res.header("x-tenant").as_deref(), Some("anonymous"));
}

#[test]
fn test_identical_inputs_give_identical_outcomes() {
    let policy = policy(HookScripts::new().with(
        Hook::OnRequest,
        r#"if request.method == "POST" { result.fail(405, "read only"); }"#,
    ));

    let outcomes: Vec<_> = (0..3)
        .map(|_| {
            let (req, res, ctx) = exchange("/api/orders");
            let chain = RecordingChain::new();
            policy.on_request(&req, &res, &ctx, &chain);
            chain.signals()
        })
        .collect();

    assert!(outcomes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(outcomes[0][0].failure().unwrap().status().as_u16(), 405);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluations_are_isolated() {
    let policy = policy(HookScripts::new().with(
        Hook::OnRequestContent,
        r#"`${request.header("x-n")}:${request.content}`"#,
    ));

    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let policy = policy.clone();
            tokio::task::spawn_blocking(move || {
                let (req, res, ctx) = exchange("/api/orders");
                req.set_header("x-n", &n.to_string()).unwrap();
                let chain: Arc<dyn PolicyChain> = Arc::new(RecordingChain::new());

                let mut stream = policy
                    .on_request_content(&req, &res, &ctx, chain)
                    .expect("script configured");
                stream.write(format!("body-{}", n));
                (n, stream.end().unwrap())
            })
        })
        .collect();

    for task in tasks {
        let (n, body) = task.await.unwrap();
        assert_eq!(body, Some(Bytes::from(format!("{}:body-{}", n, n))));
    }
    assert_eq!(policy.runner().stats().checkouts, 32);
}

proptest! {
    #[test]
    fn prop_identity_script_keeps_body(body in "[a-zA-Z0-9 {}:,\"]{1,64}") {
        let (req, res, ctx) = exchange("/api/orders");
        let chain: Arc<dyn PolicyChain> = Arc::new(RecordingChain::new());
        let policy = ScriptPolicy::with_runner(
            HookScripts::new().with(Hook::OnRequestContent, "request.content"),
            ScriptRunner::with_pool_size(1),
        );

        let mut stream = policy.on_request_content(&req, &res, &ctx, chain).unwrap();
        stream.write(body.as_bytes());
        prop_assert_eq!(stream.end().unwrap(), Some(Bytes::from(body)));
    }

    #[test]
    fn prop_failure_code_and_error_propagate(code in 100i64..600, error in "[a-z][a-z ]{0,19}") {
        let (req, res, ctx) = exchange("/api/orders");
        let chain = RecordingChain::new();
        let policy = ScriptPolicy::with_runner(
            HookScripts::new().with(Hook::OnResponse, format!(r#"result.fail({}, "{}");"#, code, error)),
            ScriptRunner::with_pool_size(1),
        );

        policy.on_response(&req, &res, &ctx, &chain);

        let failure = chain.failure().unwrap();
        prop_assert_eq!(i64::from(failure.status().as_u16()), code);
        prop_assert_eq!(failure.message(), error.as_str());
        prop_assert_eq!(chain.signals().len(), 1);
    }
}
