//! Whole-body script transformation for the content hooks

use crate::engine::Bindings;
use crate::result::PolicyOutcome;
use crate::runner::ScriptRunner;
use crate::view::{RequestView, ResponseView};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tentacle_core::{
    BodySide, BodyTransformer, ChunkOutcome, ExecutionContext, GatewayRequest, GatewayResponse,
    PolicyChain, TransformationError,
};
use tracing::{debug, error};

/// Runs a content script over a buffered body
///
/// The transformed side sees the body as `content`; the other side's `content`
/// is absent. The script's return value replaces the body. When a script
/// succeeds without returning anything, the body is passed through unchanged.
pub struct ContentScriptTransform {
    side: BodySide,
    request: GatewayRequest,
    response: GatewayResponse,
    context: ExecutionContext,
    chain: Arc<dyn PolicyChain>,
    script: Arc<str>,
    runner: ScriptRunner,
}

impl ContentScriptTransform {
    /// Bind a content script to one exchange
    pub fn new(
        side: BodySide,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: Arc<dyn PolicyChain>,
        script: impl Into<Arc<str>>,
        runner: ScriptRunner,
    ) -> Self {
        Self {
            side,
            request: request.clone(),
            response: response.clone(),
            context: context.clone(),
            chain,
            script: script.into(),
            runner,
        }
    }

    fn bindings(&self, text: String) -> Bindings {
        let (request, response) = match self.side {
            BodySide::Request => (
                RequestView::with_content(&self.request, text),
                ResponseView::new(&self.response),
            ),
            BodySide::Response => (
                RequestView::new(&self.request),
                ResponseView::with_content(&self.response, text),
            ),
        };
        Bindings::new(request, response, &self.context)
    }
}

impl BodyTransformer for ContentScriptTransform {
    fn transform(&self, content: Bytes) -> Result<ChunkOutcome, TransformationError> {
        let hook = self.side.content_hook();
        let text = String::from_utf8_lossy(&content).into_owned();
        let mut bindings = self.bindings(text);

        let output = match self.runner.evaluate(&mut bindings, &self.script) {
            Ok(output) => output,
            Err(e) => {
                error!(
                    %hook,
                    request_id = self.context.request_id(),
                    error = %e,
                    "Script execution failed on body"
                );
                return Err(TransformationError::with_source(
                    format!("Unable to run script: {}", e.detailed()),
                    e,
                ));
            }
        };

        match bindings.result.outcome() {
            PolicyOutcome::Continue => match output {
                Some(body) => Ok(ChunkOutcome::Emit(Bytes::from(body))),
                None => {
                    debug!(%hook, "Script returned no value, passing body through");
                    Ok(ChunkOutcome::Emit(content))
                }
            },
            PolicyOutcome::Fail(failure) => {
                debug!(%hook, failure = %failure, "Script failed body stream");
                self.chain.stream_fail_with(failure);
                Ok(ChunkOutcome::Failed)
            }
        }
    }
}

impl fmt::Debug for ContentScriptTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentScriptTransform")
            .field("side", &self.side)
            .field("request_id", &self.context.request_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tentacle_core::{ChainSignal, RecordingChain};

    fn transform(side: BodySide, script: &str) -> (ContentScriptTransform, Arc<RecordingChain>) {
        let (req, _) = GatewayRequest::from_request(http::Request::new(()));
        let res = GatewayResponse::pending();
        let ctx = ExecutionContext::new(req.id());
        let chain = Arc::new(RecordingChain::new());

        let transform = ContentScriptTransform::new(
            side,
            &req,
            &res,
            &ctx,
            chain.clone(),
            script,
            ScriptRunner::with_pool_size(1),
        );
        (transform, chain)
    }

    #[test]
    fn test_response_body_replaced() {
        let (t, chain) = transform(BodySide::Response, "response.content.to_upper()");
        let out = t.transform(Bytes::from_static(b"hello")).unwrap();

        assert_eq!(out, ChunkOutcome::Emit(Bytes::from_static(b"HELLO")));
        assert!(chain.signals().is_empty());
    }

    #[test]
    fn test_only_transformed_side_sees_content() {
        let (t, _) = transform(
            BodySide::Request,
            r#"`${request.content}|${response.content == ()}`"#,
        );
        let out = t.transform(Bytes::from_static(b"{\"a\":1}")).unwrap();
        assert_eq!(out, ChunkOutcome::Emit(Bytes::from_static(b"{\"a\":1}|true")));
    }

    #[test]
    fn test_no_return_value_passes_through() {
        let (t, _) = transform(BodySide::Request, "let seen = request.content;");
        let out = t.transform(Bytes::from_static(b"original")).unwrap();
        assert_eq!(out, ChunkOutcome::Emit(Bytes::from_static(b"original")));
    }

    #[test]
    fn test_business_failure_signals_stream_fail() {
        let (t, chain) = transform(
            BodySide::Request,
            r#"result.fail(413, "too big", "text/plain"); "ignored""#,
        );
        let out = t.transform(Bytes::from_static(b"payload")).unwrap();

        assert_eq!(out, ChunkOutcome::Failed);
        let signals = chain.signals();
        assert_eq!(signals.len(), 1);
        let ChainSignal::StreamFail(failure) = &signals[0] else {
            panic!("expected stream failure, got {:?}", signals[0]);
        };
        assert_eq!(failure.status().as_u16(), 413);
        assert_eq!(failure.message(), "too big");
        assert_eq!(failure.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_evaluation_error_is_fatal() {
        let (t, chain) = transform(BodySide::Response, r#"throw "broken upstream payload""#);
        let err = t.transform(Bytes::from_static(b"x")).unwrap_err();

        assert!(err.message().starts_with("Unable to run script"));
        assert!(err.message().contains("broken upstream payload"));
        assert!(chain.signals().is_empty());
    }
}
