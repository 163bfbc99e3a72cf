//! Script policy: the four lifecycle hooks

use crate::engine::Bindings;
use crate::error::Result as ScriptResult;
use crate::result::PolicyOutcome;
use crate::runner::ScriptRunner;
use crate::transform::ContentScriptTransform;
use crate::view::{RequestView, ResponseView};
use std::fmt;
use std::sync::Arc;
use tentacle_core::{
    BodySide, ExecutionContext, GatewayRequest, GatewayResponse, Hook, HookScripts, PolicyChain,
    PolicyFailure, TransformableStream,
};
use tracing::{debug, error, trace};

/// Policy running operator scripts at the gateway's hook points
///
/// Decision hooks ([`on_request`](Self::on_request),
/// [`on_response`](Self::on_response)) never see the body and signal the chain
/// exactly once. Content hooks return a stream transformation, or `None` when no
/// script is configured.
#[derive(Clone)]
pub struct ScriptPolicy {
    scripts: Arc<HookScripts>,
    runner: ScriptRunner,
}

impl ScriptPolicy {
    /// Create a policy with its own interpreter pool
    pub fn new(scripts: HookScripts) -> Self {
        Self::with_runner(scripts, ScriptRunner::new())
    }

    /// Create a policy sharing an existing runner
    pub fn with_runner(scripts: HookScripts, runner: ScriptRunner) -> Self {
        Self {
            scripts: Arc::new(scripts),
            runner,
        }
    }

    /// Configured scripts
    pub fn scripts(&self) -> &HookScripts {
        &self.scripts
    }

    /// Runner used for evaluation
    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    /// Compile every configured script, reporting the first error per hook
    pub fn validate(&self) -> Vec<(Hook, ScriptResult<()>)> {
        self.scripts
            .configured()
            .map(|(hook, script)| (hook, self.runner.compile(script)))
            .collect()
    }

    /// Request head hook
    pub fn on_request(
        &self,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: &dyn PolicyChain,
    ) {
        self.decide(Hook::OnRequest, request, response, context, chain);
    }

    /// Response head hook
    pub fn on_response(
        &self,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: &dyn PolicyChain,
    ) {
        self.decide(Hook::OnResponse, request, response, context, chain);
    }

    /// Request body hook
    pub fn on_request_content(
        &self,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: Arc<dyn PolicyChain>,
    ) -> Option<TransformableStream> {
        let transform =
            self.content_transform(BodySide::Request, request, response, context, chain)?;
        Some(TransformableStream::on_request(request, transform))
    }

    /// Response body hook
    pub fn on_response_content(
        &self,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: Arc<dyn PolicyChain>,
    ) -> Option<TransformableStream> {
        let transform =
            self.content_transform(BodySide::Response, request, response, context, chain)?;
        Some(TransformableStream::on_response(response, transform))
    }

    fn decide(
        &self,
        hook: Hook,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: &dyn PolicyChain,
    ) {
        let Some(script) = self.scripts.script(hook) else {
            trace!(%hook, "No script configured, continuing");
            chain.do_next(request, response);
            return;
        };

        let mut bindings = Bindings::new(
            RequestView::new(request),
            ResponseView::new(response),
            context,
        );

        if let Err(e) = self.runner.evaluate(&mut bindings, script) {
            error!(
                %hook,
                request_id = context.request_id(),
                error = %e,
                "Script execution failed"
            );
            chain.fail_with(PolicyFailure::from_message(e.to_string()));
            return;
        }

        match bindings.result.outcome() {
            PolicyOutcome::Continue => {
                trace!(%hook, "Script succeeded, continuing");
                chain.do_next(request, response);
            }
            PolicyOutcome::Fail(failure) => {
                debug!(%hook, failure = %failure, "Script failed request");
                chain.fail_with(failure);
            }
        }
    }

    fn content_transform(
        &self,
        side: BodySide,
        request: &GatewayRequest,
        response: &GatewayResponse,
        context: &ExecutionContext,
        chain: Arc<dyn PolicyChain>,
    ) -> Option<ContentScriptTransform> {
        let script = self.scripts.script(side.content_hook())?;

        Some(ContentScriptTransform::new(
            side,
            request,
            response,
            context,
            chain,
            script,
            self.runner.clone(),
        ))
    }
}

impl fmt::Debug for ScriptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: Vec<_> = self.scripts.configured().map(|(hook, _)| hook).collect();
        f.debug_struct("ScriptPolicy")
            .field("hooks", &hooks)
            .field("runner", &self.runner)
            .finish()
    }
}
