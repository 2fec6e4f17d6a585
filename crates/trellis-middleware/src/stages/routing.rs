//! Routing stage.

use crate::context::{MatchedRoute, RequestProcessingContext};
use crate::runtime::RuntimeModel;
use crate::stage::{Continuation, Stage};
use std::sync::Arc;
use trellis_core::{BoxFuture, TrellisError, TrellisResult};

/// Selects the resource method for a request.
///
/// Unknown paths end processing with `404 Not Found`; known paths without
/// the requested method end it with `405 Method Not Allowed` and an `Allow`
/// header. HEAD is served by the GET method when no HEAD method exists.
#[derive(Debug, Clone)]
pub struct RoutingStage {
    model: Arc<RuntimeModel>,
}

impl RoutingStage {
    /// Creates the stage over `model`.
    #[must_use]
    pub const fn new(model: Arc<RuntimeModel>) -> Self {
        Self { model }
    }

    fn route(&self, ctx: &mut RequestProcessingContext) -> Continuation {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_string();
        let router = self.model.router();

        let Some((methods, params)) = router.match_path(&path) else {
            tracing::debug!(request_id = %ctx.request_id(), %path, "no resource matched");
            let error = TrellisError::not_found(format!("no resource at {path}"));
            return Continuation::Terminal(error.to_response(Some(&ctx.request_id().to_string())));
        };

        let Some(runtime) = methods.resolve(&method) else {
            let allowed = methods.allowed_methods();
            tracing::debug!(
                request_id = %ctx.request_id(),
                %method,
                %path,
                "method not allowed"
            );
            let error = TrellisError::method_not_allowed(method, allowed);
            return Continuation::Terminal(error.to_response(Some(&ctx.request_id().to_string())));
        };

        tracing::trace!(
            request_id = %ctx.request_id(),
            resource = %runtime.endpoint().resource_name,
            template = %runtime.endpoint().path,
            "request matched"
        );
        ctx.set_matched(MatchedRoute {
            method: Arc::clone(runtime),
            params,
        });
        Continuation::Next
    }
}

impl Stage for RoutingStage {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<Continuation>> {
        let continuation = self.route(ctx);
        Box::pin(async move { Ok(continuation) })
    }
}
