//! The built-in request stages.
//!
//! The pipeline chains them in this order:
//!
//! 1. [`ReferencesInitializer`] installs per-request references,
//! 2. [`FilteringStage::pre_matching`] runs pre-matching request filters,
//! 3. [`RoutingStage`] selects the resource method,
//! 4. [`FilteringStage::post_matching`] runs global, then name-bound request
//!    filters of the matched method.

mod filtering;
mod routing;

pub(crate) use filtering::error_response;
pub use filtering::FilteringStage;
pub use routing::RoutingStage;

use crate::context::RequestProcessingContext;
use crate::stage::{Continuation, Stage};
use std::sync::Arc;
use trellis_core::{BoxFuture, DefaultSecurityContext, TrellisResult};

/// Installs the per-request references.
///
/// A request arriving without a security context gets the anonymous
/// [`DefaultSecurityContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferencesInitializer;

impl Stage for ReferencesInitializer {
    fn name(&self) -> &'static str {
        "references"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<Continuation>> {
        if ctx.security_context().is_none() {
            ctx.request_mut()
                .set_security_context(Arc::new(DefaultSecurityContext));
        }
        Box::pin(async { Ok(Continuation::Next) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Uri};
    use trellis_core::{ContainerRequest, SecurityContext};

    #[derive(Debug)]
    struct Named;

    impl SecurityContext for Named {
        fn principal(&self) -> Option<&str> {
            Some("ada")
        }

        fn is_user_in_role(&self, role: &str) -> bool {
            role == "admin"
        }

        fn is_secure(&self) -> bool {
            true
        }

        fn authentication_scheme(&self) -> Option<&str> {
            Some("BASIC")
        }
    }

    #[tokio::test]
    async fn test_installs_default_security_context() {
        let mut ctx = RequestProcessingContext::new(ContainerRequest::new(
            Method::GET,
            Uri::from_static("/"),
        ));
        ReferencesInitializer.apply(&mut ctx).await.unwrap();
        let security = ctx.security_context().unwrap();
        assert!(security.principal().is_none());
    }

    #[tokio::test]
    async fn test_keeps_existing_security_context() {
        let mut request = ContainerRequest::new(Method::GET, Uri::from_static("/"));
        request.set_security_context(Arc::new(Named));
        let mut ctx = RequestProcessingContext::new(request);
        ReferencesInitializer.apply(&mut ctx).await.unwrap();
        assert_eq!(ctx.security_context().unwrap().principal(), Some("ada"));
    }
}
