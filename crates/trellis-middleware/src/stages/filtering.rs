//! Request filter stages.

use crate::context::RequestProcessingContext;
use crate::filter::{FilterAction, RequestFilter};
use crate::stage::{Continuation, Stage};
use std::sync::Arc;
use trellis_core::{BoxFuture, ContainerResponse, TrellisError, TrellisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    PreMatching,
    PostMatching,
}

/// Runs request filters.
///
/// A filter that aborts ends processing with its response. A filter that
/// fails with a mappable error ends processing with the error response;
/// any other failure propagates.
pub struct FilteringStage {
    phase: Phase,
    filters: Vec<Arc<dyn RequestFilter>>,
}

impl FilteringStage {
    /// Runs `filters` before routing.
    #[must_use]
    pub fn pre_matching(filters: Vec<Arc<dyn RequestFilter>>) -> Self {
        Self {
            phase: Phase::PreMatching,
            filters,
        }
    }

    /// Runs `global` filters after routing, followed by the filters bound
    /// to the matched method.
    #[must_use]
    pub fn post_matching(global: Vec<Arc<dyn RequestFilter>>) -> Self {
        Self {
            phase: Phase::PostMatching,
            filters: global,
        }
    }

    /// Number of filters held by the stage itself.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if the stage holds no filters of its own.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilteringStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteringStage")
            .field("phase", &self.phase)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Turns a mappable error into the response to answer with.
pub(crate) fn error_response(
    ctx: &RequestProcessingContext,
    error: TrellisError,
) -> TrellisResult<ContainerResponse> {
    if error.is_mappable() {
        let request_id = ctx.request_id().to_string();
        Ok(error.to_response(Some(&request_id)))
    } else {
        Err(error)
    }
}

async fn run_all(
    filters: &[Arc<dyn RequestFilter>],
    ctx: &mut RequestProcessingContext,
) -> TrellisResult<Continuation> {
    for filter in filters {
        match filter.filter(ctx).await {
            Ok(FilterAction::Continue) => {}
            Ok(FilterAction::Abort(response)) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    status = response.status().as_u16(),
                    "request aborted by filter"
                );
                return Ok(Continuation::Terminal(response));
            }
            Err(error) => return error_response(ctx, error).map(Continuation::Terminal),
        }
    }
    Ok(Continuation::Next)
}

impl Stage for FilteringStage {
    fn name(&self) -> &'static str {
        match self.phase {
            Phase::PreMatching => "pre_matching_filters",
            Phase::PostMatching => "post_matching_filters",
        }
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<Continuation>> {
        Box::pin(async move {
            if let Continuation::Terminal(response) = run_all(&self.filters, ctx).await? {
                return Ok(Continuation::Terminal(response));
            }
            if self.phase == Phase::PreMatching {
                return Ok(Continuation::Next);
            }
            let Some(matched) = ctx.matched().map(|m| Arc::clone(&m.method)) else {
                return Ok(Continuation::Next);
            };
            run_all(matched.request_filters(), ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::request_filter_fn;
    use http::{Method, StatusCode, Uri};
    use parking_lot::Mutex;
    use trellis_core::ContainerRequest;

    fn ctx() -> RequestProcessingContext {
        RequestProcessingContext::new(ContainerRequest::new(Method::GET, Uri::from_static("/")))
    }

    #[tokio::test]
    async fn test_abort_skips_remaining_filters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);
        let stage = FilteringStage::pre_matching(vec![
            request_filter_fn(move |_| {
                first.lock().push("first");
                Ok(FilterAction::Abort(ContainerResponse::new(
                    StatusCode::UNAUTHORIZED,
                )))
            }),
            request_filter_fn(move |_| {
                second.lock().push("second");
                Ok(FilterAction::Continue)
            }),
        ]);

        match stage.apply(&mut ctx()).await.unwrap() {
            Continuation::Terminal(response) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
            Continuation::Next => panic!("expected abort"),
        }
        assert_eq!(*seen.lock(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_mappable_error_becomes_response() {
        let stage = FilteringStage::post_matching(vec![request_filter_fn(|_| {
            Err(TrellisError::authorization("no"))
        })]);
        match stage.apply(&mut ctx()).await.unwrap() {
            Continuation::Terminal(response) => {
                assert_eq!(response.status(), StatusCode::FORBIDDEN);
                assert!(response.has_entity());
            }
            Continuation::Next => panic!("expected error response"),
        }
        assert_eq!(stage.name(), "post_matching_filters");
    }

    #[tokio::test]
    async fn test_internal_error_propagates() {
        let stage = FilteringStage::pre_matching(vec![request_filter_fn(|_| {
            Err(TrellisError::internal("broken"))
        })]);
        assert!(stage.apply(&mut ctx()).await.is_err());
    }
}
