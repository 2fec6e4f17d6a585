//! Processing stages and their composition.
//!
//! A [`Stage`] is one link of the request chain. It either lets the request
//! continue or ends processing with a terminal response. Stages hold no
//! per-request state; everything they need travels in the
//! [`RequestProcessingContext`].
//!
//! Stages are composed with [`Stages::chain`]:
//!
//! ```
//! use trellis_middleware::stages::{ReferencesInitializer, RoutingStage};
//! use trellis_middleware::{RuntimeModel, Stages};
//! use std::sync::Arc;
//!
//! let composed = Stages::chain(ReferencesInitializer)
//!     .to(RoutingStage::new(Arc::new(RuntimeModel::default())))
//!     .build();
//! assert_eq!(composed.stage_names(), vec!["references", "routing"]);
//! ```

use crate::context::RequestProcessingContext;
use std::fmt;
use std::sync::Arc;
use trellis_core::{BoxFuture, ContainerResponse, TrellisResult};

/// What a stage decided.
#[derive(Debug)]
pub enum Continuation {
    /// Run the next stage.
    Next,
    /// Stop with this response.
    Terminal(ContainerResponse),
}

/// One link of the request processing chain.
pub trait Stage: Send + Sync + 'static {
    /// Stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Applies the stage to a request.
    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<Continuation>>;
}

/// Entry point for composing stages.
#[derive(Debug, Clone, Copy)]
pub struct Stages;

impl Stages {
    /// Starts a chain with `first`.
    pub fn chain<S: Stage>(first: S) -> ChainBuilder {
        ChainBuilder {
            stages: vec![Arc::new(first)],
        }
    }
}

/// Builder returned by [`Stages::chain`].
pub struct ChainBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl ChainBuilder {
    /// Appends a stage.
    pub fn to<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Freezes the chain.
    pub fn build(self) -> ComposedStage {
        ComposedStage {
            stages: self.stages.into(),
        }
    }
}

/// An immutable chain of stages, itself a [`Stage`].
///
/// Stages run in order until one returns [`Continuation::Terminal`] or an
/// error; the composed result is that of the last stage run.
#[derive(Clone)]
pub struct ComposedStage {
    stages: Arc<[Arc<dyn Stage>]>,
}

impl ComposedStage {
    /// Names of the stages, in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Stage for ComposedStage {
    fn name(&self) -> &'static str {
        "composed"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestProcessingContext,
    ) -> BoxFuture<'a, TrellisResult<Continuation>> {
        Box::pin(async move {
            for stage in self.stages.iter() {
                tracing::trace!(stage = stage.name(), "entering stage");
                match stage.apply(ctx).await? {
                    Continuation::Next => {}
                    terminal @ Continuation::Terminal(_) => {
                        tracing::debug!(stage = stage.name(), "stage ended processing");
                        return Ok(terminal);
                    }
                }
            }
            Ok(Continuation::Next)
        })
    }
}

impl fmt::Debug for ComposedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedStage")
            .field("stages", &self.stage_names())
            .finish()
    }
}
