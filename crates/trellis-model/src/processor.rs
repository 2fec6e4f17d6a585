//! Pluggable resource model transforms.

use crate::model::ResourceModel;
use std::sync::Arc;
use trellis_config::TrellisConfig;

/// Transforms the resource model before it is validated.
///
/// Processors run in ascending [`rank`](ModelProcessor::rank); processors
/// with equal rank run in registration order. A processor may add, wrap or
/// annotate resources, but the routes of the returned model must stay
/// unique.
///
/// # Example
///
/// ```
/// use trellis_config::TrellisConfig;
/// use trellis_model::{ModelProcessor, ResourceModel};
///
/// struct TagEverything;
///
/// impl ModelProcessor for TagEverything {
///     fn process_resource_model(&self, model: ResourceModel, _config: &TrellisConfig) -> ResourceModel {
///         let resources = model
///             .into_resources()
///             .into_iter()
///             .map(|r| r.to_builder().name_binding("Audited").build())
///             .collect();
///         ResourceModel::new(resources)
///     }
/// }
/// ```
pub trait ModelProcessor: Send + Sync {
    /// Ordering rank; lower runs first.
    fn rank(&self) -> i32 {
        0
    }

    /// Returns the transformed model.
    fn process_resource_model(&self, model: ResourceModel, config: &TrellisConfig)
        -> ResourceModel;
}

/// Runs `processors` over `model` in rank order.
pub(crate) fn run_processors(
    processors: &[Arc<dyn ModelProcessor>],
    mut model: ResourceModel,
    config: &TrellisConfig,
) -> ResourceModel {
    let mut ordered: Vec<&Arc<dyn ModelProcessor>> = processors.iter().collect();
    ordered.sort_by_key(|p| p.rank());
    for processor in ordered {
        model = processor.process_resource_model(model, config);
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    struct Append {
        rank: i32,
        path: &'static str,
    }

    impl ModelProcessor for Append {
        fn rank(&self) -> i32 {
            self.rank
        }

        fn process_resource_model(
            &self,
            model: ResourceModel,
            _config: &TrellisConfig,
        ) -> ResourceModel {
            let mut resources = model.into_resources();
            resources.push(Resource::builder(self.path).build());
            ResourceModel::new(resources)
        }
    }

    #[test]
    fn test_processors_run_by_ascending_rank_then_registration() {
        let processors: Vec<Arc<dyn ModelProcessor>> = vec![
            Arc::new(Append { rank: 10, path: "/late" }),
            Arc::new(Append { rank: -5, path: "/early" }),
            Arc::new(Append { rank: 10, path: "/late-second" }),
            Arc::new(Append { rank: 0, path: "/middle" }),
        ];

        let model = run_processors(
            &processors,
            ResourceModel::default(),
            &TrellisConfig::default(),
        );
        let paths: Vec<_> = model.root_resources().iter().map(Resource::path).collect();
        assert_eq!(paths, vec!["/early", "/middle", "/late", "/late-second"]);
    }
}
