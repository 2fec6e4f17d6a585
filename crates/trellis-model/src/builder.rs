//! Resource model construction.

use crate::bag::{merge_roots, ResourceBag};
use crate::error::{ModelError, ModelValidationError};
use crate::model::ResourceModel;
use crate::processor::{run_processors, ModelProcessor};
use crate::validation::{ModelValidator, Severity};
use std::sync::Arc;
use trellis_config::TrellisConfig;

/// Builds the frozen [`ResourceModel`] from a [`ResourceBag`].
///
/// 1. Starts from the bag's merged root resources.
/// 2. Runs model processors in rank order.
/// 3. Merges roots again, since processors may add resources.
/// 4. Validates, unless `resource_validation_disable` is set.
///
/// Fatal issues fail the build with every issue attached, unless
/// `resource_validation_ignore_errors` is set, in which case they are logged
/// and the defective model is returned.
///
/// # Example
///
/// ```
/// use trellis_config::TrellisConfig;
/// use trellis_model::{ResourceBag, ResourceModelBuilder};
///
/// let config = TrellisConfig::default();
/// let bag = ResourceBag::builder().build();
/// let model = ResourceModelBuilder::new(&config).build(&bag).unwrap();
/// assert!(model.is_empty());
/// ```
pub struct ResourceModelBuilder<'a> {
    config: &'a TrellisConfig,
    processors: Vec<Arc<dyn ModelProcessor>>,
    validator: ModelValidator,
}

impl<'a> ResourceModelBuilder<'a> {
    /// Creates a builder using `config`.
    #[must_use]
    pub fn new(config: &'a TrellisConfig) -> Self {
        Self {
            config,
            processors: Vec::new(),
            validator: ModelValidator::new(),
        }
    }

    /// Adds a model processor.
    pub fn processor(mut self, processor: Arc<dyn ModelProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Adds several model processors.
    pub fn processors(mut self, processors: impl IntoIterator<Item = Arc<dyn ModelProcessor>>) -> Self {
        self.processors.extend(processors);
        self
    }

    /// Replaces the validator.
    pub fn validator(mut self, validator: ModelValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Builds the model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Validation`] when validation finds fatal issues
    /// and errors are not ignored. No model is produced in that case.
    pub fn build(&self, bag: &ResourceBag) -> Result<ResourceModel, ModelError> {
        let model = ResourceModel::new(bag.resources().to_vec());
        let model = run_processors(&self.processors, model, self.config);
        let model = ResourceModel::new(merge_roots(model.into_resources()));

        let server = &self.config.server;
        if server.resource_validation_disable {
            tracing::debug!("resource model validation disabled");
            return Ok(model);
        }

        let issues = self.validator.validate(&model);
        for issue in &issues {
            match issue.severity {
                Severity::Fatal | Severity::Warning => tracing::warn!(
                    severity = ?issue.severity,
                    resource = %issue.resource,
                    "{}",
                    issue.message
                ),
                Severity::Hint => tracing::debug!(
                    resource = %issue.resource,
                    "{}",
                    issue.message
                ),
            }
        }

        if issues.iter().any(|issue| issue.is_fatal()) {
            if server.resource_validation_ignore_errors {
                tracing::warn!(
                    application = %server.application_name,
                    "resource model has fatal issues; continuing because validation errors are ignored"
                );
            } else {
                return Err(ModelValidationError::new(issues).into());
            }
        }

        tracing::debug!(
            resources = model.root_resources().len(),
            "resource model built"
        );
        Ok(model)
    }
}
