//! Structural validation of resource models.
//!
//! Validation never stops at the first problem: every issue is collected so
//! a misconfigured application reports everything at once.
//!
//! | Check | Severity |
//! |-------|----------|
//! | Invalid path template | Fatal |
//! | Method without an endpoint | Fatal |
//! | Duplicate path + method | Fatal |
//! | Path parameter not in the template | Fatal |
//! | More than one entity parameter | Fatal |
//! | Named parameter with an empty name | Fatal |
//! | Bean parameter nothing can provide | Fatal |
//! | Resource without methods or children | Warning |
//! | Entity parameter on `GET` / `HEAD` | Warning |
//! | Template parameter no method declares | Hint |

use crate::model::ResourceModel;
use crate::parameter::ParameterSource;
use crate::resource::{join_path, Resource};
use http::Method;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use trellis_router::{normalize_template, parse_template, Segment};

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The model cannot be served.
    Fatal,
    /// The model works but is probably not what was meant.
    Warning,
    /// Informational.
    Hint,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Severity.
    pub severity: Severity,
    /// Full path of the offending resource.
    pub resource: String,
    /// Description.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a fatal issue.
    pub fn fatal(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, resource, message)
    }

    /// Creates a warning.
    pub fn warning(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, resource, message)
    }

    /// Creates a hint.
    pub fn hint(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Hint, resource, message)
    }

    fn new(severity: Severity, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for fatal issues.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.resource, self.message)
    }
}

type InjectableCheck = Box<dyn Fn(TypeId) -> bool + Send + Sync>;

/// Validates resource models.
#[derive(Default)]
pub struct ModelValidator {
    injectable: Option<InjectableCheck>,
}

impl ModelValidator {
    /// A validator without bean resolution checks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports bean parameters for which `check` returns `false`.
    pub fn with_injectable<F>(mut self, check: F) -> Self
    where
        F: Fn(TypeId) -> bool + Send + Sync + 'static,
    {
        self.injectable = Some(Box::new(check));
        self
    }

    /// Returns every issue found in `model`.
    #[must_use]
    pub fn validate(&self, model: &ResourceModel) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut routes = HashSet::new();
        for resource in model.root_resources() {
            self.validate_resource(resource, "", &mut routes, &mut issues);
        }
        issues
    }

    fn validate_resource(
        &self,
        resource: &Resource,
        parent_path: &str,
        routes: &mut HashSet<(String, Method)>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let path = join_path(parent_path, resource.path());

        let template_params: Vec<String> = match parse_template(&path) {
            Ok(segments) => segments
                .into_iter()
                .filter_map(|segment| match segment {
                    Segment::Param(name) | Segment::Wildcard(name) => Some(name),
                    Segment::Static(_) => None,
                })
                .collect(),
            Err(error) => {
                issues.push(ValidationIssue::fatal(&path, error.to_string()));
                return;
            }
        };

        if resource.methods().is_empty() && resource.children().is_empty() {
            issues.push(ValidationIssue::warning(&path, "resource has no methods"));
        }

        let normalized = normalize_template(&path).unwrap_or_else(|_| path.clone());
        let mut declared_path_params = HashSet::new();

        for method in resource.methods() {
            let http_method = method.http_method();
            let label = format!("{http_method} {path}");

            if method.endpoint().is_none() {
                issues.push(ValidationIssue::fatal(&path, format!("{label} has no endpoint")));
            }

            if !routes.insert((normalized.clone(), http_method.clone())) {
                issues.push(ValidationIssue::fatal(
                    &path,
                    format!("duplicate route {label}"),
                ));
            }

            let mut entity_count = 0;
            for parameter in method.parameters() {
                let source = parameter.source();
                if source.is_named() && parameter.name().trim().is_empty() {
                    issues.push(ValidationIssue::fatal(
                        &path,
                        format!("{label} declares a {source:?} parameter without a name"),
                    ));
                }
                match source {
                    ParameterSource::Path => {
                        declared_path_params.insert(parameter.name().to_string());
                        if !parameter.name().is_empty()
                            && !template_params.iter().any(|p| p == parameter.name())
                        {
                            issues.push(ValidationIssue::fatal(
                                &path,
                                format!(
                                    "{label} binds path parameter '{}' missing from the template",
                                    parameter.name()
                                ),
                            ));
                        }
                    }
                    ParameterSource::Entity => {
                        entity_count += 1;
                        if *http_method == Method::GET || *http_method == Method::HEAD {
                            issues.push(ValidationIssue::warning(
                                &path,
                                format!("{label} reads an entity"),
                            ));
                        }
                    }
                    ParameterSource::Bean { type_id, type_name } => {
                        if let Some(check) = &self.injectable {
                            if !check(type_id) {
                                issues.push(ValidationIssue::fatal(
                                    &path,
                                    format!("{label} needs bean {type_name} which is not registered"),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }
            if entity_count > 1 {
                issues.push(ValidationIssue::fatal(
                    &path,
                    format!("{label} declares {entity_count} entity parameters"),
                ));
            }
        }

        if !resource.methods().is_empty() {
            for name in &template_params {
                if !declared_path_params.contains(name) {
                    issues.push(ValidationIssue::hint(
                        &path,
                        format!("template parameter '{name}' is not bound by any method"),
                    ));
                }
            }
        }

        for child in resource.children() {
            self.validate_resource(child, &path, routes, issues);
        }
    }
}

impl fmt::Debug for ModelValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelValidator")
            .field("checks_beans", &self.injectable.is_some())
            .finish()
    }
}
