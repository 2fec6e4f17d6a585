//! Parameter bindings of resource methods.

use std::any::TypeId;
use std::fmt;

/// Where a parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterSource {
    /// A `{name}` segment of the path template.
    Path,
    /// A query string parameter.
    Query,
    /// A request header.
    Header,
    /// A cookie.
    Cookie,
    /// A field of a form-encoded entity.
    Form,
    /// A matrix parameter of a path segment.
    Matrix,
    /// An ambient object such as the security context.
    Context,
    /// The request entity itself.
    Entity,
    /// An object resolved from the container.
    Bean {
        /// Type of the bean.
        type_id: TypeId,
        /// Name of the bean type, for diagnostics.
        type_name: &'static str,
    },
}

impl ParameterSource {
    /// Returns `true` for sources identified by a name.
    #[must_use]
    pub const fn is_named(&self) -> bool {
        matches!(
            self,
            Self::Path | Self::Query | Self::Header | Self::Cookie | Self::Form | Self::Matrix
        )
    }
}

/// One declared parameter of a resource method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    source: ParameterSource,
    name: String,
}

impl Parameter {
    /// Creates a parameter.
    pub fn new(source: ParameterSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }

    /// A path parameter.
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Path, name)
    }

    /// A query parameter.
    pub fn query(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Query, name)
    }

    /// A header parameter.
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Header, name)
    }

    /// A cookie parameter.
    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Cookie, name)
    }

    /// A form field parameter.
    pub fn form(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Form, name)
    }

    /// A context parameter.
    pub fn context(name: impl Into<String>) -> Self {
        Self::new(ParameterSource::Context, name)
    }

    /// The request entity.
    #[must_use]
    pub fn entity() -> Self {
        Self::new(ParameterSource::Entity, "")
    }

    /// A bean of type `T`, resolved per request.
    #[must_use]
    pub fn bean<T: 'static>() -> Self {
        Self::new(
            ParameterSource::Bean {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
            },
            "",
        )
    }

    /// Where the value comes from.
    #[must_use]
    pub const fn source(&self) -> ParameterSource {
        self.source
    }

    /// The parameter name; empty for entity and bean parameters.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            ParameterSource::Entity => f.write_str("entity"),
            ParameterSource::Bean { type_name, .. } => write!(f, "bean {type_name}"),
            source => write!(f, "{source:?}(\"{}\")", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Parameter::path("id").source(), ParameterSource::Path);
        assert_eq!(Parameter::path("id").name(), "id");
        assert!(Parameter::header("x-tenant").source().is_named());
        assert!(!Parameter::entity().source().is_named());
    }

    #[test]
    fn test_bean_identity() {
        struct Pagination;
        let a = Parameter::bean::<Pagination>();
        let b = Parameter::bean::<Pagination>();
        assert_eq!(a, b);
        assert_ne!(a, Parameter::bean::<String>());
        assert!(a.to_string().contains("Pagination"));
    }
}
