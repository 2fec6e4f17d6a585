//! Radix tree nodes and template parsing.

use crate::error::RouteError;
use crate::method_router::MethodRouter;
use crate::params::Params;
use http::Method;

/// One parsed segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal segment (e.g. `users`).
    Static(String),
    /// Named parameter (e.g. `{id}`).
    Param(String),
    /// Catch-all for the remaining segments (e.g. `*path`). Must be last.
    Wildcard(String),
}

/// Parses a path template into segments.
///
/// Empty segments are ignored, so `/users/` and `/users` are the same
/// template.
///
/// # Errors
///
/// Returns [`RouteError::InvalidTemplate`] for unbalanced braces, empty
/// parameter names, regex constraints, or a wildcard that is not last.
///
/// # Example
///
/// ```rust
/// use trellis_router::{parse_template, Segment};
///
/// let segments = parse_template("/users/{id}/files/*rest").unwrap();
/// assert_eq!(segments[1], Segment::Param("id".to_string()));
/// assert!(parse_template("/users/{}").is_err());
/// ```
pub fn parse_template(path: &str) -> Result<Vec<Segment>, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidTemplate {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let raw: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut segments = Vec::with_capacity(raw.len());
    for (index, s) in raw.iter().enumerate() {
        if let Some(inner) = s.strip_prefix('{') {
            let name = inner
                .strip_suffix('}')
                .ok_or_else(|| invalid("unclosed '{'"))?;
            if name.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            if name.contains(':') {
                return Err(invalid("regex constraints are not supported"));
            }
            if name.contains(['{', '}']) {
                return Err(invalid("nested braces"));
            }
            segments.push(Segment::Param(name.to_string()));
        } else if let Some(name) = s.strip_prefix('*') {
            if name.is_empty() {
                return Err(invalid("empty wildcard name"));
            }
            if index + 1 != raw.len() {
                return Err(invalid("wildcard must be the last segment"));
            }
            segments.push(Segment::Wildcard(name.to_string()));
        } else if s.contains(['{', '}']) {
            return Err(invalid("braces must enclose a whole segment"));
        } else {
            segments.push(Segment::Static((*s).to_string()));
        }
    }
    Ok(segments)
}

/// Canonical form of a template with parameter names erased.
///
/// Two templates with the same canonical form match exactly the same paths.
///
/// ```rust
/// use trellis_router::normalize_template;
///
/// assert_eq!(
///     normalize_template("/users/{id}/").unwrap(),
///     normalize_template("users/{userId}").unwrap(),
/// );
/// ```
///
/// # Errors
///
/// Fails like [`parse_template`].
pub fn normalize_template(path: &str) -> Result<String, RouteError> {
    let segments = parse_template(path)?;
    let mut out = String::new();
    for segment in &segments {
        out.push('/');
        match segment {
            Segment::Static(s) => out.push_str(s),
            Segment::Param(_) => out.push_str("{}"),
            Segment::Wildcard(_) => out.push('*'),
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// A node in the radix tree.
///
/// Static children are kept sorted for binary search. A node may hold several
/// parameter children with different names; they are tried in insertion order.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    segment: Segment,
    methods: Option<MethodRouter<T>>,
    static_children: Vec<Node<T>>,
    param_children: Vec<Node<T>>,
    wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    pub(crate) fn root() -> Self {
        Self::new(Segment::Static(String::new()))
    }

    fn new(segment: Segment) -> Self {
        Self {
            segment,
            methods: None,
            static_children: Vec::new(),
            param_children: Vec::new(),
            wildcard_child: None,
        }
    }

    /// Inserts `methods` at the node for `segments`.
    ///
    /// Returns the first method already present at that node.
    pub(crate) fn insert(
        &mut self,
        segments: &[Segment],
        methods: MethodRouter<T>,
    ) -> Result<(), Method> {
        let Some((segment, remaining)) = segments.split_first() else {
            return match &mut self.methods {
                Some(existing) => {
                    if let Some((taken, _)) = methods.iter().find(|(m, _)| existing.contains(m)) {
                        return Err(taken.clone());
                    }
                    existing.merge(methods)
                }
                None => {
                    self.methods = Some(methods);
                    Ok(())
                }
            };
        };

        match segment {
            Segment::Static(name) => {
                let index = match self
                    .static_children
                    .binary_search_by(|c| c.static_name().cmp(name.as_str()))
                {
                    Ok(index) => index,
                    Err(index) => {
                        self.static_children
                            .insert(index, Node::new(segment.clone()));
                        index
                    }
                };
                self.static_children[index].insert(remaining, methods)
            }
            Segment::Param(_) => {
                let index = match self
                    .param_children
                    .iter()
                    .position(|c| c.segment == *segment)
                {
                    Some(index) => index,
                    None => {
                        self.param_children.push(Node::new(segment.clone()));
                        self.param_children.len() - 1
                    }
                };
                self.param_children[index].insert(remaining, methods)
            }
            Segment::Wildcard(_) => self
                .wildcard_child
                .get_or_insert_with(|| Box::new(Node::new(segment.clone())))
                .insert(remaining, methods),
        }
    }

    /// Matches `path`, binding parameters in path order.
    pub(crate) fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        self.match_segments(&segments, &mut params)
            .map(|methods| (methods, params))
    }

    /// Static children win over parameters, parameters over wildcards. A
    /// branch that fails undoes the parameters it bound.
    fn match_segments<'a>(
        &'a self,
        segments: &[&str],
        params: &mut Params,
    ) -> Option<&'a MethodRouter<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(remaining, params) {
                return Some(found);
            }
        }

        for child in &self.param_children {
            if let Segment::Param(name) = &child.segment {
                let mark = params.len();
                params.push(name.as_str(), *segment);
                if let Some(found) = child.match_segments(remaining, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let (Segment::Wildcard(name), Some(methods)) = (&child.segment, &child.methods) {
                params.push(name.as_str(), segments.join("/"));
                return Some(methods);
            }
        }

        None
    }

    fn static_name(&self) -> &str {
        match &self.segment {
            Segment::Static(name) => name,
            _ => "",
        }
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node<T>> {
        self.static_children
            .binary_search_by(|c| c.static_name().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(root: &mut Node<&'static str>, path: &str, methods: MethodRouter<&'static str>) {
        root.insert(&parse_template(path).unwrap(), methods).unwrap();
    }

    #[test]
    fn test_parse_template() {
        assert_eq!(
            parse_template("/users/{id}").unwrap(),
            vec![
                Segment::Static("users".to_string()),
                Segment::Param("id".to_string())
            ]
        );
        assert_eq!(
            parse_template("/files/*path").unwrap()[1],
            Segment::Wildcard("path".to_string())
        );
        assert!(parse_template("/").unwrap().is_empty());
    }

    #[test]
    fn test_parse_template_errors() {
        for bad in [
            "/users/{id",
            "/users/{}",
            "/users/{id: [0-9]+}",
            "/files/*path/more",
            "/files/*",
            "/users/x{id}",
        ] {
            assert!(
                matches!(parse_template(bad), Err(RouteError::InvalidTemplate { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_template() {
        assert_eq!(normalize_template("/").unwrap(), "/");
        assert_eq!(normalize_template("a/{x}/*rest").unwrap(), "/a/{}/*");
    }

    #[test]
    fn test_static_priority_over_param() {
        let mut root = Node::root();
        insert(&mut root, "/users/me", MethodRouter::new().get("current"));
        insert(&mut root, "/users/{id}", MethodRouter::new().get("byId"));

        let (methods, params) = root.match_path("/users/me").unwrap();
        assert_eq!(methods.endpoint(&Method::GET), Some(&"current"));
        assert!(params.is_empty());

        let (methods, params) = root.match_path("/users/7").unwrap();
        assert_eq!(methods.endpoint(&Method::GET), Some(&"byId"));
        assert_eq!(params.get("id"), Some("7"));
    }

    #[test]
    fn test_failed_branch_unbinds_params() {
        let mut root = Node::root();
        insert(&mut root, "/{tenant}/settings", MethodRouter::new().get("settings"));
        insert(&mut root, "/*rest", MethodRouter::new().get("fallback"));

        let (methods, params) = root.match_path("/acme/other").unwrap();
        assert_eq!(methods.endpoint(&Method::GET), Some(&"fallback"));
        assert_eq!(params.get("tenant"), None);
        assert_eq!(params.get("rest"), Some("acme/other"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_differently_named_params_at_same_depth() {
        let mut root = Node::root();
        insert(&mut root, "/users/{id}", MethodRouter::new().get("user"));
        insert(&mut root, "/users/{userId}/posts", MethodRouter::new().get("posts"));

        let (methods, params) = root.match_path("/users/9/posts").unwrap();
        assert_eq!(methods.endpoint(&Method::GET), Some(&"posts"));
        assert_eq!(params.get("userId"), Some("9"));
        assert_eq!(params.get("id"), None);
    }

    #[test]
    fn test_duplicate_method_is_reported() {
        let mut root = Node::root();
        insert(&mut root, "/users", MethodRouter::new().get("a"));
        let err = root
            .insert(&parse_template("/users/").unwrap(), MethodRouter::new().get("b"))
            .unwrap_err();
        assert_eq!(err, Method::GET);
    }

    #[test]
    fn test_intermediate_node_without_methods_does_not_match() {
        let mut root = Node::root();
        insert(&mut root, "/api/v1/users", MethodRouter::new().get("users"));
        assert!(root.match_path("/api/v1").is_none());
        assert!(root.match_path("/api/v1/users/extra").is_none());
    }
}
