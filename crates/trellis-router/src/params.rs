//! Template variables bound while matching a path.

use smallvec::SmallVec;

/// Bindings kept inline before spilling to the heap.
const INLINE: usize = 4;

/// Values bound to `{name}` and `{*name}` template segments, in the order
/// they occur in the path.
///
/// # Example
///
/// ```rust
/// use trellis_router::Params;
///
/// let mut params = Params::new();
/// params.push("order", "7");
/// params.push("line", "2");
///
/// assert_eq!(params.get("line"), Some("2"));
/// assert!(params.get("sku").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    bindings: SmallVec<[(String, String); INLINE]>,
}

impl Params {
    /// No bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value` after the existing bindings.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.push((name.into(), value.into()));
    }

    /// The value bound to `name`. With repeated names the leftmost wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find_map(|(bound, value)| (bound == name).then_some(value))
    }

    /// True when the path had no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Forgets bindings past `len`, rolling back a branch that did not match.
    pub fn truncate(&mut self, len: usize) {
        self.bindings.truncate(len);
    }

    /// `(name, value)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_push_and_get() {
        let mut params = Params::new();
        params.push("id", "123");
        params.push("name", "ada");

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.get("name"), Some("ada"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_params_truncate() {
        let mut params = Params::new();
        params.push("a", "1");
        let mark = params.len();
        params.push("b", "2");
        params.push("c", "3");

        params.truncate(mark);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("b"), None);
    }

    #[test]
    fn test_params_spill_to_heap() {
        let params: Params = (0..10)
            .map(|i| (format!("p{i}"), i.to_string()))
            .collect();
        assert_eq!(params.len(), 10);
        assert_eq!(params.get("p9"), Some("9"));
        assert_eq!(params.iter().next(), Some(("p0", "0")));
    }
}
