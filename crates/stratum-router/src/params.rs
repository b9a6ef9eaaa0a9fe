//! Path parameter storage.
//!
//! Parameters are kept inline for the common case (item id plus action name)
//! so a route match does not allocate for the parameter list itself.

use smallvec::SmallVec;

/// Maximum number of parameters stored inline.
const INLINE_PARAMS: usize = 4;

/// Extracted path parameters from a route match, as (name, value) pairs.
///
/// # Example
///
/// ```rust
/// use stratum_router::Params;
///
/// let mut params = Params::new();
/// params.push("id", "dave");
/// params.push("action", "reset");
///
/// assert_eq!(params.get("id"), Some("dave"));
/// assert_eq!(params.get("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value for a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns an iterator over (name, value) pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Drops parameters pushed after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_new() {
        let params = Params::new();
        assert!(params.is_empty());
        assert_eq!(params.len(), 0);
    }

    #[test]
    fn test_params_lookup_first_wins() {
        let mut params = Params::new();
        params.push("id", "a");
        params.push("id", "b");
        assert_eq!(params.get("id"), Some("a"));
    }

    #[test]
    fn test_params_truncate() {
        let mut params = Params::new();
        params.push("id", "a");
        params.push("action", "b");
        params.truncate(1);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("action"), None);
    }

    #[test]
    fn test_params_iter_order() {
        let params: Params = vec![
            ("id".to_string(), "1".to_string()),
            ("action".to_string(), "run".to_string()),
        ]
        .into_iter()
        .collect();
        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "action"]);
    }
}
