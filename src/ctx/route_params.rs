/// Path parameters bound by the route lookup.
///
/// Kept as an ordered list rather than a map: capture order matches the
/// pattern's declaration order, the sets are tiny, and a linear scan
/// beats hashing at this size.
#[derive(Debug, Default, Clone)]
pub struct RouteParams {
    entries: Vec<(String, String)>,
}

impl RouteParams {
    pub(crate) fn new() -> Self {
        RouteParams {
            entries: Vec::new(),
        }
    }

    pub(crate) fn bind(names: &[String], values: Vec<String>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        RouteParams {
            entries: names.iter().cloned().zip(values).collect(),
        }
    }

    /// The value captured for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets or replaces a parameter.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameters are bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
