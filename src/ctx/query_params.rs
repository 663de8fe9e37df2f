use ahash::AHashMap;

/// The parsed query string.
///
/// Parsed lazily, on first access, from the raw query; keys keep every
/// value they appeared with, in order.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    map: AHashMap<String, Vec<String>>,
}

impl QueryParams {
    pub(crate) fn parse(raw: &str) -> Self {
        let mut map: AHashMap<String, Vec<String>> = AHashMap::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            map.entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        QueryParams { map }
    }

    /// First value for `key`, if present.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value for `key`, in query-string order.
    pub fn all(&self, key: &str) -> &[String] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The full key → values map.
    pub fn map(&self) -> &AHashMap<String, Vec<String>> {
        &self.map
    }
}
