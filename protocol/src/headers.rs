//! Header and param collections used on both sides of a request.

/// Ordered header collection with ASCII case-insensitive names.
///
/// Header names compare case-insensitively and frameworks disagree on the
/// casing they deliver (`X-Up-Target` vs `x-up-target`). Lookups accept any
/// casing, while the casing of the first writer is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.set(name, value);
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a header, replacing an existing entry of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(entry, _)| entry.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(entry, _)| entry.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered request param collection with exact-match names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: Vec<(String, String)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.set(name, value);
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(entry, _)| *entry == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_lookup_ignores_case() {
        let headers = HeaderMap::from_pairs([("X-Up-Target", ".content")]);

        assert_eq!(headers.get("x-up-target"), Some(".content"));
        assert_eq!(headers.get("X-UP-TARGET"), Some(".content"));
        assert_eq!(headers.get("X-Up-Mode"), None);
    }

    #[test]
    fn header_set_replaces_existing_entry_keeping_first_casing() {
        let mut headers = HeaderMap::new();
        headers.set("Vary", "X-Up-Mode");
        headers.set("vary", "X-Up-Mode, X-Up-Target");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Vary"), Some("X-Up-Mode, X-Up-Target"));
        assert_eq!(headers.iter().next(), Some(("Vary", "X-Up-Mode, X-Up-Target")));
    }

    #[test]
    fn header_remove_returns_the_value() {
        let mut headers = HeaderMap::from_pairs([("X-Up-Version", "3.0.0")]);

        assert_eq!(headers.remove("x-up-version"), Some("3.0.0".to_owned()));
        assert!(headers.is_empty());
        assert_eq!(headers.remove("x-up-version"), None);
    }

    #[test]
    fn param_lookup_is_exact() {
        let params = ParamMap::from_pairs([("_up_target", ".content")]);

        assert_eq!(params.get("_up_target"), Some(".content"));
        assert_eq!(params.get("_UP_TARGET"), None);
    }
}
