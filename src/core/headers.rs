use indexmap::IndexMap;

/// Ordered header list. Insertion order is kept so encoded requests are stable.
pub type Headers = IndexMap<String, String>;

/// Case-insensitive header lookup.
pub fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
