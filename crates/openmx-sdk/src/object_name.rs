//! Structured bean names (`domain:key=value,key=value`)
//!
//! Names are advisory: construction from malformed input yields `None`
//! instead of an error, so a bean with an unrepresentable name is still
//! usable through direct references.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Domain + ordered key properties
#[derive(Debug, Clone)]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
    wildcard: bool,
}

impl ObjectName {
    /// Build a name from a domain and key properties.
    ///
    /// Returns `None` if the domain or any key/value contains a reserved
    /// character, if a key is repeated, or if there are no properties.
    pub fn new(domain: &str, properties: &[(&str, &str)]) -> Option<Self> {
        if !valid_domain(domain) || properties.is_empty() {
            return None;
        }
        let mut props: Vec<(String, String)> = Vec::with_capacity(properties.len());
        for (key, value) in properties {
            if !valid_key(key) || !valid_value(value) {
                return None;
            }
            if props.iter().any(|(k, _)| k == key) {
                return None;
            }
            props.push((key.to_string(), value.to_string()));
        }
        Some(ObjectName {
            domain: domain.to_string(),
            properties: props,
            wildcard: false,
        })
    }

    /// Parse `domain:key=value,...`. A trailing `,*` (or a lone `*` property
    /// list) makes the name a pattern usable with [`ObjectName::matches`].
    pub fn parse(input: &str) -> Option<Self> {
        let (domain, rest) = input.split_once(':')?;
        if !valid_domain(domain) && domain != "*" {
            return None;
        }
        let mut properties = Vec::new();
        let mut wildcard = false;
        for part in split_properties(rest)? {
            if part == "*" {
                if wildcard {
                    return None;
                }
                wildcard = true;
                continue;
            }
            let (key, value) = part.split_once('=')?;
            if !valid_key(key) || !valid_value(value) {
                return None;
            }
            if properties.iter().any(|(k, _): &(String, String)| k == key) {
                return None;
            }
            properties.push((key.to_string(), value.to_string()));
        }
        if properties.is_empty() && !wildcard {
            return None;
        }
        Some(ObjectName {
            domain: domain.to_string(),
            properties,
            wildcard,
        })
    }

    /// Copy of this name with one more key property
    pub fn with_key(&self, key: &str, value: &str) -> Option<Self> {
        if !valid_key(key) || !valid_value(value) || self.key(key).is_some() {
            return None;
        }
        let mut name = self.clone();
        name.properties.push((key.to_string(), value.to_string()));
        Some(name)
    }

    /// Quote a value so it may contain reserved characters
    pub fn quote(value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        for ch in value.chars() {
            match ch {
                '"' | '*' | '?' | '\\' => {
                    out.push('\\');
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                _ => out.push(ch),
            }
        }
        out.push('"');
        out
    }

    /// Domain part
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Value of a key property
    pub fn key(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Key properties in declaration order
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// True if this name is a pattern (`*` domain or `,*` property list)
    pub fn is_pattern(&self) -> bool {
        self.wildcard || self.domain == "*"
    }

    /// Canonical form: key properties sorted by key
    pub fn canonical(&self) -> String {
        let mut sorted: Vec<_> = self.properties.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = format!("{}:", self.domain);
        for (idx, (key, value)) in sorted.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        if self.wildcard {
            if !sorted.is_empty() {
                out.push(',');
            }
            out.push('*');
        }
        out
    }

    /// True if `self` (a concrete name) is selected by `pattern`
    pub fn matches(&self, pattern: &ObjectName) -> bool {
        if pattern.domain != "*" && pattern.domain != self.domain {
            return false;
        }
        let all_present = pattern
            .properties
            .iter()
            .all(|(key, value)| self.key(key) == Some(value.as_str()));
        if !all_present {
            return false;
        }
        pattern.wildcard || pattern.properties.len() == self.properties.len()
    }

    fn sorted_properties(&self) -> Vec<&(String, String)> {
        let mut sorted: Vec<_> = self.properties.iter().collect();
        sorted.sort();
        sorted
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.wildcard == other.wildcard
            && self.sorted_properties() == other.sorted_properties()
    }
}

impl Eq for ObjectName {}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (idx, (key, value)) in self.properties.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        if self.wildcard {
            if !self.properties.is_empty() {
                write!(f, ",")?;
            }
            write!(f, "*")?;
        }
        Ok(())
    }
}

fn valid_domain(domain: &str) -> bool {
    !domain.is_empty() && !domain.contains([':', '\n', '*', '?'])
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains([':', ',', '=', '*', '?', '\n', '"'])
}

fn valid_value(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    if value.starts_with('"') {
        return valid_quoted(value);
    }
    !value.contains([':', ',', '=', '*', '?', '\n', '"'])
}

fn valid_quoted(value: &str) -> bool {
    if value.len() < 2 || !value.ends_with('"') {
        return false;
    }
    let inner = &value[1..value.len() - 1];
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('"' | '*' | '?' | '\\' | 'n') => {}
                _ => return false,
            },
            '"' | '\n' => return false,
            _ => {}
        }
    }
    true
}

/// Split a property list on commas that are not inside quotes
fn split_properties(list: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in list.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&list[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return None;
    }
    parts.push(&list[start..]);
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_display() {
        let name = ObjectName::new("java.lang", &[("type", "MemoryPool"), ("name", "Eden Space")])
            .unwrap();
        assert_eq!(name.to_string(), "java.lang:type=MemoryPool,name=Eden Space");
        assert_eq!(name.canonical(), "java.lang:name=Eden Space,type=MemoryPool");
        assert_eq!(name.key("name"), Some("Eden Space"));
    }

    #[test]
    fn test_malformed_input_degrades_to_none() {
        assert!(ObjectName::new("java.lang", &[("type", "a,b")]).is_none());
        assert!(ObjectName::new("java:lang", &[("type", "Memory")]).is_none());
        assert!(ObjectName::new("java.lang", &[]).is_none());
        assert!(ObjectName::new("java.lang", &[("type", "A"), ("type", "B")]).is_none());
        assert!(ObjectName::parse("no-colon").is_none());
        assert!(ObjectName::parse("java.lang:type").is_none());
        assert!(ObjectName::parse("java.lang:type=\"unterminated").is_none());
    }

    #[test]
    fn test_parse_equality_is_order_insensitive() {
        let a = ObjectName::parse("java.lang:type=MemoryPool,name=Tenured").unwrap();
        let b = ObjectName::parse("java.lang:name=Tenured,type=MemoryPool").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_quoted_values() {
        let quoted = ObjectName::quote("weird,name");
        assert_eq!(quoted, "\"weird,name\"");
        let name = ObjectName::new("app", &[("name", quoted.as_str())]).unwrap();
        let parsed = ObjectName::parse(&name.to_string()).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_pattern_matching() {
        let eden = ObjectName::parse("java.lang:type=MemoryPool,name=Eden").unwrap();
        let memory = ObjectName::parse("java.lang:type=Memory").unwrap();

        let pools = ObjectName::parse("java.lang:type=MemoryPool,*").unwrap();
        assert!(pools.is_pattern());
        assert!(eden.matches(&pools));
        assert!(!memory.matches(&pools));

        let everything = ObjectName::parse("*:*").unwrap();
        assert!(eden.matches(&everything));
        assert!(memory.matches(&everything));

        let exact = ObjectName::parse("java.lang:type=Memory").unwrap();
        assert!(memory.matches(&exact));
        assert!(!eden.matches(&exact));
    }
}
