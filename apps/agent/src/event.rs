use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Add => write!(f, "add"),
            EventKind::Delete => write!(f, "delete"),
        }
    }
}

/// One hostname of a resource appearing or disappearing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EventKind,

    /// Hostname including its scheme, e.g. `https://example.com`
    pub hostname: String,

    /// Annotations of the resource the hostname belongs to
    pub annotations: BTreeMap<String, String>,

    /// `namespace/name` of that resource
    pub source: String,
}

/// Identity of a hostname announced by a given resource
pub type EventKey = (String, String);

impl ChangeEvent {
    pub fn key(&self) -> EventKey {
        (self.source.clone(), self.hostname.clone())
    }

    pub fn has_annotation(&self, key: &str, value: &str) -> bool {
        self.annotations.get(key).is_some_and(|v| v == value)
    }
}
