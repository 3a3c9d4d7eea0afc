use uuid::Uuid;

/// Correlation ID that follows a request through the booking core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps an id propagated from upstream (e.g. a request header).
    pub fn from_value(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self(Uuid::new_v4().as_hyphenated().to_string())
    }
}
