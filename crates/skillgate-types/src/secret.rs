use std::fmt;

/// A wrapper that redacts secret values in Debug and Display output.
///
/// Capability tokens travel inside [`crate::actor::ActorContext`] values that
/// get logged freely; wrapping them here keeps the value out of every log line.
/// The actual value is accessible via `.expose()`.
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted(String);

impl Redacted {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Redacted(\"***\")")
    }
}

impl fmt::Display for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_debug_hides_value() {
        let secret = Redacted::new("cap-abc123xyz");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("abc123xyz"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_redacted_display_hides_value() {
        let secret = Redacted::new("cap-abc123xyz");
        assert_eq!(format!("{}", secret), "***");
    }

    #[test]
    fn test_redacted_expose() {
        let secret = Redacted::new("cap-abc123xyz");
        assert_eq!(secret.expose(), "cap-abc123xyz");
        assert_eq!(secret.len(), 13);
    }
}
