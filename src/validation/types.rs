//! Validation result types.

use serde::Serialize;
use std::fmt;

/// Severity of a validation finding, strictly ordered
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    None,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Outcome of validating an address or a circuit, ready for display
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
    pub severity: Severity,
    pub warnings: Vec<String>,
    /// Alternative addresses worth offering instead
    pub suggestions: Vec<u16>,
    #[serde(skip)]
    errors: Vec<String>,
}

impl ValidationResult {
    /// A passing result with the given summary message
    pub fn valid(message: impl Into<String>) -> Self {
        ValidationResult {
            is_valid: true,
            message: message.into(),
            severity: Severity::None,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Raise the severity; a lower value never downgrades it
    pub fn escalate(&mut self, severity: Severity) {
        if severity > self.severity {
            self.severity = severity;
        }
        if self.severity >= Severity::Error {
            self.is_valid = false;
        }
    }

    /// Record a blocking finding; the message becomes part of `message`
    pub fn fail(&mut self, severity: Severity, message: impl Into<String>) {
        self.errors.push(message.into());
        self.message = self.errors.join("; ");
        self.escalate(severity);
    }

    /// Record a non-blocking finding
    pub fn warn(&mut self, severity: Severity, message: impl Into<String>) {
        self.warnings.push(message.into());
        self.escalate(severity);
    }

    pub fn suggest(&mut self, addresses: impl IntoIterator<Item = u16>) {
        for address in addresses {
            if !self.suggestions.contains(&address) {
                self.suggestions.push(address);
            }
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        for warning in &self.warnings {
            write!(f, " | {}", warning)?;
        }
        if !self.suggestions.is_empty() {
            let list: Vec<String> = self.suggestions.iter().map(u16::to_string).collect();
            write!(f, " | Try: {}", list.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::None < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_escalation_never_downgrades() {
        let mut result = ValidationResult::valid("ok");
        result.escalate(Severity::Critical);
        result.escalate(Severity::Warning);
        assert_eq!(result.severity, Severity::Critical);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_warnings_keep_result_valid() {
        let mut result = ValidationResult::valid("Address 4 is valid");
        result.warn(Severity::Warning, "Circuit at 90% capacity");
        assert!(result.is_valid);
        assert_eq!(result.message, "Address 4 is valid");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_fail_joins_messages() {
        let mut result = ValidationResult::valid("ok");
        result.fail(Severity::Error, "first");
        result.fail(Severity::Error, "second");
        assert_eq!(result.message, "first; second");
        assert_eq!(result.errors().len(), 2);
    }

    #[test]
    fn test_display_formatting() {
        let mut result = ValidationResult::valid("ok");
        result.fail(Severity::Error, "Address 5 is already used by Smoke 2");
        result.suggest([6, 4, 6]);
        assert_eq!(
            result.to_string(),
            "[ERROR] Address 5 is already used by Smoke 2 | Try: 6, 4"
        );
    }
}
