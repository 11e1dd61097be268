//! Inbound input checks applied before any session state is touched.

use std::fmt;

pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1000;
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 100;

const LOG_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    EmptyMessage,
    MessageTooLong { max: usize },
    InvalidIdentifier(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::EmptyMessage => write!(f, "Mensagem não pode estar vazia"),
            InputError::MessageTooLong { max } => {
                write!(f, "Mensagem muito longa (máximo {max} caracteres)")
            }
            InputError::InvalidIdentifier(reason) => write!(f, "Identificador inválido: {reason}"),
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub max_message_length: usize,
    pub max_identifier_length: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }
}

impl InputLimits {
    /// Rejects blank messages and messages longer than the limit (in characters).
    pub fn check_message(&self, message: &str) -> Result<(), InputError> {
        if message.trim().is_empty() {
            return Err(InputError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_length {
            return Err(InputError::MessageTooLong {
                max: self.max_message_length,
            });
        }
        Ok(())
    }

    /// Explicit identifiers are limited to `[A-Za-z0-9._-]`.
    pub fn check_identifier(&self, identifier: &str) -> Result<(), InputError> {
        let identifier = identifier.trim();
        if identifier.len() > self.max_identifier_length {
            return Err(InputError::InvalidIdentifier(format!(
                "longer than {} characters",
                self.max_identifier_length
            )));
        }
        let valid = identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(InputError::InvalidIdentifier(
                "contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// Makes user text safe to log: control characters become spaces and the
/// result is truncated.
pub fn sanitize_for_log(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if cleaned.chars().count() > LOG_PREVIEW_CHARS {
        let truncated: String = cleaned.chars().take(LOG_PREVIEW_CHARS - 3).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_messages() {
        let limits = InputLimits::default();
        assert_eq!(limits.check_message("   \n"), Err(InputError::EmptyMessage));
        assert!(limits.check_message(" oi ").is_ok());
    }

    #[test]
    fn counts_characters_not_bytes() {
        let limits = InputLimits {
            max_message_length: 3,
            ..InputLimits::default()
        };
        assert!(limits.check_message("não").is_ok());
        assert_eq!(
            limits.check_message("nãos"),
            Err(InputError::MessageTooLong { max: 3 })
        );
    }

    #[test]
    fn identifier_charset() {
        let limits = InputLimits::default();
        assert!(limits.check_identifier("f47ac10b-58cc-4372-a567-0e02b2c3d479").is_ok());
        assert!(limits.check_identifier("user.name_01").is_ok());
        assert!(limits.check_identifier("<script>").is_err());
        assert!(limits.check_identifier("a b").is_err());
        assert!(limits.check_identifier(&"x".repeat(101)).is_err());
    }

    #[test]
    fn sanitizes_log_text() {
        assert_eq!(sanitize_for_log("line1\nline2\t!"), "line1 line2 !");
        let long = "a".repeat(150);
        let sanitized = sanitize_for_log(&long);
        assert_eq!(sanitized.chars().count(), 100);
        assert!(sanitized.ends_with("..."));
    }
}
