//! Input screening for user-supplied text and index names.
//!
//! Control text and questions end up in SQL rows and LLM prompts, so
//! anything resembling SQL, HTML script, or shell/code execution is refused
//! outright rather than escaped.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Input rejected: {0} detected.")]
    Rejected(&'static str),
    #[error("Invalid name {0:?}: only letters, digits, '_' and '-' are allowed.")]
    InvalidName(String),
}

const PROHIBITED: &[(&str, &str)] = &[
    (
        "SQL keywords",
        r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|REPLACE|TRUNCATE|UNION|EXECUTE|EXEC)\b",
    ),
    ("SQL comment", r"(--|/\*|\*/)"),
    ("Script tag", r"(?i)<script.*?>.*?</script>"),
    (
        "Executable code",
        r"(?i)\b(import|exec|eval|subprocess|os\.system|os\.popen)\b",
    ),
];

fn prohibited_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PROHIBITED
            .iter()
            .map(|(reason, pattern)| (*reason, Regex::new(pattern).expect("valid pattern")))
            .collect()
    })
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid name pattern"))
}

/// Reject text matching any prohibited pattern. Checks run in a fixed
/// order and the first hit names the reason.
pub fn validate_input(text: &str) -> Result<(), ValidationError> {
    match prohibited_patterns()
        .iter()
        .find(|(_, re)| re.is_match(text))
    {
        Some((reason, _)) => Err(ValidationError::Rejected(reason)),
        None => Ok(()),
    }
}

/// Accept only `[A-Za-z0-9_-]+`.
pub fn validate_policy_name(name: &str) -> Result<(), ValidationError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_sql() {
        let err = validate_input("DROP TABLE users;").unwrap_err();
        assert_eq!(err, ValidationError::Rejected("SQL keywords"));
        assert_eq!(err.to_string(), "Input rejected: SQL keywords detected.");
        assert!(validate_input("select * from t").is_err());
    }

    #[test]
    fn rejects_sql_comments() {
        assert_eq!(
            validate_input("name' -- trailing").unwrap_err(),
            ValidationError::Rejected("SQL comment")
        );
        assert!(validate_input("a /* b").is_err());
    }

    #[test]
    fn rejects_script_tags() {
        assert_eq!(
            validate_input("<script>alert('x')</script>").unwrap_err(),
            ValidationError::Rejected("Script tag")
        );
        assert!(validate_input("<SCRIPT type=\"x\">1</SCRIPT>").is_err());
    }

    #[test]
    fn rejects_code_keywords() {
        assert_eq!(
            validate_input("eval(payload)").unwrap_err(),
            ValidationError::Rejected("Executable code")
        );
        assert!(validate_input("call os.system now").is_err());
    }

    #[test]
    fn accepts_ordinary_control_text() {
        assert!(validate_input("Access to information shall be restricted.").is_ok());
        // Keywords only match as whole words.
        assert!(validate_input("Important updates are selected weekly.").is_ok());
        assert!(validate_input("").is_ok());
    }

    #[test]
    fn policy_names() {
        for name in ["Policy1", "Policy_A", "Policy-1"] {
            assert!(validate_policy_name(name).is_ok(), "{name}");
        }
        for name in ["../etc/passwd", "Policy name", "Policy$", ""] {
            assert!(validate_policy_name(name).is_err(), "{name}");
        }
    }
}
