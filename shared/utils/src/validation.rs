use crate::error::{BomwrightError, BomwrightResult};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;
use validator::{Validate, ValidationErrors};

pub fn validate_model<T: Validate>(model: &T) -> BomwrightResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let error_messages = format_validation_errors(&errors);
            Err(BomwrightError::validation("model", error_messages))
        }
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match (&error.message, error.code.as_ref()) {
                (Some(message), _) => message.to_string(),
                (None, "length") => format!("Length validation failed for field '{}'", field),
                (None, "range") => format!("Value out of range for field '{}'", field),
                (None, "required") => format!("Field '{}' is required", field),
                (None, code) => format!("Validation failed for field '{}': {}", field, code),
            };
            messages.push(message);
        }
    }

    messages.sort();
    messages.join(", ")
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?[0-9]+(?:\.[0-9]+)?$").expect("decimal pattern is valid")
    })
}

/// Parses a decimal written in the one accepted convention: ASCII digits,
/// `.` between digits as the decimal separator, an optional leading sign
/// and no digit grouping or exponent. Surrounding whitespace is ignored.
///
/// The error is a human-readable reason.
pub fn parse_decimal(text: &str) -> Result<Decimal, String> {
    let trimmed = text.trim();
    if !decimal_pattern().is_match(trimmed) {
        return Err(format!("'{}' is not a decimal number", trimmed));
    }

    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    Decimal::from_str(unsigned).map_err(|e| format!("'{}' is not a decimal number: {}", trimmed, e))
}

pub fn validate_file_type(file_name: &str, allowed_types: &[String]) -> BomwrightResult<()> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    if !allowed_types.iter().any(|allowed| allowed.eq_ignore_ascii_case(&extension)) {
        return Err(BomwrightError::validation(
            "file_type",
            format!(
                "File type '{}' not allowed. Allowed types: {}",
                extension,
                allowed_types.join(", ")
            ),
        ));
    }

    Ok(())
}

pub fn validate_file_size(file_size: u64, max_size: u64) -> BomwrightResult<()> {
    if file_size > max_size {
        return Err(BomwrightError::validation(
            "file_size",
            format!("File size {} bytes exceeds maximum allowed size {} bytes", file_size, max_size),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_accepts_fixed_convention() {
        assert_eq!(parse_decimal("10"), Ok(dec!(10)));
        assert_eq!(parse_decimal(" 0.125 "), Ok(dec!(0.125)));
        assert_eq!(parse_decimal("-3.5"), Ok(dec!(-3.5)));
        assert_eq!(parse_decimal("+7"), Ok(dec!(7)));
    }

    #[test]
    fn test_parse_decimal_keeps_scale() {
        assert_eq!(parse_decimal("1.50").unwrap().to_string(), "1.50");
    }

    #[test]
    fn test_parse_decimal_rejects_other_conventions() {
        assert!(parse_decimal("1,000").is_err());
        assert!(parse_decimal("1,5").is_err());
        assert!(parse_decimal("1e3").is_err());
        assert!(parse_decimal("abc").is_err());
        assert!(parse_decimal("").is_err());
        assert!(parse_decimal("1_000").is_err());
        assert!(parse_decimal(".5").is_err());
        assert!(parse_decimal("2.").is_err());
    }

    #[test]
    fn test_validate_file_type() {
        let allowed_types = vec!["csv".to_string(), "xlsx".to_string()];
        assert!(validate_file_type("parts.CSV", &allowed_types).is_ok());
        assert!(validate_file_type("parts.pdf", &allowed_types).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(10, 10).is_ok());
        assert!(validate_file_size(11, 10).is_err());
    }
}
