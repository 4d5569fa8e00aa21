//! Validation of raw onboarding answers.
//!
//! Numeric fields accept a bare number with an optional trailing unit
//! ("175", "175 cm", "72.5kg", "30 years"). A decimal comma is accepted.
//! Everything else is free text, trimmed and length-capped.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

use super::model::FieldValue;
use super::state::ProfileField;

/// Longest accepted free-text answer.
pub const MAX_TEXT_LEN: usize = 500;

pub const AGE_RANGE: (f64, f64) = (1.0, 120.0);
pub const HEIGHT_RANGE_CM: (f64, f64) = (50.0, 272.0);
pub const WEIGHT_RANGE_KG: (f64, f64) = (2.0, 650.0);

static NUMBER_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:[.,]\d+)?)\s*(cm|kg|kgs|years?|yrs?|y/?o)?\s*$")
        .expect("static regex is valid")
});

/// Validate a raw answer for `field`.
pub fn parse_field(field: ProfileField, raw: &str) -> Result<FieldValue, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    match field {
        ProfileField::Age => {
            let value = parse_number(trimmed, "30")?;
            check_range(value, AGE_RANGE, "years")?;
            if value.fract() != 0.0 {
                return Err(ValidationError::NotANumber {
                    input: trimmed.to_string(),
                    example: "30",
                });
            }
            Ok(FieldValue::Integer(value as i64))
        }
        ProfileField::Height => {
            let value = parse_number(trimmed, "170")?;
            check_range(value, HEIGHT_RANGE_CM, "cm")?;
            Ok(FieldValue::Decimal(value))
        }
        ProfileField::Weight => {
            let value = parse_number(trimmed, "65")?;
            check_range(value, WEIGHT_RANGE_KG, "kg")?;
            Ok(FieldValue::Decimal(value))
        }
        ProfileField::Name
        | ProfileField::Gender
        | ProfileField::ActivityLevel
        | ProfileField::RecurringIssues => {
            if trimmed.chars().count() > MAX_TEXT_LEN {
                return Err(ValidationError::TooLong { max: MAX_TEXT_LEN });
            }
            Ok(FieldValue::Text(trimmed.to_string()))
        }
    }
}

fn parse_number(input: &str, example: &'static str) -> Result<f64, ValidationError> {
    let not_a_number = || ValidationError::NotANumber {
        input: input.to_string(),
        example,
    };
    let caps = NUMBER_WITH_UNIT.captures(input).ok_or_else(not_a_number)?;
    caps[1]
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| not_a_number())
}

fn check_range(value: f64, (min, max): (f64, f64), unit: &'static str) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            value,
            min,
            max,
            unit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_accepts_plain_integer() {
        assert_eq!(
            parse_field(ProfileField::Age, "30").unwrap(),
            FieldValue::Integer(30)
        );
        assert_eq!(
            parse_field(ProfileField::Age, " 30 years ").unwrap(),
            FieldValue::Integer(30)
        );
    }

    #[test]
    fn age_rejects_words() {
        let err = parse_field(ProfileField::Age, "thirty").unwrap_err();
        assert!(matches!(err, ValidationError::NotANumber { .. }));
        assert!(err.to_string().contains("thirty"));
    }

    #[test]
    fn age_rejects_fraction_and_out_of_range() {
        assert!(parse_field(ProfileField::Age, "30.5").is_err());
        assert!(matches!(
            parse_field(ProfileField::Age, "0"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_field(ProfileField::Age, "130"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn height_accepts_units_and_decimal_comma() {
        assert_eq!(
            parse_field(ProfileField::Height, "175cm").unwrap(),
            FieldValue::Decimal(175.0)
        );
        assert_eq!(
            parse_field(ProfileField::Height, "172,5").unwrap(),
            FieldValue::Decimal(172.5)
        );
    }

    #[test]
    fn height_rejects_feet_notation() {
        assert!(parse_field(ProfileField::Height, "5'9\"").is_err());
        assert!(parse_field(ProfileField::Height, "-170").is_err());
    }

    #[test]
    fn weight_bounds() {
        assert!(parse_field(ProfileField::Weight, "72.5 kg").is_ok());
        assert!(parse_field(ProfileField::Weight, "1").is_err());
        assert!(parse_field(ProfileField::Weight, "1000").is_err());
    }

    #[test]
    fn empty_answer_rejected_for_every_field() {
        for field in ProfileField::ALL {
            assert_eq!(parse_field(field, "   "), Err(ValidationError::Empty));
        }
    }

    #[test]
    fn text_fields_accepted_as_is() {
        assert_eq!(
            parse_field(ProfileField::Gender, " non-binary ").unwrap(),
            FieldValue::Text("non-binary".into())
        );
        assert_eq!(
            parse_field(ProfileField::ActivityLevel, "mostly desk work").unwrap(),
            FieldValue::Text("mostly desk work".into())
        );
        assert_eq!(
            parse_field(ProfileField::Name, "42").unwrap(),
            FieldValue::Text("42".into())
        );
    }

    #[test]
    fn text_length_capped() {
        let long = "a".repeat(MAX_TEXT_LEN + 1);
        assert_eq!(
            parse_field(ProfileField::RecurringIssues, &long),
            Err(ValidationError::TooLong { max: MAX_TEXT_LEN })
        );
    }
}
