//! Model output parsing and validation
//!
//! The model is asked for a bare JSON object but frequently wraps it in a
//! markdown code fence. Parsing strips fence markers and surrounding
//! whitespace, decodes the JSON, then checks it against the nutrition schema.

use crate::nutrition::NutritionRecord;
use thiserror::Error;

/// Why model output could not become a [`NutritionRecord`]
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// Output was not JSON at all
    #[error("Model output is not valid JSON: {0}")]
    NotJson(String),

    /// JSON decoded but a required field is missing or has the wrong type
    #[error("Model output does not match the nutrition schema: {0}")]
    Schema(String),

    /// Fields are present but a value is out of range
    #[error("Model output failed validation: {0}")]
    Invalid(String),
}

/// Remove ```` ```json ```` and ```` ``` ```` markers and trim whitespace
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse raw model output into a validated nutrition record
pub fn parse_nutrition(raw: &str) -> Result<NutritionRecord, ParseError> {
    let clean = strip_code_fences(raw);

    let value: serde_json::Value =
        serde_json::from_str(&clean).map_err(|e| ParseError::NotJson(e.to_string()))?;

    let record: NutritionRecord =
        serde_json::from_value(value).map_err(|e| ParseError::Schema(e.to_string()))?;

    record.validate().map_err(ParseError::Invalid)?;

    tracing::debug!(
        food_name = %record.food_name,
        calories = record.calories,
        confidence = %record.confidence,
        "Parsed nutrition record"
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::Confidence;

    const CHICKEN_SALAD: &str = r#"{"foodName":"Grilled chicken salad","servingSize":"1 bowl ~350g","calories":420,"protein":38,"carbs":18,"fat":22,"fiber":6,"sugar":4,"confidence":"high","notes":"Estimate based on visible dressing."}"#;

    fn chicken_salad() -> NutritionRecord {
        NutritionRecord {
            food_name: "Grilled chicken salad".to_string(),
            serving_size: "1 bowl ~350g".to_string(),
            calories: 420.0,
            protein: 38.0,
            carbs: 18.0,
            fat: 22.0,
            fiber: 6.0,
            sugar: 4.0,
            confidence: Confidence::High,
            notes: Some("Estimate based on visible dressing.".to_string()),
        }
    }

    #[test]
    fn test_parse_bare_json() {
        assert_eq!(parse_nutrition(CHICKEN_SALAD).unwrap(), chicken_salad());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = format!("  \n```json\n{}\n```\n", CHICKEN_SALAD);
        assert_eq!(parse_nutrition(&raw).unwrap(), chicken_salad());
    }

    #[test]
    fn test_parse_plain_fence() {
        let raw = format!("```\n{}\n```", CHICKEN_SALAD);
        assert_eq!(parse_nutrition(&raw).unwrap(), chicken_salad());
    }

    #[test]
    fn test_notes_optional() {
        let raw = CHICKEN_SALAD.replace(r#","notes":"Estimate based on visible dressing.""#, "");
        let record = parse_nutrition(&raw).unwrap();
        assert_eq!(record.notes, None);
    }

    #[test]
    fn test_rejects_prose() {
        let err = parse_nutrition("I'm sorry, I can't identify this food.").unwrap_err();
        assert!(matches!(err, ParseError::NotJson(_)));
    }

    #[test]
    fn test_rejects_each_missing_numeric_field() {
        for field in ["calories", "protein", "carbs", "fat", "fiber", "sugar"] {
            let mut value: serde_json::Value = serde_json::from_str(CHICKEN_SALAD).unwrap();
            value.as_object_mut().unwrap().remove(field);

            let err = parse_nutrition(&value.to_string()).unwrap_err();
            assert!(
                matches!(err, ParseError::Schema(ref msg) if msg.contains(field)),
                "missing {} gave {:?}",
                field,
                err
            );
        }
    }

    #[test]
    fn test_rejects_numeric_string() {
        let raw = CHICKEN_SALAD.replace(r#""calories":420"#, r#""calories":"420""#);
        assert!(matches!(parse_nutrition(&raw), Err(ParseError::Schema(_))));
    }

    #[test]
    fn test_rejects_negative_value() {
        let raw = CHICKEN_SALAD.replace(r#""sugar":4"#, r#""sugar":-4"#);
        assert!(matches!(parse_nutrition(&raw), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn test_rejects_json_array() {
        assert!(matches!(parse_nutrition("[1, 2, 3]"), Err(ParseError::Schema(_))));
    }
}
