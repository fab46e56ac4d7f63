//! Nutrition estimate data model
//!
//! A [`NutritionRecord`] is the validated estimate for one scanned image. Field
//! names on the wire are camelCase, matching the JSON shape requested from the
//! model and returned by the relay.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model's self-reported confidence in an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Macronutrient estimate for one food image
///
/// Deserialization enforces presence and value class of every required field;
/// [`NutritionRecord::validate`] enforces the value ranges. Only records that
/// pass both are handed to the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionRecord {
    /// Descriptive name of the food(s), non-empty
    pub food_name: String,
    /// Estimated portion, e.g. "1 bowl ~350g"
    pub serving_size: String,
    /// Energy in kcal
    pub calories: f64,
    /// Grams
    pub protein: f64,
    /// Grams
    pub carbs: f64,
    /// Grams
    pub fat: f64,
    /// Grams
    pub fiber: f64,
    /// Grams
    pub sugar: f64,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NutritionRecord {
    /// Numeric fields paired with their wire names, in schema order
    pub fn numeric_fields(&self) -> [(&'static str, f64); 6] {
        [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
            ("fiber", self.fiber),
            ("sugar", self.sugar),
        ]
    }

    /// Check value ranges that the type system cannot express
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.food_name.trim().is_empty() {
            return Err("foodName is empty".to_string());
        }

        for (name, value) in self.numeric_fields() {
            if !value.is_finite() {
                return Err(format!("{} is not a finite number", name));
            }
            if value < 0.0 {
                return Err(format!("{} is negative ({})", name, value));
            }
        }

        Ok(())
    }
}
