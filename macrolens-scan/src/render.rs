//! Terminal rendering of scan results and history

use chrono::Local;
use macrolens_common::{HistoryEntry, NutritionRecord};
use std::fmt::Write;

/// Reference maxima (grams) the macro bars are scaled against
pub const MACRO_BAR_MAXIMA: [(&str, f64); 5] = [
    ("Protein", 60.0),
    ("Carbs", 120.0),
    ("Fat", 70.0),
    ("Fiber", 30.0),
    ("Sugar", 60.0),
];

const BAR_WIDTH: usize = 24;

/// Fraction of the bar filled, capped at 1.0
pub fn bar_fraction(value: f64, max: f64) -> f64 {
    if max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

pub fn macro_bar(value: f64, max: f64, width: usize) -> String {
    let filled = (bar_fraction(value, max) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Whole numbers without decimals, others to one decimal place
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Result card for one record
pub fn render_record(record: &NutritionRecord) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", record.food_name);
    let _ = writeln!(
        out,
        "{} · {} confidence",
        record.serving_size, record.confidence
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  {} kcal", format_amount(record.calories));
    let _ = writeln!(
        out,
        "  Protein {}g | Carbs {}g | Fat {}g",
        format_amount(record.protein),
        format_amount(record.carbs),
        format_amount(record.fat)
    );
    let _ = writeln!(out);

    let values = [
        record.protein,
        record.carbs,
        record.fat,
        record.fiber,
        record.sugar,
    ];
    for ((label, max), value) in MACRO_BAR_MAXIMA.iter().zip(values) {
        let _ = writeln!(
            out,
            "  {:<8}{} {}g",
            label,
            macro_bar(value, *max, BAR_WIDTH),
            format_amount(value)
        );
    }

    if let Some(notes) = record.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", notes);
    }

    out
}

/// History list, newest first
pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No scans yet.\n".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let record = &entry.record;
        let date = entry.timestamp.with_timezone(&Local).format("%b %-d, %Y");

        let _ = writeln!(out, "{}  {}", date, record.food_name);
        let _ = writeln!(
            out,
            "    {} · {} kcal · P {}g C {}g F {}g",
            record.serving_size,
            format_amount(record.calories),
            format_amount(record.protein),
            format_amount(record.carbs),
            format_amount(record.fat)
        );
        if let Some(path) = entry.thumbnail_path() {
            let _ = writeln!(out, "    {}", path.display());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrolens_common::Confidence;

    fn record() -> NutritionRecord {
        NutritionRecord {
            food_name: "Grilled chicken salad".to_string(),
            serving_size: "1 bowl ~350g".to_string(),
            calories: 420.0,
            protein: 38.0,
            carbs: 18.0,
            fat: 22.5,
            fiber: 6.0,
            sugar: 4.0,
            confidence: Confidence::High,
            notes: Some("Estimate based on visible dressing.".to_string()),
        }
    }

    #[test]
    fn test_bar_fraction_capped() {
        assert_eq!(bar_fraction(30.0, 60.0), 0.5);
        assert_eq!(bar_fraction(200.0, 60.0), 1.0);
        assert_eq!(bar_fraction(0.0, 60.0), 0.0);
        assert_eq!(bar_fraction(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_macro_bar_width() {
        let bar = macro_bar(90.0, 60.0, 10);
        assert_eq!(bar.chars().count(), 10);
        assert_eq!(bar, "█".repeat(10));
        assert_eq!(macro_bar(0.0, 60.0, 4), "░░░░");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(420.0), "420");
        assert_eq!(format_amount(22.5), "22.5");
    }

    #[test]
    fn test_record_card() {
        let card = render_record(&record());

        assert!(card.starts_with("Grilled chicken salad\n"));
        assert!(card.contains("1 bowl ~350g · high confidence"));
        assert!(card.contains("420 kcal"));
        assert!(card.contains("Protein 38g | Carbs 18g | Fat 22.5g"));
        assert!(card.contains("Estimate based on visible dressing."));
        for (label, _) in MACRO_BAR_MAXIMA {
            assert!(card.contains(label));
        }
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(render_history(&[]), "No scans yet.\n");
    }

    #[test]
    fn test_history_line() {
        let entry = HistoryEntry::new(record(), Some("/nonexistent/lunch.jpg".to_string()));
        let text = render_history(&[entry]);

        assert!(text.contains("Grilled chicken salad"));
        assert!(text.contains("420 kcal · P 38g C 18g F 22.5g"));
        assert!(!text.contains("/nonexistent/lunch.jpg"));
    }
}
