use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::classifier::{Classification, HealthLevel, KidSuitability};
use super::extractor::PartialFields;

pub const UNKNOWN_MEAL: &str = "Unknown";

/// Macronutrients in grams for the declared quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Macros {
    pub protein: Option<u32>,
    pub carbs: Option<u32>,
    pub fat: Option<u32>,
    pub fiber: Option<u32>,
}

/// Protein / carbs / fat share of their combined grams, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroDistribution {
    pub protein_pct: f64,
    pub carbs_pct: f64,
    pub fat_pct: f64,
}

impl Macros {
    /// Only available when all three of protein, carbs and fat are known and
    /// they are not all zero.
    pub fn distribution(&self) -> Option<MacroDistribution> {
        let (p, c, f) = (self.protein?, self.carbs?, self.fat?);
        let total = f64::from(p) + f64::from(c) + f64::from(f);
        if total <= 0.0 {
            return None;
        }
        Some(MacroDistribution {
            protein_pct: f64::from(p) * 100.0 / total,
            carbs_pct: f64::from(c) * 100.0 / total,
            fat_pct: f64::from(f) * 100.0 / total,
        })
    }
}

/// One analysed meal. Built once, never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionRecord {
    pub raw_text: String,
    pub meal_name: String,
    pub total_calories: Option<u32>,
    pub macros: Macros,
    pub health_level: HealthLevel,
    pub kid_suitable: KidSuitability,
    pub quantity: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub owner: Uuid,
}

impl NutritionRecord {
    /// Calories that count against the daily budget; unknown counts as zero.
    pub fn counted_calories(&self) -> u32 {
        self.total_calories.unwrap_or(0)
    }
}

pub fn build(
    raw_text: &str,
    fields: &PartialFields,
    classification: Classification,
    quantity: &str,
    owner: Uuid,
    now: OffsetDateTime,
) -> NutritionRecord {
    let meal_name = fields
        .meal_name
        .clone()
        .or_else(|| first_line(raw_text))
        .unwrap_or_else(|| UNKNOWN_MEAL.to_string());

    NutritionRecord {
        raw_text: raw_text.to_string(),
        meal_name,
        total_calories: fields.total_calories,
        macros: Macros {
            protein: fields.protein,
            carbs: fields.carbs,
            fat: fields.fat,
            fiber: fields.fiber,
        },
        health_level: classification.health_level,
        kid_suitable: classification.kid_suitable,
        quantity: quantity.to_string(),
        timestamp: now,
        owner,
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::classifier::classify;
    use crate::nutrition::extractor::extract;
    use time::macros::datetime;

    fn build_from(text: &str) -> NutritionRecord {
        let fields = extract(text);
        let class = classify(&fields, text);
        build(
            text,
            &fields,
            class,
            "1 plate",
            Uuid::nil(),
            datetime!(2024-05-01 12:30 UTC),
        )
    }

    #[test]
    fn veg_sandwich_scenario() {
        let text = "Meal Name: Veg Sandwich\nTotal Calories: 300 kcal\nProtein: 10\nCarbs: 40\nFat: 5\nHealthiness: Healthy";
        let r = build_from(text);
        assert_eq!(r.meal_name, "Veg Sandwich");
        assert_eq!(r.total_calories, Some(300));
        assert_eq!(r.macros.protein, Some(10));
        assert_eq!(r.macros.carbs, Some(40));
        assert_eq!(r.macros.fat, Some(5));
        assert_eq!(r.macros.fiber, None);
        assert_eq!(r.health_level, HealthLevel::Healthy);
        assert_eq!(r.kid_suitable, KidSuitability::Yes);
        assert_eq!(r.quantity, "1 plate");
        assert_eq!(r.raw_text, text);
    }

    #[test]
    fn meal_name_falls_back_to_first_non_blank_line() {
        let r = build_from("\n\n  Chicken Biryani  \nCalories: 600");
        assert_eq!(r.meal_name, "Chicken Biryani");
        assert_eq!(r.total_calories, Some(600));
    }

    #[test]
    fn blank_text_gives_unknowns() {
        let r = build_from("   \n");
        assert_eq!(r.meal_name, UNKNOWN_MEAL);
        assert_eq!(r.total_calories, None);
        assert_eq!(r.macros, Macros::default());
        assert_eq!(r.health_level, HealthLevel::Unknown);
        assert_eq!(r.counted_calories(), 0);
    }

    #[test]
    fn literal_zero_is_kept() {
        let r = build_from("Water\nTotal Calories: 0 kcal\nProtein: 0");
        assert_eq!(r.total_calories, Some(0));
        assert_eq!(r.macros.protein, Some(0));
    }

    #[test]
    fn distribution_requires_three_known_macros() {
        let m = Macros {
            protein: Some(20),
            carbs: Some(60),
            fat: Some(20),
            fiber: None,
        };
        let d = m.distribution().unwrap();
        assert!((d.protein_pct - 20.0).abs() < 1e-9);
        assert!((d.carbs_pct - 60.0).abs() < 1e-9);
        assert!((d.fat_pct - 20.0).abs() < 1e-9);

        let partial = Macros { fat: None, ..m };
        assert!(partial.distribution().is_none());

        let zero = Macros {
            protein: Some(0),
            carbs: Some(0),
            fat: Some(0),
            fiber: Some(3),
        };
        assert!(zero.distribution().is_none());
    }

    #[test]
    fn record_serializes_timestamp_as_rfc3339() {
        let r = build_from("Meal Name: Toast\nCalories: 90");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T12:30:00Z");
        assert_eq!(json["health_level"], "Unknown");
        assert_eq!(json["macros"]["protein"], serde_json::Value::Null);
    }
}
