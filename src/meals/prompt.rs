pub const DEFAULT_QUANTITY: &str = "100g";

/// Trimmed serving size, or the default when the caller left it blank.
pub fn normalize_quantity(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => DEFAULT_QUANTITY.to_string(),
    }
}

/// Instruction sent with the food photo. The section labels must stay in
/// step with what `nutrition::extractor` recognises.
pub fn build_prompt(quantity: &str) -> String {
    format!(
        "You are an expert nutritionist. Look at the food in the image.\n\
         \n\
         Rules:\n\
         - Follow the format below exactly, one field per line\n\
         - Use plain numbers for calories and macros\n\
         - Pick exactly one health level\n\
         - If the food is unhealthy, suggest ingredient alternatives\n\
         - State whether it is suitable for kids\n\
         \n\
         Quantity: {quantity}\n\
         \n\
         Meal Name: <name>\n\
         \n\
         Ingredients and Calories:\n\
         1. <ingredient> - <calories> kcal\n\
         \n\
         Total Calories: <number> kcal\n\
         \n\
         Macronutrient Profile:\n\
         Protein: <grams>\n\
         Carbs: <grams>\n\
         Fat: <grams>\n\
         Fiber: <grams>\n\
         \n\
         Healthiness: Healthy / Moderate / Unhealthy\n\
         \n\
         If Unhealthy - Ingredient Alternatives:\n\
         - <alternatives or Not required>\n\
         \n\
         Suitable for Kids: Yes / No, with reason\n\
         \n\
         Recommendation:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::extractor::extract;

    #[test]
    fn quantity_defaults_when_blank() {
        assert_eq!(normalize_quantity(None), "100g");
        assert_eq!(normalize_quantity(Some("   ")), "100g");
        assert_eq!(normalize_quantity(Some(" 2 slices ")), "2 slices");
    }

    #[test]
    fn prompt_mentions_quantity() {
        assert!(build_prompt("250g").contains("Quantity: 250g"));
    }

    #[test]
    fn filled_template_is_fully_extractable() {
        let answer = build_prompt("1 bowl")
            .replace("<name>", "Oatmeal")
            .replace("<ingredient> - <calories>", "Oats - 150")
            .replace("<number>", "210")
            .replace("<grams>", "7")
            .replace("Healthy / Moderate / Unhealthy", "Healthy")
            .replace("Yes / No, with reason", "Yes, soft and mild");
        let f = extract(&answer);
        assert_eq!(f.meal_name.as_deref(), Some("Oatmeal"));
        assert_eq!(f.total_calories, Some(210));
        assert_eq!(f.protein, Some(7));
        assert_eq!(f.fiber, Some(7));
        assert_eq!(f.health_text.as_deref(), Some("Healthy"));
        assert_eq!(f.kid_text.as_deref(), Some("Yes, soft and mild"));
    }
}
