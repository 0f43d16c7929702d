use lazy_static::lazy_static;
use regex::Regex;

/// Fields the extractor looks for in a nutrition report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    MealName,
    TotalCalories,
    Protein,
    Carbs,
    Fat,
    Fiber,
    Health,
    KidSuitability,
}

impl Field {
    fn is_numeric(self) -> bool {
        matches!(
            self,
            Field::TotalCalories | Field::Protein | Field::Carbs | Field::Fat | Field::Fiber
        )
    }
}

/// Raw per-field results of a single extraction pass. `None` means the field
/// was not found (or its value was not a usable number).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialFields {
    pub meal_name: Option<String>,
    pub total_calories: Option<u32>,
    pub protein: Option<u32>,
    pub carbs: Option<u32>,
    pub fat: Option<u32>,
    pub fiber: Option<u32>,
    pub health_text: Option<String>,
    pub kid_text: Option<String>,
}

impl PartialFields {
    /// Number of fields that were found.
    pub fn found(&self) -> usize {
        [
            self.meal_name.is_some(),
            self.total_calories.is_some(),
            self.protein.is_some(),
            self.carbs.is_some(),
            self.fat.is_some(),
            self.fiber.is_some(),
            self.health_text.is_some(),
            self.kid_text.is_some(),
        ]
        .into_iter()
        .filter(|f| *f)
        .count()
    }
}

enum Value {
    Number(u32),
    Text(String),
}

struct Rule {
    field: Field,
    patterns: Vec<Regex>,
}

// Optional "(g)" / "(kcal)" unit note between a label and its colon.
const UNIT_NOTE: &str = r"(?:[ \t]*\([^)\n]*\))?";

// Where a numeric label may start: a line (after bullets, markdown or list
// numbering) or the next item of a list written on one line. Keeps "Saturated
// Fat:" and "Ingredients and Calories:" from reading as "Fat:"/"Calories:".
const LINE_START: &str = r"(?:^|[,;|:])[ \t*#>-]*(?:\d+[.)][ \t*]*)?";

fn number_after(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?im){LINE_START}{label}{UNIT_NOTE}[ \t*]*:[ \t*]*(\d+)"
    ))
    .expect("numeric label pattern")
}

fn number_anywhere(label: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{label}{UNIT_NOTE}[ \t*]*:[ \t*]*(\d+)"))
        .expect("numeric label pattern")
}

fn text_after(label: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{label}{UNIT_NOTE}[ \t*]*[:?][ \t*]*([^\n]*)"))
        .expect("text label pattern")
}

fn raw(pattern: &str) -> Regex {
    Regex::new(pattern).expect("raw pattern")
}

impl Rule {
    fn labelled(field: Field, labels: &[&str]) -> Self {
        let build = if field.is_numeric() { number_after } else { text_after };
        Self {
            field,
            patterns: labels.iter().map(|l| build(l)).collect(),
        }
    }
}

lazy_static! {
    // Ordered per field: earlier patterns win over later ones. The report
    // format has changed several times, so most fields carry more than one
    // spelling.
    static ref RULES: Vec<Rule> = vec![
        Rule::labelled(
            Field::MealName,
            &[r"meal[ \t]+name", r"dish[ \t]+name", r"food[ \t]+name"],
        ),
        Rule {
            field: Field::TotalCalories,
            patterns: vec![
                number_anywhere(r"total[ \t]+(?:calories|energy)"),
                raw(r"(?i)\btotal\b[^\n\d]*?(\d+)[ \t]*(?:kcal|calories|cal)\b"),
                number_after(r"calories"),
                raw(r"(?i)(\d+)[ \t]*kcal\b"),
            ],
        },
        Rule::labelled(Field::Protein, &[r"proteins?"]),
        Rule::labelled(Field::Carbs, &[r"carbs", r"carbohydrates?"]),
        Rule::labelled(Field::Fat, &[r"(?:total[ \t]+)?fats?"]),
        Rule::labelled(Field::Fiber, &[r"fib(?:er|re)"]),
        Rule::labelled(
            Field::Health,
            &[
                r"health(?:iness)?(?:[ \t]+(?:level|status|rating))?",
                r"health[ \t]+classification",
            ],
        ),
        Rule::labelled(
            Field::KidSuitability,
            &[
                r"(?:is[ \t]+it[ \t]+)?suitable[ \t]+for[ \t]+(?:kids|children)",
                r"suitability[ \t]+for[ \t]+(?:kids|children)",
                r"kids?[ \t-]*(?:suitability|friendly|safe)",
            ],
        ),
    ];
}

/// Scan `raw_text` for every known field. Never fails: anything that cannot be
/// found is left as `None`.
pub fn extract(raw_text: &str) -> PartialFields {
    let mut fields = PartialFields::default();
    for rule in RULES.iter() {
        let value = rule
            .patterns
            .iter()
            .find_map(|re| capture(raw_text, rule.field, re));
        match (rule.field, value) {
            (Field::MealName, Some(Value::Text(t))) => fields.meal_name = Some(t),
            (Field::Health, Some(Value::Text(t))) => fields.health_text = Some(t),
            (Field::KidSuitability, Some(Value::Text(t))) => fields.kid_text = Some(t),
            (Field::TotalCalories, Some(Value::Number(n))) => fields.total_calories = Some(n),
            (Field::Protein, Some(Value::Number(n))) => fields.protein = Some(n),
            (Field::Carbs, Some(Value::Number(n))) => fields.carbs = Some(n),
            (Field::Fat, Some(Value::Number(n))) => fields.fat = Some(n),
            (Field::Fiber, Some(Value::Number(n))) => fields.fiber = Some(n),
            _ => {}
        }
    }
    fields
}

fn capture(text: &str, field: Field, re: &Regex) -> Option<Value> {
    let caps = re.captures(text)?;
    let group = caps.get(1)?;
    if field.is_numeric() {
        // Numbers must fit the history column (INTEGER); anything larger is
        // as good as no value.
        return group
            .as_str()
            .parse::<i32>()
            .ok()
            .and_then(|n| u32::try_from(n).ok())
            .map(Value::Number);
    }

    let inline = clean(group.as_str());
    if !inline.is_empty() {
        return Some(Value::Text(inline.to_string()));
    }

    // "Healthiness:\nModerate" - value on the following line.
    let next = text[group.end()..]
        .lines()
        .skip(1)
        .map(clean)
        .find(|l| !l.is_empty())?;
    if next.ends_with(':') {
        return None;
    }
    Some(Value::Text(next.to_string()))
}

fn clean(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
}
