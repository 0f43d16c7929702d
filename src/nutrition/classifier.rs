use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::extractor::PartialFields;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Healthy,
    Moderate,
    Unhealthy,
    #[default]
    Unknown,
}

impl HealthLevel {
    /// Match the leading word of a health fragment ("Moderate - high in fat").
    /// A fragment naming more than one level, such as an unfilled
    /// "Healthy / Moderate / Unhealthy", is `Unknown`.
    pub fn from_fragment(fragment: &str) -> Self {
        let Some(level) = Self::from_word(&leading_word(fragment)) else {
            return HealthLevel::Unknown;
        };
        let ambiguous = fragment
            .split(|c: char| !c.is_alphabetic())
            .filter_map(|w| Self::from_word(&w.to_lowercase()))
            .any(|other| other != level);
        if ambiguous {
            HealthLevel::Unknown
        } else {
            level
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "healthy" => Some(HealthLevel::Healthy),
            "moderate" => Some(HealthLevel::Moderate),
            "unhealthy" => Some(HealthLevel::Unhealthy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthLevel::Healthy => "Healthy",
            HealthLevel::Moderate => "Moderate",
            HealthLevel::Unhealthy => "Unhealthy",
            HealthLevel::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KidSuitability {
    Yes,
    No,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub health_level: HealthLevel,
    pub kid_suitable: KidSuitability,
}

/// What the kid-suitability rules get to look at.
struct Evidence<'a> {
    kid_text: Option<&'a str>,
    health: HealthLevel,
    raw_text: &'a str,
}

type KidRule = (&'static str, fn(&Evidence<'_>) -> Option<KidSuitability>);

/// Evaluated top to bottom, first rule returning a verdict wins. Early report
/// formats never stated kid suitability, so everything after the explicit
/// statement is a fallback for those.
const KID_RULES: &[KidRule] = &[
    ("explicit_statement", explicit_statement),
    ("unhealthy", unhealthy_is_not_for_kids),
    ("caffeine", caffeine_is_not_for_kids),
    ("default", default_yes),
];

lazy_static! {
    static ref CAFFEINE_RE: Regex =
        Regex::new(r"(?i)\b(?:coffee|tea|caffeine|caffeinated)\b").unwrap();
}

fn explicit_statement(e: &Evidence<'_>) -> Option<KidSuitability> {
    match leading_word(e.kid_text?).as_str() {
        "yes" => Some(KidSuitability::Yes),
        "no" => Some(KidSuitability::No),
        _ => None,
    }
}

fn unhealthy_is_not_for_kids(e: &Evidence<'_>) -> Option<KidSuitability> {
    (e.health == HealthLevel::Unhealthy).then_some(KidSuitability::No)
}

fn caffeine_is_not_for_kids(e: &Evidence<'_>) -> Option<KidSuitability> {
    CAFFEINE_RE
        .is_match(e.raw_text)
        .then_some(KidSuitability::No)
}

fn default_yes(_: &Evidence<'_>) -> Option<KidSuitability> {
    Some(KidSuitability::Yes)
}

pub fn classify(fields: &PartialFields, raw_text: &str) -> Classification {
    let health_level = fields
        .health_text
        .as_deref()
        .map(HealthLevel::from_fragment)
        .unwrap_or_default();

    let evidence = Evidence {
        kid_text: fields.kid_text.as_deref(),
        health: health_level,
        raw_text,
    };
    let kid_suitable = KID_RULES
        .iter()
        .find_map(|(name, rule)| {
            rule(&evidence).map(|verdict| {
                debug!(rule = *name, ?verdict, "kid suitability decided");
                verdict
            })
        })
        .unwrap_or_default();

    Classification {
        health_level,
        kid_suitable,
    }
}

/// First alphabetic run, lowercased. Skips emoji and bullets in front of it.
fn leading_word(s: &str) -> String {
    s.chars()
        .skip_while(|c| !c.is_alphabetic())
        .take_while(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}
