pub mod accumulator;
pub mod classifier;
pub mod extractor;
pub mod record;

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use record::NutritionRecord;

/// Turn a free-form nutrition report into a record: extract, classify, build.
/// Pure; never fails.
pub fn analyze_report(
    raw_text: &str,
    quantity: &str,
    owner: Uuid,
    now: OffsetDateTime,
) -> NutritionRecord {
    let fields = extractor::extract(raw_text);
    let classification = classifier::classify(&fields, raw_text);
    debug!(
        found = fields.found(),
        health = classification.health_level.as_str(),
        kid = ?classification.kid_suitable,
        "report parsed"
    );
    record::build(raw_text, &fields, classification, quantity, owner, now)
}
