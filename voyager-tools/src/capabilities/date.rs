//! The `date` capability: evaluates a sandboxed, free-form date expression
//! into one or more absolute instants (spec §4.2). Used by the Planner to
//! turn phrases like "next weekend" or "in 3 days" into concrete dates.

use crate::error::CapabilityError;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;
use voyager_core::types::ToolOutput;

use crate::registry::Capability;

/// Resolve `expr` relative to `reference` into one or more instants.
///
/// Understands: `today`, `tomorrow`, `yesterday`, `next <weekday>`,
/// `next weekend`, `in N day(s)/week(s)/month(s)`, and bare `YYYY-MM-DD`
/// or RFC 3339 dates. Anything else is rejected rather than guessed at.
fn evaluate_expression(expr: &str, reference: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, String> {
    let trimmed = expr.trim();
    let lower = trimmed.to_lowercase();

    match lower.as_str() {
        "today" => return Ok(vec![reference]),
        "tomorrow" => return Ok(vec![reference + Duration::days(1)]),
        "yesterday" => return Ok(vec![reference - Duration::days(1)]),
        "next weekend" => {
            return Ok(vec![next_weekday(reference, Weekday::Sat)]);
        }
        _ => {}
    }

    if let Some(weekday_name) = lower.strip_prefix("next ") {
        if let Ok(weekday) = Weekday::from_str(weekday_name) {
            return Ok(vec![next_weekday(reference, weekday)]);
        }
    }

    if let Some(rest) = lower.strip_prefix("in ") {
        let mut parts = rest.split_whitespace();
        let count: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("could not parse a count out of '{}'", expr))?;
        let unit = parts
            .next()
            .ok_or_else(|| format!("missing unit in '{}'", expr))?
            .trim_end_matches('s');
        let delta = match unit {
            "day" => Duration::days(count),
            "week" => Duration::weeks(count),
            "month" => Duration::days(count * 30),
            other => return Err(format!("unrecognized unit '{}'", other)),
        };
        return Ok(vec![reference + delta]);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(vec![dt.with_timezone(&Utc)]);
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let dt = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        return Ok(vec![dt]);
    }

    Err(format!("unrecognized date expression: '{}'", expr))
}

fn next_weekday(from: DateTime<Utc>, target: Weekday) -> DateTime<Utc> {
    let mut candidate = from + Duration::days(1);
    while candidate.weekday() != target {
        candidate += Duration::days(1);
    }
    candidate
}

/// The `date` capability exposed to the Planner.
pub struct DateCapability {
    now: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl DateCapability {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Utc::now),
        }
    }

    /// Construct with an injected clock, for deterministic tests.
    pub fn with_clock(now: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self { now: Arc::new(now) }
    }
}

impl Default for DateCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for DateCapability {
    fn name(&self) -> &str {
        "date"
    }

    fn description(&self) -> &str {
        "Evaluates a free-form date expression (e.g. 'next weekend', 'in 3 days', \
         '2026-08-01') into one or more absolute instants (RFC 3339)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Free-form date expression to resolve"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, CapabilityError> {
        let expression = args["expression"]
            .as_str()
            .ok_or_else(|| CapabilityError::InvalidArguments {
                name: "date".to_string(),
                reason: "missing 'expression' parameter".to_string(),
            })?;

        let reference = (self.now)();
        let instants =
            evaluate_expression(expression, reference).map_err(|message| {
                CapabilityError::ExecutionFailed {
                    name: "date".to_string(),
                    message,
                }
            })?;

        let rfc3339: Vec<String> = instants.iter().map(|dt| dt.to_rfc3339()).collect();
        Ok(ToolOutput::json(&json!(rfc3339)))
    }
}
