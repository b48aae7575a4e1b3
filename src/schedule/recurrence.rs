//! Named recurrence rules.

use super::cron::CronExpression;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub const DAILY: &str = "0 9 * * *";
pub const WEEKLY: &str = "0 9 * * 1";
pub const BI_WEEKLY: &str = "0 9 */14 * *";
pub const MONTHLY: &str = "0 9 1 * *";

/// How often a schedule fires. Serialized as `daily`, `weekly`, `bi-weekly`,
/// `monthly` or the raw cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recurrence {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Custom(String),
}

impl Recurrence {
    pub fn expression(&self) -> &str {
        match self {
            Recurrence::Daily => DAILY,
            Recurrence::Weekly => WEEKLY,
            Recurrence::BiWeekly => BI_WEEKLY,
            Recurrence::Monthly => MONTHLY,
            Recurrence::Custom(expr) => expr,
        }
    }

    /// Resolve to a cron expression. A malformed custom rule falls back to
    /// daily at 09:00 instead of failing.
    pub fn resolve(&self) -> CronExpression {
        match CronExpression::parse(self.expression()) {
            Ok(cron) => cron,
            Err(e) => {
                warn!(rule = %self, error = %e, "invalid recurrence; falling back to daily");
                DAILY_RULE.clone()
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        CronExpression::parse(self.expression()).is_ok()
    }
}

static DAILY_RULE: Lazy<CronExpression> =
    Lazy::new(|| CronExpression::parse(DAILY).expect("static cron rule"));

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::Daily
    }
}

impl From<String> for Recurrence {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Recurrence::Daily,
            "weekly" => Recurrence::Weekly,
            "bi-weekly" | "biweekly" | "bi_weekly" => Recurrence::BiWeekly,
            "monthly" => Recurrence::Monthly,
            _ => Recurrence::Custom(s.trim().to_string()),
        }
    }
}

impl From<&str> for Recurrence {
    fn from(s: &str) -> Self {
        Recurrence::from(s.to_string())
    }
}

impl From<Recurrence> for String {
    fn from(r: Recurrence) -> Self {
        r.to_string()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Daily => f.write_str("daily"),
            Recurrence::Weekly => f.write_str("weekly"),
            Recurrence::BiWeekly => f.write_str("bi-weekly"),
            Recurrence::Monthly => f.write_str("monthly"),
            Recurrence::Custom(expr) => f.write_str(expr),
        }
    }
}
