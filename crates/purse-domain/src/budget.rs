//! Spending limits attached to a category for a given period.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{new_record_id, Identifiable};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

/// Several budgets may target the same category; they are not deduplicated by
/// (category, period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub category_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub period: BudgetPeriod,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(category_id: impl Into<String>, amount: Decimal, period: BudgetPeriod) -> Self {
        Self {
            id: new_record_id(),
            category_id: category_id.into(),
            amount,
            period,
            created_at: Utc::now(),
        }
    }
}

impl Identifiable for Budget {
    fn id(&self) -> &str {
        &self.id
    }
}
