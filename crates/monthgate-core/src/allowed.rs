use crate::error::Result;
use crate::period::PeriodKey;
use crate::window::WindowTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// The `window_months + 1` consecutive months ending at the month of `now`,
/// stepping back one calendar month at a time.
pub fn allowed_set(window_months: u32, now: DateTime<Utc>) -> BTreeSet<PeriodKey> {
    let mut key = PeriodKey::of(now);
    let mut set = BTreeSet::new();
    set.insert(key);
    for _ in 0..window_months {
        key = key.pred();
        set.insert(key);
    }
    set
}

impl WindowTable {
    pub fn allowed_set(&self, tier: &str, now: DateTime<Utc>) -> Result<BTreeSet<PeriodKey>> {
        Ok(allowed_set(self.window_of(tier)?, now))
    }

    /// Allowed sets for every tier, computed once for a single run.
    pub fn plan(&self, now: DateTime<Utc>) -> AccessPlan {
        AccessPlan {
            period: PeriodKey::of(now),
            tiers: self
                .tiers()
                .iter()
                .map(|t| TierPlan {
                    name: t.name.clone(),
                    principal: t.principal.clone(),
                    window_months: t.window_months,
                    allowed: allowed_set(t.window_months, now),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// AccessPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TierPlan {
    pub name: String,
    pub principal: String,
    pub window_months: u32,
    pub allowed: BTreeSet<PeriodKey>,
}

impl TierPlan {
    pub fn can_view(&self, period: PeriodKey) -> bool {
        self.allowed.contains(&period)
    }
}

/// Desired visibility for every tier at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct AccessPlan {
    pub period: PeriodKey,
    pub tiers: Vec<TierPlan>,
}

impl AccessPlan {
    pub fn tier(&self, name: &str) -> Option<&TierPlan> {
        self.tiers.iter().find(|t| t.name == name)
    }
}
