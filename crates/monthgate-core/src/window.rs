use crate::config::Config;
use crate::error::{GateError, Result};
use serde::Serialize;

/// A tier as the reconciler sees it: a principal on the directory plus its
/// access window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub name: String,
    pub principal: String,
    /// Months visible before the current one. A window of `n` grants `n + 1`
    /// buckets.
    pub window_months: u32,
}

/// Immutable tier → window lookup, built once from a validated config.
#[derive(Debug, Clone)]
pub struct WindowTable {
    tiers: Vec<Tier>,
}

impl WindowTable {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.ensure_valid()?;
        let tiers = config
            .tiers
            .iter()
            .map(|t| Tier {
                name: t.name.clone(),
                principal: t.role_id.clone(),
                window_months: t.window_months,
            })
            .collect();
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn get(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Window for `tier`. Unknown tiers are an error, never a default.
    pub fn window_of(&self, tier: &str) -> Result<u32> {
        self.get(tier)
            .map(|t| t.window_months)
            .ok_or_else(|| GateError::UnknownTier(tier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;

    fn config() -> Config {
        Config::new(
            "111",
            vec![
                TierConfig {
                    name: "star".into(),
                    role_id: "222".into(),
                    window_months: 0,
                },
                TierConfig {
                    name: "galaxy".into(),
                    role_id: "333".into(),
                    window_months: 2,
                },
            ],
        )
    }

    #[test]
    fn looks_up_windows() {
        let table = WindowTable::from_config(&config()).unwrap();
        assert_eq!(table.window_of("star").unwrap(), 0);
        assert_eq!(table.window_of("galaxy").unwrap(), 2);
        assert_eq!(table.tiers().len(), 2);
        assert_eq!(table.get("galaxy").unwrap().principal, "333");
    }

    #[test]
    fn unknown_tier_is_an_error() {
        let table = WindowTable::from_config(&config()).unwrap();
        assert!(matches!(
            table.window_of("comet"),
            Err(GateError::UnknownTier(name)) if name == "comet"
        ));
    }

    #[test]
    fn refuses_invalid_config() {
        let cfg = Config::new("111", vec![]);
        assert!(matches!(
            WindowTable::from_config(&cfg),
            Err(GateError::InvalidConfig(_))
        ));
    }
}
