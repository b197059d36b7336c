// Copyright 2023 Remi Bernotavicius

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Points handed out by the suggestion scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub per_time_chosen: f64,
    pub per_time_refused: f64,
    /// Applied to the frequency weight seeded from the catalog.
    pub per_frequency_point: f64,
    /// Days since a recipe was last prepared are divided by this before being added.
    pub novelty_days_per_point: f64,
    pub novelty_cap: f64,
    pub never_prepared: f64,
    pub preferred_type: f64,
    pub within_time_budget: f64,
    pub family_friendly: f64,
    pub variety: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            per_time_chosen: 2.0,
            per_time_refused: 3.0,
            per_frequency_point: 0.0,
            novelty_days_per_point: 7.0,
            novelty_cap: 3.0,
            never_prepared: 2.0,
            preferred_type: 3.0,
            within_time_budget: 2.0,
            family_friendly: 2.0,
            variety: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionRules {
    pub default_count: usize,
    pub weekend_types: Vec<String>,
    pub weekend_time_budget: u32,
    pub weekday_types: Vec<String>,
    pub weekday_time_budget: u32,
    pub family_tag: String,
    pub max_per_type: usize,
    pub max_per_cuisine: Option<usize>,
    /// With `force_new`, recipes suggested or prepared this recently are left out.
    pub recent_days: i64,
}

impl Default for SuggestionRules {
    fn default() -> Self {
        Self {
            default_count: 5,
            weekend_types: vec!["weekend".into(), "slow_cooked".into()],
            weekend_time_budget: 180,
            weekday_types: vec!["quick".into()],
            weekday_time_budget: 30,
            family_tag: "family_friendly".into(),
            max_per_type: 2,
            max_per_cuisine: None,
            recent_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoppingRules {
    pub default_diners: f64,
    pub default_price: f64,
    pub aisle_order: Vec<String>,
    pub default_history_limit: u32,
}

impl Default for ShoppingRules {
    fn default() -> Self {
        Self {
            default_diners: 2.5,
            default_price: 3.0,
            aisle_order: [
                "Produce",
                "Meat",
                "Fish",
                "Deli",
                "Dairy",
                "Cheese",
                "Pasta",
                "Pantry",
                "Frozen",
                "Bakery",
                "Pastry",
                "Oils",
                "Spices",
                "Herbs",
                "International",
                "Canned Goods",
                "Alcohol",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scoring: ScoringWeights,
    pub suggestions: SuggestionRules,
    pub shopping: ShoppingRules,
}

impl Config {
    /// Reads the configuration file if there is one, otherwise everything is defaulted.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[test]
fn partial_config_keeps_defaults() {
    let config: Config = serde_json::from_str(
        r#"{ "scoring": { "per_time_refused": 5.0 }, "suggestions": { "max_per_cuisine": 1 } }"#,
    )
    .unwrap();
    assert_eq!(config.scoring.per_time_refused, 5.0);
    assert_eq!(config.scoring.per_time_chosen, 2.0);
    assert_eq!(config.suggestions.max_per_cuisine, Some(1));
    assert_eq!(config.suggestions.max_per_type, 2);
    assert_eq!(config.shopping, ShoppingRules::default());
}

#[test]
fn missing_config_file_is_default() {
    let config = Config::load("/nonexistent/config.json").unwrap();
    assert_eq!(config, Config::default());
}
