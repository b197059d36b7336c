// Copyright 2023 Remi Bernotavicius

use derive_more::Display;
use diesel::deserialize::Queryable;
use diesel::expression::Selectable;
use diesel::prelude::{AsChangeset, Insertable};
use diesel_derive_enum::DbEnum;
use diesel_derive_newtype::DieselNewType;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

#[derive(
    DieselNewType, Debug, Display, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecipeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Per-recipe counters used to bias suggestions. There is at most one of these per recipe.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::database::schema::preferences)]
#[diesel(primary_key(recipe_id))]
pub struct PreferenceRecord {
    pub recipe_id: RecipeId,
    pub times_chosen: i32,
    pub times_refused: i32,
    pub last_suggested: Option<chrono::NaiveDate>,
    pub last_prepared: Option<chrono::NaiveDate>,
    pub frequency_weight: i32,
}

impl PreferenceRecord {
    /// A record as it looks the first time a recipe enters a suggestion cycle.
    pub fn seeded(recipe_id: RecipeId, frequency_weight: i32) -> Self {
        Self {
            recipe_id,
            times_chosen: 0,
            times_refused: 0,
            last_suggested: None,
            last_prepared: None,
            frequency_weight,
        }
    }
}

#[derive(
    Debug,
    Display,
    EnumIter,
    Hash,
    Copy,
    Clone,
    PartialEq,
    Eq,
    DbEnum,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    #[display("empty")]
    Empty,
    #[display("low")]
    Low,
    #[display("medium")]
    Medium,
    #[display("high")]
    High,
}

impl StockLevel {
    /// Whether there is enough on hand to leave the ingredient off a shopping list.
    pub fn is_sufficient(self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }

    #[cfg(test)]
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq, Serialize)]
#[diesel(table_name = crate::database::schema::stock_items)]
#[diesel(primary_key(ingredient))]
#[diesel(treat_none_as_null = true)]
pub struct StockItem {
    pub ingredient: String,
    pub quantity: f64,
    pub unit: String,
    pub purchase_date: Option<chrono::NaiveDate>,
    pub expiry_date: Option<chrono::NaiveDate>,
    pub level: StockLevel,
}

#[derive(DieselNewType, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize)]
pub struct SessionId(i32);

impl From<i32> for SessionId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::database::schema::shopping_sessions)]
pub struct ShoppingSession {
    pub id: SessionId,
    pub day: chrono::NaiveDate,
    pub recipe_ids: String,
    pub list: String,
    pub total_cost: f64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::database::schema::shopping_sessions)]
pub struct NewShoppingSession {
    pub day: chrono::NaiveDate,
    pub recipe_ids: String,
    pub list: String,
    pub total_cost: f64,
}

#[test]
fn only_medium_and_high_are_sufficient() {
    let sufficient: Vec<_> = StockLevel::iter().filter(|l| l.is_sufficient()).collect();
    assert_eq!(sufficient, vec![StockLevel::Medium, StockLevel::High]);
}

#[test]
fn seeded_preference_starts_from_zero() {
    let record = PreferenceRecord::seeded("pasta".into(), 7);
    assert_eq!(record.times_chosen, 0);
    assert_eq!(record.times_refused, 0);
    assert_eq!(record.frequency_weight, 7);
    assert!(record.last_prepared.is_none());
}
