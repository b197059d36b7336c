// Copyright 2023 Remi Bernotavicius

use crate::catalog::{Catalog, Recipe};
use crate::config::Config;
use crate::database::models::{
    NewShoppingSession, PreferenceRecord, RecipeId, SessionId, StockItem, StockLevel,
};
use crate::database::StoreError;
use crate::scorer::{Scorer, Suggestion};
use crate::shopping::{ListBuilder, ScaledRecipe, ShoppingList, StockSnapshot};
use crate::store::{Decision, Store};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub trait Clock {
    fn today(&self) -> chrono::NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> chrono::NaiveDate {
        chrono::Local::now().date_naive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot plan a meal for {0} diners")]
    InvalidDiners(f64),
}

impl From<serde_json::Error> for PlannerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(e.into())
    }
}

type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockUpdate {
    pub ingredient: String,
    pub quantity: f64,
    pub unit: String,
    pub level: StockLevel,
    #[serde(default)]
    pub expiry_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: SessionId,
    pub date: chrono::NaiveDate,
    pub recipe_ids: Vec<RecipeId>,
    pub total_cost: f64,
    pub list: ShoppingList,
}

/// Everything the household assistant can do. Holds a read-only catalog, the store it persists
/// to and the clock it asks for today's date.
pub struct Planner<S, C = SystemClock> {
    catalog: Catalog,
    config: Config,
    store: S,
    clock: C,
}

impl<S: Store, C: Clock> Planner<S, C> {
    pub fn new(catalog: Catalog, config: Config, store: S, clock: C) -> Self {
        Self {
            catalog,
            config,
            store,
            clock,
        }
    }

    pub fn recipes(&self) -> &[Recipe] {
        self.catalog.recipes()
    }

    fn seed_preferences(&mut self) -> Result<()> {
        let seeds: Vec<_> = self
            .catalog
            .recipes()
            .iter()
            .map(|r| PreferenceRecord::seeded(r.id.clone(), r.frequency_weight()))
            .collect();
        self.store.seed_preferences(&seeds)?;
        Ok(())
    }

    pub fn suggest(&mut self, count: Option<usize>, force_new: bool) -> Result<Vec<Suggestion>> {
        self.seed_preferences()?;
        let preferences: HashMap<RecipeId, PreferenceRecord> = self
            .store
            .preferences()?
            .into_iter()
            .map(|p| (p.recipe_id.clone(), p))
            .collect();

        let count = count.unwrap_or(self.config.suggestions.default_count);
        let scorer = Scorer::new(&self.config.scoring, &self.config.suggestions);
        let suggestions = scorer.suggest(
            &self.catalog,
            &preferences,
            self.clock.today(),
            count,
            force_new,
        );
        log::info!("suggested {} recipes", suggestions.len());
        Ok(suggestions)
    }

    /// Returns whether a preference record was updated.
    pub fn record_feedback(&mut self, recipe_id: &RecipeId, decision: Decision) -> Result<bool> {
        self.seed_preferences()?;
        let updated = self
            .store
            .record_decision(recipe_id, decision, self.clock.today())?;
        if updated {
            log::info!("recorded {decision} for {recipe_id}");
        } else {
            log::warn!("no preferences for unknown recipe {recipe_id:?}, ignoring {decision}");
        }
        Ok(updated)
    }

    pub fn mark_prepared(&mut self, recipe_id: &RecipeId) -> Result<bool> {
        self.seed_preferences()?;
        let updated = self.store.record_prepared(recipe_id, self.clock.today())?;
        if !updated {
            log::warn!("no preferences for unknown recipe {recipe_id:?}");
        }
        Ok(updated)
    }

    fn diners(&self, diners: Option<f64>) -> Result<f64> {
        let diners = diners.unwrap_or(self.config.shopping.default_diners);
        if !diners.is_finite() || diners <= 0.0 {
            return Err(PlannerError::InvalidDiners(diners));
        }
        Ok(diners)
    }

    pub fn recipe_ingredients(
        &self,
        recipe_id: &RecipeId,
        diners: Option<f64>,
    ) -> Result<Option<ScaledRecipe>> {
        let diners = self.diners(diners)?;
        let builder = ListBuilder::new(&self.catalog, &self.config.shopping);
        Ok(self
            .catalog
            .get(recipe_id)
            .map(|recipe| builder.scale_recipe(recipe, diners)))
    }

    /// Builds the list and files it in the shopping history.
    pub fn build_shopping_list(
        &mut self,
        recipe_ids: &[RecipeId],
        diners: Option<f64>,
        overrides: BTreeMap<String, bool>,
    ) -> Result<ShoppingList> {
        let diners = self.diners(diners)?;
        let stock = StockSnapshot::from_stock(&self.store.stock()?).with_overrides(overrides);

        let builder = ListBuilder::new(&self.catalog, &self.config.shopping);
        let list = builder.build(recipe_ids, diners, &stock);

        self.store.append_session(&NewShoppingSession {
            day: self.clock.today(),
            recipe_ids: serde_json::to_string(recipe_ids)?,
            list: serde_json::to_string(&list)?,
            total_cost: list.total_cost,
        })?;
        log::info!(
            "built a shopping list of {} items for {} recipes, estimated {:.2}",
            list.item_count,
            list.recipes.len(),
            list.total_cost
        );
        Ok(list)
    }

    pub fn get_stock(&mut self) -> Result<Vec<StockItem>> {
        Ok(self.store.stock()?)
    }

    /// Rows are written one at a time, so a failure part way leaves the earlier ones in place.
    pub fn set_stock(&mut self, updates: Vec<StockUpdate>) -> Result<()> {
        let today = self.clock.today();
        for update in updates {
            log::debug!("stocking {} at {}", update.ingredient, update.level);
            self.store.upsert_stock(&StockItem {
                ingredient: update.ingredient,
                quantity: update.quantity,
                unit: update.unit,
                purchase_date: Some(today),
                expiry_date: update.expiry_date,
                level: update.level,
            })?;
        }
        Ok(())
    }

    pub fn get_history(&mut self, limit: Option<u32>) -> Result<Vec<HistoryEntry>> {
        let limit = limit.unwrap_or(self.config.shopping.default_history_limit);
        self.store
            .sessions(limit)?
            .into_iter()
            .map(|session| -> Result<HistoryEntry> {
                Ok(HistoryEntry {
                    id: session.id,
                    date: session.day,
                    recipe_ids: serde_json::from_str(&session.recipe_ids)?,
                    total_cost: session.total_cost,
                    list: serde_json::from_str(&session.list)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub struct FixedClock(pub chrono::NaiveDate);

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> chrono::NaiveDate {
        self.0
    }
}

#[cfg(test)]
fn monday() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

#[cfg(test)]
type TestPlanner = Planner<crate::store::MemoryStore, FixedClock>;

#[cfg(test)]
fn sample_planner() -> TestPlanner {
    let catalog = Catalog::from_json(crate::catalog::SAMPLE_CATALOG).unwrap();
    Planner::new(
        catalog,
        Config::default(),
        crate::store::MemoryStore::default(),
        FixedClock(monday()),
    )
}

#[test]
fn suggest_returns_the_requested_number() {
    let mut planner = sample_planner();
    for n in [1, 3, 5, 10, 20] {
        let suggestions = planner.suggest(Some(n), false).unwrap();
        assert_eq!(suggestions.len(), n.min(10));
        assert!(suggestions.windows(2).all(|w| w[0].score >= w[1].score));
    }
    assert_eq!(planner.suggest(None, false).unwrap().len(), 5);
    assert_eq!(planner.store.preferences.len(), 10);
}

#[test]
fn suggest_is_deterministic() {
    let mut planner = sample_planner();
    let first = planner.suggest(Some(6), false).unwrap();
    let second = planner.suggest(Some(6), false).unwrap();
    assert_eq!(first, second);
}

#[test]
fn empty_catalog_suggests_the_fallback() {
    let mut planner = Planner::new(
        Catalog::default(),
        Config::default(),
        crate::store::MemoryStore::default(),
        FixedClock(monday()),
    );
    assert_eq!(planner.suggest(Some(5), false).unwrap(), vec![Suggestion::fallback()]);
}

#[test]
fn feedback_counts_each_decision_once() {
    let mut planner = sample_planner();
    let id = RecipeId::from("salmon_lemon");

    for _ in 0..4 {
        assert!(planner.record_feedback(&id, Decision::Accepted).unwrap());
    }
    assert!(planner.record_feedback(&id, Decision::Declined).unwrap());

    let pref = planner
        .store
        .preferences
        .iter()
        .find(|p| p.recipe_id == id)
        .unwrap();
    assert_eq!(pref.times_chosen, 4);
    assert_eq!(pref.times_refused, 1);
    assert_eq!(pref.last_suggested, Some(monday()));

    let others_untouched = planner
        .store
        .preferences
        .iter()
        .filter(|p| p.recipe_id != id)
        .all(|p| p.times_chosen == 0 && p.times_refused == 0);
    assert!(others_untouched);

    assert!(!planner
        .record_feedback(&"no_such_recipe".into(), Decision::Accepted)
        .unwrap());
}

#[test]
fn declining_pushes_a_recipe_down() {
    let mut planner = sample_planner();
    let top = planner.suggest(Some(1), false).unwrap().remove(0);
    for _ in 0..5 {
        planner.record_feedback(&top.id, Decision::Declined).unwrap();
    }
    let all = planner.suggest(Some(10), false).unwrap();
    assert_eq!(all.last().unwrap().id, top.id);
}

#[test]
fn prepared_recipes_lose_their_novelty() {
    let mut planner = sample_planner();
    let id = RecipeId::from("apple_tart");
    let score = |planner: &mut TestPlanner| {
        planner
            .suggest(Some(10), false)
            .unwrap()
            .into_iter()
            .find(|s| s.id == id)
            .unwrap()
            .score
    };

    let before = score(&mut planner);
    assert!(planner.mark_prepared(&id).unwrap());
    let after = score(&mut planner);
    assert_eq!(before - after, 2.0);
}

#[test]
fn shopping_list_is_filed_in_history() {
    let mut planner = sample_planner();
    let ids: Vec<RecipeId> = vec!["pasta_carbonara".into(), "vegetable_omelette".into()];
    let list = planner.build_shopping_list(&ids, Some(2.0), BTreeMap::new()).unwrap();

    // 3 eggs for 4 scaled to 2 diners plus 4 eggs for 2.
    assert_eq!(list.item("Eggs").unwrap().display, "6 pieces");
    assert_eq!(list.recipes, vec!["Pasta Carbonara", "Vegetable Omelette"]);

    let history = planner.get_history(None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].recipe_ids, ids);
    assert_eq!(history[0].date, monday());
    assert_eq!(history[0].total_cost, list.total_cost);
    assert_eq!(history[0].list, list);
    assert!(planner.get_history(Some(0)).unwrap().is_empty());
}

#[test]
fn stock_and_overrides_filter_the_list() {
    use maplit::btreemap;

    let mut planner = sample_planner();
    planner
        .set_stock(vec![
            StockUpdate {
                ingredient: "Spaghetti".into(),
                quantity: 1000.0,
                unit: "g".into(),
                level: StockLevel::High,
                expiry_date: None,
            },
            StockUpdate {
                ingredient: "Eggs".into(),
                quantity: 1.0,
                unit: "pieces".into(),
                level: StockLevel::Low,
                expiry_date: None,
            },
        ])
        .unwrap();

    let stock = planner.get_stock().unwrap();
    assert_eq!(stock.len(), 2);
    assert!(stock.iter().all(|s| s.purchase_date == Some(monday())));

    let ids = [RecipeId::from("pasta_carbonara")];
    let list = planner.build_shopping_list(&ids, None, BTreeMap::new()).unwrap();
    assert!(list.item("Spaghetti").is_none());
    assert!(list.item("Eggs").is_some());

    let overrides = btreemap! { "Eggs".into() => true, "Spaghetti".into() => false };
    let list = planner.build_shopping_list(&ids, None, overrides).unwrap();
    assert!(list.item("Eggs").is_none());
    assert!(list.item("Spaghetti").is_some());
}

#[test]
fn shuffled_recipes_cost_the_same() {
    let mut planner = sample_planner();
    let forward: Vec<RecipeId> = vec![
        "chicken_curry".into(),
        "chili_con_carne".into(),
        "lasagna".into(),
    ];
    let mut backward = forward.clone();
    backward.reverse();

    let a = planner.build_shopping_list(&forward, Some(4.0), BTreeMap::new()).unwrap();
    let b = planner.build_shopping_list(&backward, Some(4.0), BTreeMap::new()).unwrap();
    assert_eq!(a.total_cost, b.total_cost);
    assert_eq!(a.aisles, b.aisles);
}

#[test]
fn diners_must_be_positive() {
    let mut planner = sample_planner();
    let ids = [RecipeId::from("lasagna")];
    for diners in [0.0, -2.0, f64::NAN] {
        let error = planner
            .build_shopping_list(&ids, Some(diners), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(error, PlannerError::InvalidDiners(_)));
    }
    assert!(planner.get_history(None).unwrap().is_empty());
}

#[test]
fn scaled_recipe_view() {
    let planner = sample_planner();
    let scaled = planner
        .recipe_ingredients(&"beef_bourguignon".into(), Some(3.0))
        .unwrap()
        .unwrap();
    let garlic = scaled.ingredients.iter().find(|i| i.name == "Garlic").unwrap();
    // 3 cloves for 6 scaled to 3 diners.
    assert_eq!(garlic.display, "2 cloves");

    assert!(planner
        .recipe_ingredients(&"nope".into(), None)
        .unwrap()
        .is_none());
}

#[test]
fn planner_runs_on_sqlite() {
    let catalog = Catalog::from_json(crate::catalog::SAMPLE_CATALOG).unwrap();
    let store = crate::store::SqliteStore::new(crate::database::establish_in_memory().unwrap());
    let mut planner = Planner::new(catalog, Config::default(), store, FixedClock(monday()));

    let suggestions = planner.suggest(Some(4), false).unwrap();
    assert_eq!(suggestions.len(), 4);
    assert!(planner
        .record_feedback(&suggestions[0].id, Decision::Accepted)
        .unwrap());

    let ids: Vec<_> = suggestions.iter().map(|s| s.id.clone()).collect();
    let list = planner.build_shopping_list(&ids, None, BTreeMap::new()).unwrap();
    let history = planner.get_history(Some(5)).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].list, list);
    assert!(planner.get_history(Some(0)).unwrap().is_empty());
}
