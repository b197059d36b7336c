// Copyright 2023 Remi Bernotavicius

use crate::database;
use crate::database::models::{
    NewShoppingSession, PreferenceRecord, RecipeId, ShoppingSession, StockItem,
};
use crate::database::Result;
use derive_more::Display;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[display("accepted")]
    Accepted,
    #[display("declined")]
    Declined,
}

/// The durable side of the planner: preferences, stock and shopping history.
pub trait Store {
    /// Inserts the records whose recipe has none yet. Existing records are left alone.
    fn seed_preferences(&mut self, seeds: &[PreferenceRecord]) -> Result<()>;

    fn preferences(&mut self) -> Result<Vec<PreferenceRecord>>;

    /// Returns false when there is no record for the recipe.
    fn record_decision(
        &mut self,
        recipe_id: &RecipeId,
        decision: Decision,
        today: chrono::NaiveDate,
    ) -> Result<bool>;

    /// Returns false when there is no record for the recipe.
    fn record_prepared(&mut self, recipe_id: &RecipeId, day: chrono::NaiveDate) -> Result<bool>;

    fn stock(&mut self) -> Result<Vec<StockItem>>;

    fn upsert_stock(&mut self, item: &StockItem) -> Result<()>;

    fn append_session(&mut self, session: &NewShoppingSession) -> Result<()>;

    /// Newest first.
    fn sessions(&mut self, limit: u32) -> Result<Vec<ShoppingSession>>;
}

pub struct SqliteStore {
    conn: database::Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(database::establish_connection(path)?))
    }

    pub fn new(conn: database::Connection) -> Self {
        Self { conn }
    }
}

impl Store for SqliteStore {
    fn seed_preferences(&mut self, seeds: &[PreferenceRecord]) -> Result<()> {
        use database::schema::preferences::dsl::*;

        let mut inserted = 0;
        for seed in seeds {
            inserted += diesel::insert_or_ignore_into(preferences)
                .values(seed)
                .execute(&mut self.conn)?;
        }
        if inserted > 0 {
            log::info!("started tracking preferences for {inserted} new recipes");
        }
        Ok(())
    }

    fn preferences(&mut self) -> Result<Vec<PreferenceRecord>> {
        use database::schema::preferences::dsl::*;

        Ok(preferences
            .select(PreferenceRecord::as_select())
            .load(&mut self.conn)?)
    }

    fn record_decision(
        &mut self,
        id: &RecipeId,
        decision: Decision,
        today: chrono::NaiveDate,
    ) -> Result<bool> {
        use database::schema::preferences::dsl::*;
        use diesel::update;

        let target = preferences.filter(recipe_id.eq(id.as_str()));
        let updated = match decision {
            Decision::Accepted => update(target)
                .set((times_chosen.eq(times_chosen + 1), last_suggested.eq(today)))
                .execute(&mut self.conn)?,
            Decision::Declined => update(target)
                .set((times_refused.eq(times_refused + 1), last_suggested.eq(today)))
                .execute(&mut self.conn)?,
        };
        Ok(updated > 0)
    }

    fn record_prepared(&mut self, id: &RecipeId, day: chrono::NaiveDate) -> Result<bool> {
        use database::schema::preferences::dsl::*;
        use diesel::update;

        let updated = update(preferences.filter(recipe_id.eq(id.as_str())))
            .set(last_prepared.eq(day))
            .execute(&mut self.conn)?;
        Ok(updated > 0)
    }

    fn stock(&mut self) -> Result<Vec<StockItem>> {
        use database::schema::stock_items::dsl::*;

        Ok(stock_items
            .select(StockItem::as_select())
            .order(ingredient.asc())
            .load(&mut self.conn)?)
    }

    fn upsert_stock(&mut self, item: &StockItem) -> Result<()> {
        use database::schema::stock_items::dsl::*;
        use diesel::insert_into;

        insert_into(stock_items)
            .values(item)
            .on_conflict(ingredient)
            .do_update()
            .set(item)
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn append_session(&mut self, session: &NewShoppingSession) -> Result<()> {
        use database::schema::shopping_sessions::dsl::*;
        use diesel::insert_into;

        insert_into(shopping_sessions)
            .values(session)
            .execute(&mut self.conn)?;
        Ok(())
    }

    fn sessions(&mut self, limit: u32) -> Result<Vec<ShoppingSession>> {
        use database::schema::shopping_sessions::dsl::*;

        Ok(shopping_sessions
            .select(ShoppingSession::as_select())
            .order((day.desc(), id.desc()))
            .limit(i64::from(limit))
            .load(&mut self.conn)?)
    }
}

/// Keeps everything in vectors, for exercising the planner without a database.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pub preferences: Vec<PreferenceRecord>,
    pub stock: Vec<StockItem>,
    pub sessions: Vec<ShoppingSession>,
}

#[cfg(test)]
impl MemoryStore {
    fn preference_mut(&mut self, id: &RecipeId) -> Option<&mut PreferenceRecord> {
        self.preferences.iter_mut().find(|p| &p.recipe_id == id)
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn seed_preferences(&mut self, seeds: &[PreferenceRecord]) -> Result<()> {
        for seed in seeds {
            if self.preference_mut(&seed.recipe_id).is_none() {
                self.preferences.push(seed.clone());
            }
        }
        Ok(())
    }

    fn preferences(&mut self) -> Result<Vec<PreferenceRecord>> {
        Ok(self.preferences.clone())
    }

    fn record_decision(
        &mut self,
        recipe_id: &RecipeId,
        decision: Decision,
        today: chrono::NaiveDate,
    ) -> Result<bool> {
        let Some(pref) = self.preference_mut(recipe_id) else {
            return Ok(false);
        };
        match decision {
            Decision::Accepted => pref.times_chosen += 1,
            Decision::Declined => pref.times_refused += 1,
        }
        pref.last_suggested = Some(today);
        Ok(true)
    }

    fn record_prepared(&mut self, recipe_id: &RecipeId, day: chrono::NaiveDate) -> Result<bool> {
        let Some(pref) = self.preference_mut(recipe_id) else {
            return Ok(false);
        };
        pref.last_prepared = Some(day);
        Ok(true)
    }

    fn stock(&mut self) -> Result<Vec<StockItem>> {
        let mut stock = self.stock.clone();
        stock.sort_by(|a, b| a.ingredient.cmp(&b.ingredient));
        Ok(stock)
    }

    fn upsert_stock(&mut self, item: &StockItem) -> Result<()> {
        self.stock.retain(|s| s.ingredient != item.ingredient);
        self.stock.push(item.clone());
        Ok(())
    }

    fn append_session(&mut self, session: &NewShoppingSession) -> Result<()> {
        let id = i32::try_from(self.sessions.len()).unwrap_or(i32::MAX) + 1;
        self.sessions.push(ShoppingSession {
            id: database::models::SessionId::from(id),
            day: session.day,
            recipe_ids: session.recipe_ids.clone(),
            list: session.list.clone(),
            total_cost: session.total_cost,
        });
        Ok(())
    }

    fn sessions(&mut self, limit: u32) -> Result<Vec<ShoppingSession>> {
        let mut sessions = self.sessions.clone();
        sessions.sort_by(|a, b| b.day.cmp(&a.day).then(b.id.cmp(&a.id)));
        sessions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sessions)
    }
}

#[cfg(test)]
fn sqlite_store() -> SqliteStore {
    SqliteStore::new(database::establish_in_memory().unwrap())
}

#[cfg(test)]
fn day(d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

#[test]
fn seeding_never_overwrites() {
    let mut store = sqlite_store();
    store
        .seed_preferences(&[PreferenceRecord::seeded("pasta".into(), 10)])
        .unwrap();
    store
        .record_decision(&"pasta".into(), Decision::Declined, day(3))
        .unwrap();
    store
        .seed_preferences(&[
            PreferenceRecord::seeded("pasta".into(), 10),
            PreferenceRecord::seeded("soup".into(), 3),
        ])
        .unwrap();

    let mut prefs = store.preferences().unwrap();
    prefs.sort_by(|a, b| a.recipe_id.cmp(&b.recipe_id));
    assert_eq!(prefs.len(), 2);
    assert_eq!(prefs[0].times_refused, 1);
    assert_eq!(prefs[0].last_suggested, Some(day(3)));
    assert_eq!(prefs[1], PreferenceRecord::seeded("soup".into(), 3));
}

#[test]
fn decisions_bump_one_counter() {
    let mut store = sqlite_store();
    store
        .seed_preferences(&[PreferenceRecord::seeded("pasta".into(), 0)])
        .unwrap();

    for _ in 0..3 {
        assert!(store
            .record_decision(&"pasta".into(), Decision::Accepted, day(4))
            .unwrap());
    }
    let pref = store.preferences().unwrap().remove(0);
    assert_eq!(pref.times_chosen, 3);
    assert_eq!(pref.times_refused, 0);
    assert_eq!(pref.last_suggested, Some(day(4)));
    assert_eq!(pref.last_prepared, None);

    assert!(!store
        .record_decision(&"nope".into(), Decision::Accepted, day(4))
        .unwrap());
}

#[test]
fn prepared_is_stamped() {
    let mut store = sqlite_store();
    store
        .seed_preferences(&[PreferenceRecord::seeded("pasta".into(), 0)])
        .unwrap();

    assert!(store.record_prepared(&"pasta".into(), day(5)).unwrap());
    assert!(!store.record_prepared(&"nope".into(), day(5)).unwrap());
    assert_eq!(store.preferences().unwrap()[0].last_prepared, Some(day(5)));
}

#[test]
fn stock_is_upserted_by_ingredient() {
    use crate::database::models::StockLevel;

    let mut store = sqlite_store();
    let milk = StockItem {
        ingredient: "Milk".into(),
        quantity: 1.0,
        unit: "l".into(),
        purchase_date: Some(day(1)),
        expiry_date: Some(day(10)),
        level: StockLevel::High,
    };
    store.upsert_stock(&milk).unwrap();
    store
        .upsert_stock(&StockItem {
            ingredient: "Butter".into(),
            quantity: 250.0,
            unit: "g".into(),
            purchase_date: Some(day(1)),
            expiry_date: None,
            level: StockLevel::Medium,
        })
        .unwrap();
    store
        .upsert_stock(&StockItem {
            quantity: 0.2,
            expiry_date: None,
            level: StockLevel::Low,
            ..milk
        })
        .unwrap();

    let stock = store.stock().unwrap();
    let names: Vec<_> = stock.iter().map(|s| s.ingredient.as_str()).collect();
    assert_eq!(names, vec!["Butter", "Milk"]);
    assert_eq!(stock[1].quantity, 0.2);
    assert_eq!(stock[1].level, StockLevel::Low);
    assert_eq!(stock[1].expiry_date, None);
}

#[test]
fn sessions_come_back_newest_first() {
    let mut store = sqlite_store();
    for (d, cost) in [(3, 10.0), (5, 20.0), (5, 30.0), (1, 40.0)] {
        store
            .append_session(&NewShoppingSession {
                day: day(d),
                recipe_ids: "[]".into(),
                list: "{}".into(),
                total_cost: cost,
            })
            .unwrap();
    }

    let costs: Vec<_> = store
        .sessions(3)
        .unwrap()
        .iter()
        .map(|s| s.total_cost)
        .collect();
    assert_eq!(costs, vec![30.0, 20.0, 10.0]);
}

#[test]
fn both_stores_limit_history_alike() {
    let mut sqlite = sqlite_store();
    let mut memory = MemoryStore::default();
    for (d, cost) in [(2, 5.0), (4, 6.0), (4, 7.0)] {
        let session = NewShoppingSession {
            day: day(d),
            recipe_ids: "[]".into(),
            list: "{}".into(),
            total_cost: cost,
        };
        sqlite.append_session(&session).unwrap();
        memory.append_session(&session).unwrap();
    }

    let costs = |store: &mut dyn Store, limit| -> Vec<f64> {
        store
            .sessions(limit)
            .unwrap()
            .iter()
            .map(|s| s.total_cost)
            .collect()
    };
    for limit in [0, 2, 3, 100, u32::MAX] {
        assert_eq!(costs(&mut sqlite, limit), costs(&mut memory, limit), "limit {limit}");
    }
    assert!(costs(&mut sqlite, 0).is_empty());
    assert_eq!(costs(&mut memory, u32::MAX), vec![7.0, 6.0, 5.0]);
}
