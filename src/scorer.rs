// Copyright 2023 Remi Bernotavicius

use crate::catalog::{Catalog, Difficulty, Recipe};
use crate::config::{ScoringWeights, SuggestionRules};
use crate::database::models::{PreferenceRecord, RecipeId};
use chrono::Datelike as _;
use serde::Serialize;
use std::collections::HashMap;

/// Anything that can hand the scorer a list of recipes to rank.
pub trait CandidateSource {
    fn candidates(&self) -> &[Recipe];
}

impl CandidateSource for Catalog {
    fn candidates(&self) -> &[Recipe] {
        self.recipes()
    }
}

/// What kind of cooking the day of the week calls for.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalContext {
    pub preferred_types: Vec<String>,
    pub time_budget: u32,
    pub family_priority: bool,
}

impl TemporalContext {
    pub fn for_day(day: chrono::NaiveDate, rules: &SuggestionRules) -> Self {
        use chrono::Weekday::*;

        let weekday = day.weekday();
        let (preferred_types, time_budget) = if matches!(weekday, Fri | Sat | Sun) {
            (rules.weekend_types.clone(), rules.weekend_time_budget)
        } else {
            (rules.weekday_types.clone(), rules.weekday_time_budget)
        };
        Self {
            preferred_types,
            time_budget,
            family_priority: !matches!(weekday, Sat | Sun),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub id: RecipeId,
    pub name: String,
    pub prep_time: u32,
    pub difficulty: Difficulty,
    pub portions: u32,
    pub tags: Vec<String>,
    pub score: f64,
}

impl Suggestion {
    fn new(recipe: &Recipe, score: f64) -> Self {
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            prep_time: recipe.prep_time,
            difficulty: recipe.difficulty,
            portions: recipe.portions,
            tags: recipe.tags.clone(),
            score,
        }
    }

    /// Handed out when there is nothing in the catalog to suggest.
    pub fn fallback() -> Self {
        Self {
            id: RecipeId::new("pantry_pasta"),
            name: "Pantry Pasta with Tomato Sauce".into(),
            prep_time: 20,
            difficulty: Difficulty::Easy,
            portions: 4,
            tags: vec!["quick".into()],
            score: 0.0,
        }
    }
}

struct Scored<'r> {
    recipe: &'r Recipe,
    score: f64,
}

#[derive(Default)]
struct VarietyTracker<'r> {
    per_type: HashMap<&'r str, usize>,
    per_cuisine: HashMap<&'r str, usize>,
}

impl<'r> VarietyTracker<'r> {
    fn has_room(&self, recipe: &'r Recipe, rules: &SuggestionRules) -> bool {
        let type_count = self.per_type.get(&recipe.recipe_type[..]).copied();
        if type_count.unwrap_or(0) >= rules.max_per_type {
            return false;
        }
        match rules.max_per_cuisine {
            Some(max) if !recipe.cuisine.is_empty() => {
                self.per_cuisine.get(&recipe.cuisine[..]).copied().unwrap_or(0) < max
            }
            _ => true,
        }
    }

    fn accept(&mut self, recipe: &'r Recipe) {
        *self.per_type.entry(&recipe.recipe_type).or_default() += 1;
        if !recipe.cuisine.is_empty() {
            *self.per_cuisine.entry(&recipe.cuisine).or_default() += 1;
        }
    }
}

pub struct Scorer<'a> {
    weights: &'a ScoringWeights,
    rules: &'a SuggestionRules,
}

impl<'a> Scorer<'a> {
    pub fn new(weights: &'a ScoringWeights, rules: &'a SuggestionRules) -> Self {
        Self { weights, rules }
    }

    /// Everything a recipe earns on its own, before the batch it lands in is considered.
    pub fn score(
        &self,
        recipe: &Recipe,
        preference: Option<&PreferenceRecord>,
        context: &TemporalContext,
        today: chrono::NaiveDate,
    ) -> f64 {
        let w = self.weights;
        let mut score = recipe.base_score.unwrap_or(0.0);

        if let Some(pref) = preference {
            score += w.per_time_chosen * f64::from(pref.times_chosen);
            score -= w.per_time_refused * f64::from(pref.times_refused);
            score += w.per_frequency_point * f64::from(pref.frequency_weight);

            score += match pref.last_prepared {
                Some(prepared) => {
                    let days = (today - prepared).num_days().max(0) as f64;
                    (days / w.novelty_days_per_point).min(w.novelty_cap)
                }
                None => w.never_prepared,
            };
        }

        if context.preferred_types.contains(&recipe.recipe_type) {
            score += w.preferred_type;
        }
        if recipe.prep_time <= context.time_budget {
            score += w.within_time_budget;
        }
        if context.family_priority && recipe.has_tag(&self.rules.family_tag) {
            score += w.family_friendly;
        }
        score
    }

    fn is_recent(&self, preference: Option<&PreferenceRecord>, today: chrono::NaiveDate) -> bool {
        let Some(pref) = preference else {
            return false;
        };
        [pref.last_suggested, pref.last_prepared]
            .into_iter()
            .flatten()
            .any(|day| (today - day).num_days() < self.rules.recent_days)
    }

    pub fn suggest(
        &self,
        source: &impl CandidateSource,
        preferences: &HashMap<RecipeId, PreferenceRecord>,
        today: chrono::NaiveDate,
        count: usize,
        force_new: bool,
    ) -> Vec<Suggestion> {
        let candidates = source.candidates();
        if candidates.is_empty() {
            log::warn!("no recipes to choose from, falling back to a pantry recipe");
            return vec![Suggestion::fallback()];
        }

        let mut eligible: Vec<&Recipe> = candidates.iter().collect();
        if force_new {
            eligible.retain(|r| !self.is_recent(preferences.get(&r.id), today));
            if eligible.is_empty() {
                log::debug!("every recipe was seen recently, considering all of them");
                eligible = candidates.iter().collect();
            }
        }

        let context = TemporalContext::for_day(today, self.rules);
        let mut ranked: Vec<Scored> = eligible
            .into_iter()
            .map(|recipe| Scored {
                recipe,
                score: self.score(recipe, preferences.get(&recipe.id), &context, today),
            })
            .collect();
        // Stable, so equal scores stay in catalog order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut batch = Vec::with_capacity(count);
        let mut taken = vec![false; ranked.len()];
        let mut variety = VarietyTracker::default();

        let pool = count.saturating_mul(2).min(ranked.len());
        for (i, candidate) in ranked[..pool].iter().enumerate() {
            if batch.len() == count {
                break;
            }
            if !variety.has_room(candidate.recipe, self.rules) {
                continue;
            }
            variety.accept(candidate.recipe);
            taken[i] = true;
            batch.push(Suggestion::new(
                candidate.recipe,
                candidate.score + self.weights.variety,
            ));
        }

        for (candidate, _) in ranked.iter().zip(&taken).filter(|(_, t)| !**t) {
            if batch.len() == count {
                break;
            }
            batch.push(Suggestion::new(candidate.recipe, candidate.score));
        }

        batch.sort_by(|a, b| b.score.total_cmp(&a.score));
        log::debug!(
            "suggesting {:?}",
            batch.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
        );
        batch
    }
}

#[cfg(test)]
fn monday() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

#[cfg(test)]
fn catalog(recipes: Vec<Recipe>) -> Catalog {
    Catalog::new(recipes, Default::default()).unwrap()
}

#[cfg(test)]
fn preference(id: &str, chosen: i32, refused: i32) -> (RecipeId, PreferenceRecord) {
    let mut record = PreferenceRecord::seeded(id.into(), 0);
    record.times_chosen = chosen;
    record.times_refused = refused;
    (id.into(), record)
}

#[test]
fn temporal_context_follows_the_week() {
    use chrono::NaiveDate;

    let rules = SuggestionRules::default();

    let weekday = TemporalContext::for_day(monday(), &rules);
    assert_eq!(weekday.preferred_types, vec!["quick".to_string()]);
    assert_eq!(weekday.time_budget, 30);
    assert!(weekday.family_priority);

    let friday = TemporalContext::for_day(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(), &rules);
    assert_eq!(friday.time_budget, 180);
    assert!(friday.preferred_types.contains(&"slow_cooked".to_string()));
    assert!(friday.family_priority);

    let sunday = TemporalContext::for_day(NaiveDate::from_ymd_opt(2024, 6, 9).unwrap(), &rules);
    assert_eq!(sunday.time_budget, 180);
    assert!(!sunday.family_priority);
}

#[test]
fn score_adds_up_every_term() {
    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let context = TemporalContext::for_day(monday(), &rules);

    let mut recipe = crate::catalog::test_recipe("omelette", "quick", 20);
    recipe.tags.push("family_friendly".into());

    let (_, mut pref) = preference("omelette", 3, 1);
    pref.last_prepared = Some(monday() - chrono::Days::new(14));

    // 3 * 2 - 1 * 3 + 14 / 7 + 3 (quick) + 2 (fits in 30 min) + 2 (family)
    assert_eq!(scorer.score(&recipe, Some(&pref), &context, monday()), 12.0);

    // Only the day-of-week bonuses without a preference record.
    assert_eq!(scorer.score(&recipe, None, &context, monday()), 7.0);
}

#[test]
fn novelty_is_capped_and_flat_for_new_recipes() {
    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let context = TemporalContext::for_day(monday(), &rules);
    let recipe = crate::catalog::test_recipe("stew", "slow_cooked", 120);

    let (_, mut pref) = preference("stew", 0, 0);
    assert_eq!(scorer.score(&recipe, Some(&pref), &context, monday()), 2.0);

    pref.last_prepared = Some(monday() - chrono::Days::new(100));
    assert_eq!(scorer.score(&recipe, Some(&pref), &context, monday()), 3.0);

    pref.last_prepared = Some(monday() - chrono::Days::new(7));
    assert_eq!(scorer.score(&recipe, Some(&pref), &context, monday()), 1.0);
}

#[test]
fn frequency_counts_only_when_weighted() {
    let mut weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let context = TemporalContext::for_day(monday(), &rules);
    let recipe = crate::catalog::test_recipe("stew", "slow_cooked", 120);
    let favourite = PreferenceRecord::seeded("stew".into(), 10);

    let unweighted = Scorer::new(&weights, &rules).score(&recipe, Some(&favourite), &context, monday());
    assert_eq!(unweighted, 2.0);

    weights.per_frequency_point = 0.5;
    let weighted = Scorer::new(&weights, &rules).score(&recipe, Some(&favourite), &context, monday());
    assert_eq!(weighted, 7.0);
}

#[test]
fn base_score_is_the_starting_point() {
    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let context = TemporalContext::for_day(monday(), &rules);

    let mut recipe = crate::catalog::test_recipe("stew", "slow_cooked", 120);
    recipe.base_score = Some(6.5);
    assert_eq!(scorer.score(&recipe, None, &context, monday()), 6.5);
}

#[test]
fn suggestions_are_sorted_and_sized() {
    use crate::catalog::test_recipe;

    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let catalog = catalog(vec![
        test_recipe("a", "quick", 10),
        test_recipe("b", "stew", 90),
        test_recipe("c", "dessert", 40),
        test_recipe("d", "salad", 15),
    ]);
    let prefs: HashMap<_, _> = [preference("b", 4, 0), preference("c", 0, 2)].into();

    let suggestions = scorer.suggest(&catalog, &prefs, monday(), 3, false);
    assert_eq!(suggestions.len(), 3);
    assert!(suggestions.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(suggestions[0].id.as_str(), "b");

    let all = scorer.suggest(&catalog, &prefs, monday(), 10, false);
    assert_eq!(all.len(), 4);
    assert_eq!(all.last().unwrap().id.as_str(), "c");
}

#[test]
fn type_cap_makes_room_for_variety() {
    use crate::catalog::test_recipe;

    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let catalog = catalog(vec![
        test_recipe("quick_1", "quick", 10),
        test_recipe("quick_2", "quick", 10),
        test_recipe("quick_3", "quick", 10),
        test_recipe("stew", "stew", 120),
    ]);

    let suggestions = scorer.suggest(&catalog, &HashMap::new(), monday(), 3, false);
    let ids: Vec<_> = suggestions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["quick_1", "quick_2", "stew"]);
    // quick recipes: 3 (type) + 2 (time) + 1 (variety); the stew only gets its variety bonus.
    let scores: Vec<_> = suggestions.iter().map(|s| s.score).collect();
    assert_eq!(scores, vec![6.0, 6.0, 1.0]);
}

#[test]
fn backfill_ignores_caps_when_short() {
    use crate::catalog::test_recipe;

    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let catalog = catalog(vec![
        test_recipe("quick_1", "quick", 10),
        test_recipe("quick_2", "quick", 10),
        test_recipe("quick_3", "quick", 10),
    ]);

    let suggestions = scorer.suggest(&catalog, &HashMap::new(), monday(), 3, false);
    let ids: Vec<_> = suggestions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["quick_1", "quick_2", "quick_3"]);
    assert_eq!(suggestions[2].score, 5.0);
}

#[test]
fn cuisine_cap_is_optional() {
    use crate::catalog::test_recipe;

    let weights = ScoringWeights::default();
    let mut rules = SuggestionRules::default();
    let italian = |id: &str, recipe_type: &str| {
        let mut r = test_recipe(id, recipe_type, 10);
        r.cuisine = "italian".into();
        r
    };
    let catalog = catalog(vec![
        italian("pasta", "quick"),
        italian("pizza", "oven"),
        test_recipe("soup", "soup", 60),
    ]);

    let uncapped = Scorer::new(&weights, &rules).suggest(&catalog, &HashMap::new(), monday(), 2, false);
    let ids: Vec<_> = uncapped.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["pasta", "pizza"]);

    rules.max_per_cuisine = Some(1);
    let capped = Scorer::new(&weights, &rules).suggest(&catalog, &HashMap::new(), monday(), 2, false);
    let ids: Vec<_> = capped.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["pasta", "soup"]);
}

#[test]
fn ties_are_deterministic() {
    use crate::catalog::test_recipe;

    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let catalog = catalog(vec![
        test_recipe("first", "a", 10),
        test_recipe("second", "b", 10),
        test_recipe("third", "c", 10),
    ]);

    let once = scorer.suggest(&catalog, &HashMap::new(), monday(), 2, false);
    let again = scorer.suggest(&catalog, &HashMap::new(), monday(), 2, false);
    assert_eq!(once, again);
}

#[test]
fn empty_catalog_falls_back() {
    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);

    let suggestions = scorer.suggest(&Catalog::default(), &HashMap::new(), monday(), 5, false);
    assert_eq!(suggestions, vec![Suggestion::fallback()]);
}

#[test]
fn force_new_skips_recent_recipes() {
    use crate::catalog::test_recipe;

    let weights = ScoringWeights::default();
    let rules = SuggestionRules::default();
    let scorer = Scorer::new(&weights, &rules);
    let catalog = catalog(vec![test_recipe("old", "a", 10), test_recipe("recent", "b", 10)]);

    let (_, mut recent) = preference("recent", 10, 0);
    recent.last_suggested = Some(monday() - chrono::Days::new(2));
    let prefs: HashMap<_, _> = [(RecipeId::from("recent"), recent)].into();

    let usual = scorer.suggest(&catalog, &prefs, monday(), 1, false);
    assert_eq!(usual[0].id.as_str(), "recent");

    let fresh = scorer.suggest(&catalog, &prefs, monday(), 1, true);
    assert_eq!(fresh[0].id.as_str(), "old");

    // Everything recent: fall back to the whole catalog rather than suggesting nothing.
    let only_recent = self::catalog(vec![test_recipe("recent", "b", 10)]);
    let fallback = scorer.suggest(&only_recent, &prefs, monday(), 1, true);
    assert_eq!(fallback[0].id.as_str(), "recent");
}
