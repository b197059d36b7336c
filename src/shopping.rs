// Copyright 2023 Remi Bernotavicius

use crate::catalog::{Catalog, IngredientRequirement, Recipe};
use crate::config::ShoppingRules;
use crate::database::models::{RecipeId, StockItem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// How a unit's quantities get rounded for display.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnitClass {
    /// Things you count: pieces, cloves, leaves.
    Count,
    /// Spoon measures, kept to one decimal.
    SmallMeasure,
    /// Mass and volume, kept to whole units.
    Bulk,
}

impl UnitClass {
    pub fn of(unit: &str) -> Self {
        match unit.trim().to_lowercase().as_str() {
            "piece" | "pieces" | "clove" | "cloves" | "leaf" | "leaves" | "pièce" | "pièces"
            | "gousse" | "gousses" | "feuilles" => Self::Count,
            "tbsp" | "tsp" | "tbsp." | "tsp." | "c.s." | "c.c." => Self::SmallMeasure,
            _ => Self::Bulk,
        }
    }

    pub fn round(self, quantity: f64) -> f64 {
        match self {
            Self::Count => quantity.round().max(1.0),
            Self::SmallMeasure => (quantity * 10.0).round() / 10.0,
            Self::Bulk => quantity.round(),
        }
    }

    pub fn render(self, quantity: f64, unit: &str) -> String {
        let quantity = self.round(quantity);
        match self {
            Self::Count | Self::SmallMeasure => format!("{quantity} {unit}"),
            Self::Bulk => format!("{quantity}{unit}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledIngredient {
    pub name: String,
    pub quantity: f64,
    pub display: String,
    pub unit: String,
    pub aisle: String,
    pub mandatory: bool,
}

impl ScaledIngredient {
    fn new(name: &str, raw_quantity: f64, requirement: &IngredientRequirement) -> Self {
        let class = UnitClass::of(&requirement.unit);
        Self {
            name: name.into(),
            quantity: class.round(raw_quantity),
            display: class.render(raw_quantity, &requirement.unit),
            unit: requirement.unit.clone(),
            aisle: requirement.aisle.clone(),
            mandatory: requirement.mandatory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledRecipe {
    pub id: RecipeId,
    pub name: String,
    pub diners: f64,
    pub ingredients: Vec<ScaledIngredient>,
}

fn scale_factor(recipe: &Recipe, diners: f64) -> f64 {
    diners / f64::from(recipe.portions)
}

/// What the household already has, by ingredient name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockSnapshot {
    in_stock: BTreeMap<String, bool>,
    tracked: BTreeSet<String>,
}

impl StockSnapshot {
    pub fn from_stock(items: &[StockItem]) -> Self {
        Self {
            in_stock: items
                .iter()
                .map(|i| (i.ingredient.clone(), i.level.is_sufficient()))
                .collect(),
            tracked: items.iter().map(|i| i.ingredient.clone()).collect(),
        }
    }

    /// Flags given by the caller win over what the stock table says.
    pub fn with_overrides(mut self, overrides: BTreeMap<String, bool>) -> Self {
        self.in_stock.extend(overrides);
        self
    }

    pub fn is_in_stock(&self, ingredient: &str) -> bool {
        self.in_stock.get(ingredient).copied().unwrap_or(false)
    }

    fn status(&self, ingredient: &str) -> ItemStatus {
        if self.tracked.contains(ingredient) {
            ItemStatus::LowStock
        } else {
            ItemStatus::Missing
        }
    }

    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.in_stock
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Missing,
    LowStock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub name: String,
    pub quantity: f64,
    pub display: String,
    pub mandatory: bool,
    pub status: ItemStatus,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AisleGroup {
    pub aisle: String,
    pub items: Vec<ShoppingItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub recipes: Vec<String>,
    pub diners: f64,
    pub aisles: Vec<AisleGroup>,
    pub item_count: usize,
    pub total_cost: f64,
    pub stock_used: BTreeMap<String, bool>,
    pub in_stock: Vec<String>,
}

impl ShoppingList {
    pub fn items(&self) -> impl Iterator<Item = &ShoppingItem> {
        self.aisles.iter().flat_map(|a| &a.items)
    }

    #[cfg(test)]
    pub fn item(&self, name: &str) -> Option<&ShoppingItem> {
        self.items().find(|i| i.name == name)
    }
}

/// Renders the list as a plain message that can be pasted into a chat.
impl fmt::Display for ShoppingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SHOPPING LIST")?;
        if !self.recipes.is_empty() {
            writeln!(f, "Recipes: {}", self.recipes.join(", "))?;
        }
        writeln!(f, "Diners: {}", self.diners)?;
        for group in &self.aisles {
            writeln!(f)?;
            writeln!(f, "{}", group.aisle)?;
            for item in &group.items {
                write!(f, "• {} ({})", item.name, item.display)?;
                if !item.mandatory {
                    write!(f, " optional")?;
                }
                writeln!(f)?;
            }
        }
        writeln!(f)?;
        write!(
            f,
            "Total: {} items, estimated {:.2}",
            self.item_count, self.total_cost
        )
    }
}

struct MergedIngredient<'c> {
    quantity: f64,
    requirement: &'c IngredientRequirement,
    aisle: &'c str,
    mandatory: bool,
}

pub struct ListBuilder<'a> {
    catalog: &'a Catalog,
    rules: &'a ShoppingRules,
}

impl<'a> ListBuilder<'a> {
    pub fn new(catalog: &'a Catalog, rules: &'a ShoppingRules) -> Self {
        Self { catalog, rules }
    }

    pub fn scale_recipe(&self, recipe: &Recipe, diners: f64) -> ScaledRecipe {
        let factor = scale_factor(recipe, diners);
        ScaledRecipe {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            diners,
            ingredients: recipe
                .ingredients
                .iter()
                .map(|(name, req)| ScaledIngredient::new(name, req.quantity * factor, req))
                .collect(),
        }
    }

    fn aisle_rank(&self, aisle: &str) -> Option<usize> {
        self.rules
            .aisle_order
            .iter()
            .position(|a| a.eq_ignore_ascii_case(aisle))
    }

    /// The store layout's spelling of an aisle, or the aisle as given when the layout lacks it.
    fn canonical_aisle<'s>(&'s self, aisle: &'s str) -> &'s str {
        match self.aisle_rank(aisle) {
            Some(rank) => &self.rules.aisle_order[rank],
            None => aisle,
        }
    }

    /// Where an ingredient listed in several aisles gets shelved: earliest in the store layout,
    /// then alphabetically.
    fn preferred_aisle<'s>(&self, a: &'s str, b: &'s str) -> &'s str {
        let key = |aisle: &str| (self.aisle_rank(aisle).unwrap_or(usize::MAX), aisle.to_owned());
        if key(b) < key(a) {
            b
        } else {
            a
        }
    }

    pub fn build(
        &self,
        recipe_ids: &[RecipeId],
        diners: f64,
        stock: &StockSnapshot,
    ) -> ShoppingList {
        let mut recipe_names = vec![];
        // Keyed by unit as well, quantities in different units are never added together.
        let mut merged: BTreeMap<(&str, &str), MergedIngredient> = BTreeMap::new();

        for id in recipe_ids {
            let Some(recipe) = self.catalog.get(id) else {
                log::warn!("skipping unknown recipe {id:?}");
                continue;
            };
            recipe_names.push(recipe.name.clone());

            let factor = scale_factor(recipe, diners);
            for (name, requirement) in &recipe.ingredients {
                let scaled = requirement.quantity * factor;
                let aisle = self.canonical_aisle(&requirement.aisle);
                merged
                    .entry((name.as_str(), requirement.unit.as_str()))
                    .and_modify(|m| {
                        m.quantity += scaled;
                        m.mandatory |= requirement.mandatory;
                        m.aisle = self.preferred_aisle(m.aisle, aisle);
                    })
                    .or_insert(MergedIngredient {
                        quantity: scaled,
                        requirement,
                        aisle,
                        mandatory: requirement.mandatory,
                    });
            }
        }

        let mut by_aisle: BTreeMap<&str, Vec<ShoppingItem>> = BTreeMap::new();
        let mut aisles_seen: Vec<&str> = vec![];
        let mut in_stock = BTreeSet::new();
        let mut total_cost = 0.0;
        for ((name, _), m) in merged {
            if stock.is_in_stock(name) {
                in_stock.insert(name.to_owned());
                continue;
            }
            let price = self.catalog.price(name).unwrap_or_else(|| {
                log::debug!("no price for {name:?}, assuming {}", self.rules.default_price);
                self.rules.default_price
            });
            total_cost += price;

            if !aisles_seen.contains(&m.aisle) {
                aisles_seen.push(m.aisle);
            }
            let scaled = ScaledIngredient::new(name, m.quantity, m.requirement);
            by_aisle.entry(m.aisle).or_default().push(ShoppingItem {
                name: scaled.name,
                quantity: scaled.quantity,
                display: scaled.display,
                mandatory: m.mandatory,
                status: stock.status(name),
                price,
            });
        }

        // Canonical aisles first, the rest in the order their first item comes up by name. Items
        // are already sorted by name because they came out of a BTreeMap.
        let (mut known, unknown): (Vec<&str>, Vec<&str>) = aisles_seen
            .into_iter()
            .partition(|a| self.aisle_rank(a).is_some());
        known.sort_by_key(|a| self.aisle_rank(a));

        let aisles: Vec<AisleGroup> = known
            .into_iter()
            .chain(unknown)
            .filter_map(|aisle| {
                by_aisle.remove(aisle).map(|items| AisleGroup {
                    aisle: aisle.into(),
                    items,
                })
            })
            .collect();

        let mut list = ShoppingList {
            recipes: recipe_names,
            diners,
            aisles,
            item_count: 0,
            total_cost: (total_cost * 100.0).round() / 100.0,
            stock_used: stock.flags().clone(),
            in_stock: in_stock.into_iter().collect(),
        };
        list.item_count = list.items().count();
        list
    }
}

#[cfg(test)]
fn ingredient(quantity: f64, unit: &str, aisle: &str) -> IngredientRequirement {
    IngredientRequirement {
        quantity,
        unit: unit.into(),
        aisle: aisle.into(),
        mandatory: true,
    }
}

#[cfg(test)]
fn recipe_with(
    id: &str,
    portions: u32,
    ingredients: BTreeMap<String, IngredientRequirement>,
) -> Recipe {
    let mut recipe = crate::catalog::test_recipe(id, "quick", 10);
    recipe.portions = portions;
    recipe.ingredients = ingredients;
    recipe
}

#[cfg(test)]
fn egg_catalog() -> Catalog {
    use maplit::{btreemap, hashmap};

    Catalog::new(
        vec![
            recipe_with(
                "a",
                4,
                btreemap! {
                    "Eggs".into() => ingredient(3.0, "pieces", "Dairy"),
                    "Onions".into() => ingredient(2.0, "pieces", "Produce"),
                    "Flour".into() => ingredient(250.0, "g", "Pantry"),
                },
            ),
            recipe_with(
                "b",
                2,
                btreemap! {
                    "Eggs".into() => ingredient(2.0, "pieces", "Dairy"),
                    "Butter".into() => ingredient(1.5, "tbsp", "Dairy"),
                    "Nori".into() => ingredient(3.0, "sheets", "Sushi Corner"),
                },
            ),
        ],
        hashmap! {
            "Eggs".into() => 4.2,
            "Onions".into() => 1.55,
        },
    )
    .unwrap()
}

#[test]
fn unit_rounding() {
    assert_eq!(UnitClass::of("pieces"), UnitClass::Count);
    assert_eq!(UnitClass::of("gousses"), UnitClass::Count);
    assert_eq!(UnitClass::of("c.s."), UnitClass::SmallMeasure);
    assert_eq!(UnitClass::of("g"), UnitClass::Bulk);

    assert_eq!(UnitClass::Count.render(1.5, "pieces"), "2 pieces");
    assert_eq!(UnitClass::Count.render(0.2, "cloves"), "1 cloves");
    assert_eq!(UnitClass::SmallMeasure.render(0.625, "tsp"), "0.6 tsp");
    assert_eq!(UnitClass::Bulk.render(187.5, "g"), "188g");
    assert_eq!(UnitClass::Bulk.render(62.4, "ml"), "62ml");
}

#[test]
fn scaling_one_recipe() {
    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let scaled = builder.scale_recipe(catalog.get(&"a".into()).unwrap(), 2.0);
    let eggs = scaled.ingredients.iter().find(|i| i.name == "Eggs").unwrap();
    assert_eq!(eggs.quantity, 2.0);
    assert_eq!(eggs.display, "2 pieces");
    let flour = scaled.ingredients.iter().find(|i| i.name == "Flour").unwrap();
    assert_eq!(flour.display, "125g");
}

#[test]
fn shared_ingredients_are_summed_before_rounding() {
    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let list = builder.build(&["a".into(), "b".into()], 2.0, &StockSnapshot::default());
    let eggs: Vec<_> = list.items().filter(|i| i.name == "Eggs").collect();
    assert_eq!(eggs.len(), 1);
    // 3 * 2/4 + 2 * 2/2 = 3.5
    assert_eq!(eggs[0].quantity, 4.0);
    assert_eq!(eggs[0].display, "4 pieces");
    assert_eq!(list.recipes, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(list.item_count, 5);
}

#[test]
fn aisles_follow_the_store_layout() {
    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let list = builder.build(&["b".into(), "a".into()], 2.0, &StockSnapshot::default());
    let aisles: Vec<_> = list.aisles.iter().map(|a| a.aisle.as_str()).collect();
    assert_eq!(aisles, vec!["Produce", "Dairy", "Pantry", "Sushi Corner"]);

    let dairy: Vec<_> = list.aisles[1].items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(dairy, vec!["Butter", "Eggs"]);
}

#[test]
fn stocked_ingredients_are_left_out() {
    use maplit::btreemap;

    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let stock = StockSnapshot::default().with_overrides(btreemap! {
        "Eggs".into() => true,
        "Onions".into() => false,
    });
    let list = builder.build(&["a".into(), "b".into(), "a".into()], 2.0, &stock);
    assert!(list.item("Eggs").is_none());
    assert!(list.item("Onions").is_some());
    assert_eq!(list.in_stock, vec!["Eggs".to_string()]);
    assert_eq!(list.stock_used.len(), 2);
}

#[test]
fn stock_table_decides_status() {
    use crate::database::models::StockLevel;

    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let item = |name: &str, level| StockItem {
        ingredient: name.into(),
        quantity: 1.0,
        unit: "pieces".into(),
        purchase_date: None,
        expiry_date: None,
        level,
    };
    let stock = StockSnapshot::from_stock(&[
        item("Eggs", StockLevel::High),
        item("Onions", StockLevel::Low),
    ]);

    let list = builder.build(&["a".into()], 4.0, &stock);
    assert!(list.item("Eggs").is_none());
    assert_eq!(list.item("Onions").unwrap().status, ItemStatus::LowStock);
    assert_eq!(list.item("Flour").unwrap().status, ItemStatus::Missing);
}

#[test]
fn cost_uses_prices_and_a_default() {
    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let list = builder.build(&["a".into()], 4.0, &StockSnapshot::default());
    // Eggs 4.20 + Onions 1.55 + Flour at the default 3.00
    assert_eq!(list.total_cost, 8.75);
    assert_eq!(list.item("Flour").unwrap().price, 3.0);
}

#[test]
fn recipe_order_does_not_matter() {
    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let forward = builder.build(&["a".into(), "b".into()], 3.0, &StockSnapshot::default());
    let backward = builder.build(&["b".into(), "a".into()], 3.0, &StockSnapshot::default());
    assert_eq!(forward.aisles, backward.aisles);
    assert_eq!(forward.total_cost, backward.total_cost);
}

#[test]
fn conflicting_units_and_aisles_merge_the_same_either_way() {
    use maplit::{btreemap, hashmap};

    let catalog = Catalog::new(
        vec![
            recipe_with(
                "a",
                2,
                btreemap! {
                    "Butter".into() => ingredient(1.25, "tbsp", "Dairy"),
                    "Onions".into() => ingredient(1.0, "pieces", "produce"),
                    "Cream".into() => ingredient(100.0, "ml", "Chilled"),
                },
            ),
            recipe_with(
                "b",
                2,
                btreemap! {
                    "Butter".into() => ingredient(100.0, "g", "Baking"),
                    "Onions".into() => ingredient(2.0, "pieces", "Produce"),
                    "Cream".into() => ingredient(50.0, "ml", "Dairy"),
                },
            ),
        ],
        hashmap! {},
    )
    .unwrap();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let ab = builder.build(&["a".into(), "b".into()], 2.0, &StockSnapshot::default());
    let ba = builder.build(&["b".into(), "a".into()], 2.0, &StockSnapshot::default());
    assert_eq!(ab.aisles, ba.aisles);
    assert_eq!(ab.total_cost, ba.total_cost);

    let aisles: Vec<_> = ab.aisles.iter().map(|a| a.aisle.as_str()).collect();
    assert_eq!(aisles, vec!["Produce", "Dairy", "Baking"]);

    let displays = |group: &AisleGroup| -> Vec<String> {
        group
            .items
            .iter()
            .map(|i| format!("{} {}", i.name, i.display))
            .collect()
    };
    assert_eq!(displays(&ab.aisles[0]), vec!["Onions 3 pieces"]);
    // Tablespoons and grams of butter stay apart, cream lands in the aisle the layout knows.
    assert_eq!(displays(&ab.aisles[1]), vec!["Butter 1.3 tbsp", "Cream 150ml"]);
    assert_eq!(displays(&ab.aisles[2]), vec!["Butter 100g"]);
    assert_eq!(ab.item_count, 4);
}

#[test]
fn unknown_recipes_are_skipped() {
    let catalog = egg_catalog();
    let rules = ShoppingRules::default();
    let builder = ListBuilder::new(&catalog, &rules);

    let list = builder.build(&["nope".into(), "a".into()], 4.0, &StockSnapshot::default());
    assert_eq!(list.recipes, vec!["a".to_string()]);
    assert_eq!(list.item_count, 3);

    let empty = builder.build(&["nope".into()], 4.0, &StockSnapshot::default());
    assert_eq!(empty.item_count, 0);
    assert_eq!(empty.total_cost, 0.0);
    assert!(empty.aisles.is_empty());
}

#[test]
fn list_renders_as_a_message() {
    use maplit::{btreemap, hashmap};

    let mut pepper = ingredient(0.25, "tsp", "Spices");
    pepper.mandatory = false;
    let catalog = Catalog::new(
        vec![recipe_with(
            "salad",
            2,
            btreemap! {
                "Tomatoes".into() => ingredient(2.0, "pieces", "Produce"),
                "Pepper".into() => pepper,
            },
        )],
        hashmap! { "Tomatoes".into() => 2.5, "Pepper".into() => 1.0 },
    )
    .unwrap();
    let rules = ShoppingRules::default();
    let list = ListBuilder::new(&catalog, &rules).build(&["salad".into()], 2.0, &StockSnapshot::default());

    assert_eq!(
        list.to_string(),
        "SHOPPING LIST\n\
         Recipes: salad\n\
         Diners: 2\n\
         \n\
         Produce\n\
         • Tomatoes (2 pieces)\n\
         \n\
         Spices\n\
         • Pepper (0.3 tsp) optional\n\
         \n\
         Total: 2 items, estimated 3.50"
    );
}
