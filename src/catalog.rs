// Copyright 2023 Remi Bernotavicius

use crate::database::models::RecipeId;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed catalog: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("recipe {0:?} appears more than once in the catalog")]
    DuplicateRecipe(RecipeId),
    #[error("recipe {0:?} serves zero portions")]
    ZeroPortions(RecipeId),
}

type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Display, Hash, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[display("easy")]
    Easy,
    #[display("medium")]
    Medium,
    #[display("hard")]
    Hard,
}

/// How often the household cooks a recipe, as declared in the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    VeryFrequent,
    Frequent,
    Occasional,
    Weekend,
}

impl Frequency {
    pub const UNDECLARED_WEIGHT: i32 = 5;

    pub fn weight(self) -> i32 {
        match self {
            Self::VeryFrequent => 10,
            Self::Frequent => 7,
            Self::Occasional => 3,
            Self::Weekend => 2,
        }
    }
}

fn mandatory_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub quantity: f64,
    pub unit: String,
    pub aisle: String,
    #[serde(default = "mandatory_by_default")]
    pub mandatory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    /// Minutes of hands-on preparation.
    pub prep_time: u32,
    #[serde(default)]
    pub cook_time: u32,
    pub difficulty: Difficulty,
    /// How many people the ingredient quantities feed.
    pub portions: u32,
    #[serde(rename = "type")]
    pub recipe_type: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub base_score: Option<f64>,
    #[serde(default)]
    pub ingredients: BTreeMap<String, IngredientRequirement>,
}

impl Recipe {
    pub fn total_time(&self) -> u32 {
        self.prep_time + self.cook_time
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn frequency_weight(&self) -> i32 {
        self.frequency
            .map(Frequency::weight)
            .unwrap_or(Frequency::UNDECLARED_WEIGHT)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    recipes: Vec<Recipe>,
    #[serde(default)]
    prices: HashMap<String, f64>,
}

/// The read-only set of recipes the planner knows about, plus what their ingredients cost.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: Vec<Recipe>,
    index: HashMap<RecipeId, usize>,
    prices: HashMap<String, f64>,
}

impl Catalog {
    pub fn new(recipes: Vec<Recipe>, prices: HashMap<String, f64>) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, recipe) in recipes.iter().enumerate() {
            if recipe.portions == 0 {
                return Err(CatalogError::ZeroPortions(recipe.id.clone()));
            }
            if index.insert(recipe.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateRecipe(recipe.id.clone()));
            }
        }
        Ok(Self {
            recipes,
            index,
            prices,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.recipes, file.prices)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_owned(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        log::info!(
            "loaded {} recipes and {} prices from {}",
            catalog.recipes.len(),
            catalog.prices.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &RecipeId) -> Option<&Recipe> {
        self.index.get(id).map(|&i| &self.recipes[i])
    }

    pub fn price(&self, ingredient: &str) -> Option<f64> {
        self.prices.get(ingredient).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
pub fn test_recipe(id: &str, recipe_type: &str, prep_time: u32) -> Recipe {
    Recipe {
        id: id.into(),
        name: id.replace('_', " "),
        prep_time,
        cook_time: 0,
        difficulty: Difficulty::Easy,
        portions: 4,
        recipe_type: recipe_type.into(),
        cuisine: String::new(),
        tags: vec![],
        description: None,
        frequency: None,
        base_score: None,
        ingredients: BTreeMap::new(),
    }
}

#[cfg(test)]
pub const SAMPLE_CATALOG: &str = include_str!("../data/catalog.json");

#[test]
fn sample_catalog_loads() {
    let catalog = Catalog::from_json(SAMPLE_CATALOG).unwrap();
    assert_eq!(catalog.recipes().len(), 10);

    let carbonara = catalog.get(&"pasta_carbonara".into()).unwrap();
    assert_eq!(carbonara.difficulty, Difficulty::Easy);
    assert_eq!(carbonara.total_time(), 25);
    assert!(carbonara.has_tag("family_friendly"));
    assert!(carbonara.ingredients["Eggs"].mandatory);
    assert!(!carbonara.ingredients["Black pepper"].mandatory);

    assert_eq!(catalog.price("Spaghetti"), Some(1.8));
    assert_eq!(catalog.price("Unobtainium"), None);
}

#[test]
fn frequency_weights() {
    let catalog = Catalog::from_json(SAMPLE_CATALOG).unwrap();
    let weight = |id: &str| catalog.get(&id.into()).unwrap().frequency_weight();
    assert_eq!(weight("pasta_carbonara"), 10);
    assert_eq!(weight("chicken_curry"), 7);
    assert_eq!(weight("salmon_lemon"), 3);
    assert_eq!(weight("roast_chicken"), 2);
    assert_eq!(weight("apple_tart"), Frequency::UNDECLARED_WEIGHT);
}

#[test]
fn duplicate_recipe_is_rejected() {
    let recipes = vec![test_recipe("soup", "quick", 10), test_recipe("soup", "quick", 20)];
    let error = Catalog::new(recipes, HashMap::new()).unwrap_err();
    assert!(matches!(error, CatalogError::DuplicateRecipe(id) if id.as_str() == "soup"));
}

#[test]
fn zero_portions_is_rejected() {
    let mut recipe = test_recipe("soup", "quick", 10);
    recipe.portions = 0;
    let error = Catalog::new(vec![recipe], HashMap::new()).unwrap_err();
    assert!(matches!(error, CatalogError::ZeroPortions(_)));
}

#[test]
fn malformed_catalog_is_rejected() {
    let error = Catalog::from_json("{\"recipes\": [{\"id\": 3}]}").unwrap_err();
    assert!(matches!(error, CatalogError::Malformed(_)));
}

#[test]
fn missing_catalog_file_is_reported() {
    let error = Catalog::from_path("/nonexistent/catalog.json").unwrap_err();
    assert!(matches!(error, CatalogError::Read { .. }));
}
