// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use database::models::{RecipeId, StockLevel};
use planner::{Planner, StockUpdate, SystemClock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use store::{Decision, SqliteStore};

mod catalog;
mod config;
mod database;
mod planner;
mod scorer;
mod shopping;
mod store;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
struct Args {
    /// Directory holding the database, the catalog and the configuration.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Recipe catalog to use instead of the one in the data directory.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Suggest recipes for today.
    Suggest {
        #[arg(long, short = 'n')]
        count: Option<usize>,
        /// Leave out recipes suggested or cooked recently.
        #[arg(long)]
        force_new: bool,
    },
    /// Record whether a suggestion was taken.
    Feedback {
        recipe_id: String,
        #[arg(value_enum)]
        decision: Decision,
    },
    /// Record that a recipe was cooked today.
    Prepared { recipe_id: String },
    Recipes,
    /// Show a recipe's ingredients scaled to a number of diners.
    Ingredients {
        recipe_id: String,
        #[arg(long)]
        diners: Option<f64>,
    },
    /// Build a shopping list for some recipes.
    List {
        #[arg(required = true)]
        recipes: Vec<String>,
        #[arg(long)]
        diners: Option<f64>,
        /// An ingredient already in the cupboard, whatever the stock says.
        #[arg(long = "have")]
        in_stock: Vec<String>,
        /// An ingredient to buy, whatever the stock says.
        #[arg(long = "need")]
        not_in_stock: Vec<String>,
    },
    Stock,
    SetStock {
        ingredient: String,
        quantity: f64,
        unit: String,
        #[arg(value_enum)]
        level: StockLevel,
        #[arg(long)]
        expiry: Option<chrono::NaiveDate>,
    },
    /// Show past shopping lists, newest first.
    History {
        #[arg(long)]
        limit: Option<u32>,
    },
}

/// This is where the database and other user-data lives on-disk. On Linux it should be like:
/// `~/.local/share/grocery_planner/`
fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new().ok_or("failed to get user home directory")?;
    let path = dirs.data_dir().join("grocery_planner");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn run(mut planner: Planner<SqliteStore>, commands: Commands, json: bool) -> Result<()> {
    match commands {
        Commands::Suggest { count, force_new } => {
            let suggestions = planner.suggest(count, force_new)?;
            emit(json, &suggestions, |suggestions| {
                for s in suggestions {
                    println!(
                        "{:<24} {:<36} {:>4} min  {:<6} {:>5.1}",
                        s.id.to_string(),
                        s.name,
                        s.prep_time,
                        s.difficulty.to_string(),
                        s.score
                    );
                }
            })?;
        }
        Commands::Feedback {
            recipe_id,
            decision,
        } => {
            let updated = planner.record_feedback(&RecipeId::new(recipe_id), decision)?;
            emit(json, &serde_json::json!({ "updated": updated }), |_| {
                if !updated {
                    println!("unknown recipe, nothing recorded");
                }
            })?;
        }
        Commands::Prepared { recipe_id } => {
            let updated = planner.mark_prepared(&RecipeId::new(recipe_id))?;
            emit(json, &serde_json::json!({ "updated": updated }), |_| {
                if !updated {
                    println!("unknown recipe, nothing recorded");
                }
            })?;
        }
        Commands::Recipes => {
            emit(json, &planner.recipes(), |recipes| {
                for r in recipes.iter() {
                    println!(
                        "{:<24} {:<36} {:<12} {:>4} min  serves {}",
                        r.id.to_string(),
                        r.name,
                        r.recipe_type,
                        r.total_time(),
                        r.portions
                    );
                }
            })?;
        }
        Commands::Ingredients { recipe_id, diners } => {
            let scaled = planner.recipe_ingredients(&RecipeId::new(recipe_id), diners)?;
            emit(json, &scaled, |scaled| match scaled {
                Some(recipe) => {
                    println!("{} for {}", recipe.name, recipe.diners);
                    for i in &recipe.ingredients {
                        println!("  {:<24} {:<12} {}", i.name, i.display, i.aisle);
                    }
                }
                None => println!("unknown recipe"),
            })?;
        }
        Commands::List {
            recipes,
            diners,
            in_stock,
            not_in_stock,
        } => {
            let recipe_ids: Vec<_> = recipes.into_iter().map(RecipeId::new).collect();
            let overrides: BTreeMap<String, bool> = in_stock
                .into_iter()
                .map(|i| (i, true))
                .chain(not_in_stock.into_iter().map(|i| (i, false)))
                .collect();
            let list = planner.build_shopping_list(&recipe_ids, diners, overrides)?;
            emit(json, &list, |list| println!("{list}"))?;
        }
        Commands::Stock => {
            emit(json, &planner.get_stock()?, |stock| {
                for s in stock {
                    let expiry = s.expiry_date.map(|d| d.to_string()).unwrap_or_default();
                    println!(
                        "{:<24} {:>8} {:<8} {:<6} {}",
                        s.ingredient,
                        s.quantity,
                        s.unit,
                        s.level.to_string(),
                        expiry
                    );
                }
            })?;
        }
        Commands::SetStock {
            ingredient,
            quantity,
            unit,
            level,
            expiry,
        } => {
            planner.set_stock(vec![StockUpdate {
                ingredient,
                quantity,
                unit,
                level,
                expiry_date: expiry,
            }])?;
        }
        Commands::History { limit } => {
            emit(json, &planner.get_history(limit)?, |history| {
                for entry in history {
                    println!(
                        "{}  {:>7.2}  {}",
                        entry.date,
                        entry.total_cost,
                        entry.list.recipes.join(", ")
                    );
                }
            })?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()?;

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => data_path()?,
    };
    let config = config::Config::load(data_dir.join("config.json"))?;
    let catalog = catalog::Catalog::from_path(
        args.catalog
            .unwrap_or_else(|| data_dir.join("catalog.json")),
    )?;
    if catalog.is_empty() {
        log::warn!("the catalog has no recipes");
    }
    let store = SqliteStore::open(data_dir.join("data.sqlite"))?;

    run(
        Planner::new(catalog, config, store, SystemClock),
        args.commands,
        args.json,
    )
}
