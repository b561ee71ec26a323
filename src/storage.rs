//! SQLite storage layer for mealwise.
//!
//! # Conventions
//!
//! - Timestamps are unix seconds (`INTEGER`), dates are ISO `TEXT`.
//! - List-valued recipe and interaction fields are JSON text.
//! - Foreign keys are enforced; user-owned rows cascade with their user.
//!
//! # Health data
//!
//! Profile tables hold allergies, health conditions and body measurements.
//! Nothing in this module logs row contents.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SubsecRound, TimeZone, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, Transaction};

use crate::aggregation::recompute_recipe_rating;
use crate::error::{AppError, Result};
use crate::model::{
    ActivityLevel, AiRecommendationRecord, Collection, CollectionUpdate, Cuisine, CuisineCount,
    Difficulty, DifficultyBreakdown, FeedbackRequest, FitnessGoal, MealPlan, MealPlanEntry,
    MealPlanEntryUpdate, MealPlanUpdate, NewAiRecommendation, NewCollection, NewInteraction,
    NewMealPlan, NewMealPlanEntry, NewRecipe, NewShoppingList, NewShoppingListItem, NewUser, Page,
    ProfileUpdate, Rating, RatingRequest, Recipe, RecipeStats, RecipeUpdate, ReferenceItem, Region,
    ShoppingList, ShoppingListItem, ShoppingListItemUpdate, ShoppingListUpdate, UnknownVariant,
    UserAccount, UserProfile, UserRecipe, UserRecipeQuery, UserRecipeStatus, UserRecipeUpdate,
    check_plan_dates, round_price,
};
use crate::nutrition::calorie_targets;
use crate::search::{Pagination, RecipeFilter};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        date_of_birth TEXT,
        gender TEXT,
        height REAL,
        weight REAL,
        country TEXT NOT NULL DEFAULT '',
        city TEXT NOT NULL DEFAULT '',
        location TEXT NOT NULL DEFAULT '',
        cooking_level TEXT NOT NULL,
        family_size INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS regions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cuisines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        region_id INTEGER NOT NULL REFERENCES regions(id),
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS allergies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dietary_preferences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS health_conditions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fitness_goals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        target_calories_adjustment INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        activity_level TEXT NOT NULL,
        favorite_cuisines TEXT NOT NULL DEFAULT '[]',
        disliked_ingredients TEXT NOT NULL DEFAULT '[]',
        bmr INTEGER,
        daily_calorie_target INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_allergies (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES allergies(id),
        PRIMARY KEY (user_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_dietary_preferences (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES dietary_preferences(id),
        PRIMARY KEY (user_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_health_conditions (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES health_conditions(id),
        PRIMARY KEY (user_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_fitness_goals (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES fitness_goals(id),
        PRIMARY KEY (user_id, item_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recipes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        cuisine_id INTEGER NOT NULL REFERENCES cuisines(id),
        prep_time INTEGER NOT NULL,
        cook_time INTEGER NOT NULL,
        total_time INTEGER NOT NULL,
        servings INTEGER NOT NULL,
        difficulty TEXT NOT NULL,
        meal_type TEXT NOT NULL,
        ingredients TEXT NOT NULL,
        instructions TEXT NOT NULL,
        calories_per_serving INTEGER,
        tags TEXT NOT NULL DEFAULT '[]',
        dietary_labels TEXT NOT NULL DEFAULT '[]',
        allergen_warnings TEXT NOT NULL DEFAULT '[]',
        created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        is_published INTEGER NOT NULL DEFAULT 1,
        is_featured INTEGER NOT NULL DEFAULT 0,
        average_rating REAL NOT NULL DEFAULT 0,
        total_ratings INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_recipes_rating
    ON recipes(is_published, average_rating DESC, total_ratings DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recipe_ratings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        review TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (recipe_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_recipes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        status TEXT NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        times_cooked INTEGER NOT NULL DEFAULT 0,
        last_cooked INTEGER,
        personal_notes TEXT NOT NULL DEFAULT '',
        modifications TEXT NOT NULL DEFAULT '[]',
        cooking_started_at INTEGER,
        cooking_completed_at INTEGER,
        cooking_duration INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (user_id, recipe_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recipe_collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        is_public INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (user_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collection_recipes (
        collection_id INTEGER NOT NULL REFERENCES recipe_collections(id) ON DELETE CASCADE,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        added_at INTEGER NOT NULL,
        PRIMARY KEY (collection_id, recipe_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS meal_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS meal_plan_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        meal_plan_id INTEGER NOT NULL REFERENCES meal_plans(id) ON DELETE CASCADE,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        meal_type TEXT NOT NULL,
        servings INTEGER NOT NULL DEFAULT 1,
        notes TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        UNIQUE (meal_plan_id, date, meal_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shopping_lists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shopping_list_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        shopping_list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        quantity TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT '',
        is_purchased INTEGER NOT NULL DEFAULT 0,
        estimated_price REAL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_recommendations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        recommendation_type TEXT NOT NULL,
        content TEXT NOT NULL,
        confidence_score REAL NOT NULL,
        user_context TEXT NOT NULL,
        user_rating INTEGER,
        user_feedback TEXT NOT NULL DEFAULT '',
        was_helpful INTEGER,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_interactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        interaction_type TEXT NOT NULL,
        user_input TEXT NOT NULL,
        context_data TEXT NOT NULL,
        ai_model_used TEXT NOT NULL,
        ai_response TEXT NOT NULL,
        is_fallback INTEGER NOT NULL,
        confidence_score REAL NOT NULL,
        processing_time_ms INTEGER NOT NULL,
        tokens_used INTEGER,
        created_at INTEGER NOT NULL
    )
    "#,
];

const REGIONS: &[(&str, &str)] = &[
    ("West Africa", "Nigeria, Ghana, Senegal and neighbours"),
    ("East Africa", "Ethiopia, Kenya, Tanzania and neighbours"),
    ("North Africa", "Morocco, Egypt, Tunisia and neighbours"),
    ("Central Africa", "Cameroon, Congo and neighbours"),
    ("Southern Africa", "South Africa, Zimbabwe and neighbours"),
];

/// (cuisine, region)
const CUISINES: &[(&str, &str)] = &[
    ("Nigerian", "West Africa"),
    ("Ghanaian", "West Africa"),
    ("Senegalese", "West Africa"),
    ("Ethiopian", "East Africa"),
    ("Kenyan", "East Africa"),
    ("Moroccan", "North Africa"),
    ("Egyptian", "North Africa"),
    ("Cameroonian", "Central Africa"),
    ("South African", "Southern Africa"),
];

const ALLERGIES: &[&str] = &[
    "Peanuts",
    "Tree Nuts",
    "Shellfish",
    "Fish",
    "Eggs",
    "Dairy",
    "Soy",
    "Wheat/Gluten",
    "Sesame",
];

const DIETARY_PREFERENCES: &[&str] = &[
    "Vegetarian",
    "Vegan",
    "Pescatarian",
    "Halal",
    "Kosher",
    "Low Carb",
    "Keto",
    "Paleo",
    "Mediterranean",
];

const HEALTH_CONDITIONS: &[&str] = &[
    "Diabetes",
    "Hypertension",
    "Heart Disease",
    "High Cholesterol",
    "Kidney Disease",
    "Liver Disease",
    "Thyroid Issues",
];

/// (goal, daily calorie adjustment)
const FITNESS_GOALS: &[(&str, i64)] = &[
    ("Weight Loss", -500),
    ("Weight Gain", 500),
    ("Muscle Building", 300),
    ("Heart Health", 0),
    ("Diabetes Management", 0),
    ("General Wellness", 0),
    ("Athletic Performance", 300),
];

/// Shared reference lists that profiles link to by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Allergy,
    DietaryPreference,
    HealthCondition,
}

impl ReferenceKind {
    fn table(self) -> &'static str {
        match self {
            ReferenceKind::Allergy => "allergies",
            ReferenceKind::DietaryPreference => "dietary_preferences",
            ReferenceKind::HealthCondition => "health_conditions",
        }
    }

    fn link_table(self) -> &'static str {
        match self {
            ReferenceKind::Allergy => "profile_allergies",
            ReferenceKind::DietaryPreference => "profile_dietary_preferences",
            ReferenceKind::HealthCondition => "profile_health_conditions",
        }
    }
}

const RECIPE_SELECT: &str = r#"
    SELECT r.*, c.name AS cuisine_name, c.region_id AS region_id, g.name AS region_name
    FROM recipes r
    JOIN cuisines c ON c.id = r.cuisine_id
    JOIN regions g ON g.id = c.region_id
"#;

const RECIPE_COUNT: &str = r#"
    SELECT COUNT(*) AS n
    FROM recipes r
    JOIN cuisines c ON c.id = r.cuisine_id
    JOIN regions g ON g.id = c.region_id
"#;

const RATING_SELECT: &str = r#"
    SELECT rr.*, u.username AS username
    FROM recipe_ratings rr
    JOIN users u ON u.id = rr.user_id
"#;

const USER_RECIPE_SELECT: &str = r#"
    SELECT ur.*, r.name AS recipe_name
    FROM user_recipes ur
    JOIN recipes r ON r.id = ur.recipe_id
"#;

const ENTRY_SELECT: &str = r#"
    SELECT e.*, r.name AS recipe_name
    FROM meal_plan_entries e
    JOIN recipes r ON r.id = e.recipe_id
    JOIN meal_plans p ON p.id = e.meal_plan_id
"#;

const ITEM_SELECT: &str = r#"
    SELECT i.*
    FROM shopping_list_items i
    JOIN shopping_lists l ON l.id = i.shopping_list_id
"#;

/// How long a writer waits for the database lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance, initialize the schema and seed
    /// reference data.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:mealwise.db?mode=rwc" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        // Every connection to an in-memory database is a separate database.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            // WAL lets readers run alongside the single writer.
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        let storage = Self { pool };
        storage.initialize_schema().await?;
        storage.seed_reference_data().await?;

        Ok(storage)
    }

    /// Open a write transaction holding the database write lock from its
    /// first statement.
    ///
    /// Two deferred transactions that both read before writing deadlock on
    /// the lock upgrade, and SQLite fails one with `SQLITE_BUSY` at once.
    /// Immediate writers wait for each other on the busy timeout.
    async fn begin_write(&self) -> sqlx::Result<Transaction<'static, Sqlite>> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert the default reference lists. Existing names are left alone.
    async fn seed_reference_data(&self) -> anyhow::Result<()> {
        let mut tx = self.begin_write().await?;

        for (name, description) in REGIONS {
            sqlx::query("INSERT OR IGNORE INTO regions (name, description) VALUES (?, ?)")
                .bind(name)
                .bind(description)
                .execute(&mut *tx)
                .await?;
        }
        for (name, region) in CUISINES {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO cuisines (name, region_id)
                SELECT ?, id FROM regions WHERE name = ?
                "#,
            )
            .bind(name)
            .bind(region)
            .execute(&mut *tx)
            .await?;
        }
        for (kind, names) in [
            (ReferenceKind::Allergy, ALLERGIES),
            (ReferenceKind::DietaryPreference, DIETARY_PREFERENCES),
            (ReferenceKind::HealthCondition, HEALTH_CONDITIONS),
        ] {
            let sql = format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", kind.table());
            for name in names {
                sqlx::query(&sql).bind(name).execute(&mut *tx).await?;
            }
        }
        for (name, adjustment) in FITNESS_GOALS {
            sqlx::query(
                "INSERT OR IGNORE INTO fitness_goals (name, target_calories_adjustment) VALUES (?, ?)",
            )
            .bind(name)
            .bind(adjustment)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Reference data
    // ========================================================================

    pub async fn list_regions(&self) -> Result<Vec<Region>> {
        let rows = sqlx::query("SELECT id, name, description FROM regions ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Region {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    /// List cuisines, optionally restricted to one region.
    pub async fn list_cuisines(&self, region_id: Option<i64>) -> Result<Vec<Cuisine>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.region_id, c.description, g.name AS region_name
            FROM cuisines c
            JOIN regions g ON g.id = c.region_id
            WHERE (?1 IS NULL OR c.region_id = ?1)
            ORDER BY c.name
            "#,
        )
        .bind(region_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Cuisine {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    region_id: row.try_get("region_id")?,
                    region_name: row.try_get("region_name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    pub async fn list_reference_items(&self, kind: ReferenceKind) -> Result<Vec<ReferenceItem>> {
        let sql = format!(
            "SELECT id, name, description FROM {} ORDER BY name",
            kind.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(reference_item_from_row).collect()
    }

    pub async fn list_fitness_goals(&self) -> Result<Vec<FitnessGoal>> {
        let rows = sqlx::query(
            "SELECT id, name, description, target_calories_adjustment FROM fitness_goals ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(fitness_goal_from_row).collect()
    }

    /// Look up a reference entry id by its exact name.
    pub async fn reference_id(&self, kind: ReferenceKind, name: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT id FROM {} WHERE name = ?", kind.table());
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Look up a cuisine id by its exact name.
    pub async fn cuisine_id(&self, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM cuisines WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("id")))
    }

    // ========================================================================
    // Users and profiles
    // ========================================================================

    /// Create an account together with its default profile.
    pub async fn create_user(&self, new: &NewUser) -> Result<UserAccount> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, date_of_birth, gender, height, weight,
                               country, city, location, cooking_level, family_size,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.username)
        .bind(new.email.to_lowercase())
        .bind(new.date_of_birth.map(|d| d.to_string()))
        .bind(new.gender.map(|g| g.as_str()))
        .bind(new.height)
        .bind(new.weight)
        .bind(&new.country)
        .bind(&new.city)
        .bind(&new.location)
        .bind(new.cooking_level.as_str())
        .bind(new.family_size)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, "a user with this email already exists"))?;
        let user_id = result.last_insert_rowid();

        sqlx::query("INSERT INTO user_profiles (user_id, activity_level) VALUES (?, ?)")
            .bind(user_id)
            .bind(ActivityLevel::default().as_str())
            .execute(&mut *tx)
            .await?;

        let account = fetch_user(&mut tx, user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        store_calorie_targets(&mut tx, &account, Utc::now().date_naive()).await?;

        tx.commit().await?;
        Ok(account)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserAccount>> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, user_id).await
    }

    /// Persist account fields and recompute the profile's calorie targets.
    pub async fn update_user(&self, account: &UserAccount, today: NaiveDate) -> Result<UserAccount> {
        let mut tx = self.begin_write().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, date_of_birth = ?, gender = ?, height = ?, weight = ?,
                country = ?, city = ?, location = ?, cooking_level = ?, family_size = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.username)
        .bind(account.date_of_birth.map(|d| d.to_string()))
        .bind(account.gender.map(|g| g.as_str()))
        .bind(account.height)
        .bind(account.weight)
        .bind(&account.country)
        .bind(&account.city)
        .bind(&account.location)
        .bind(account.cooking_level.as_str())
        .bind(account.family_size)
        .bind(Utc::now().timestamp())
        .bind(account.id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user"));
        }

        store_calorie_targets(&mut tx, account, today).await?;
        let updated = fetch_user(&mut tx, account.id)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<UserProfile> {
        let mut conn = self.pool.acquire().await?;
        fetch_profile(&mut conn, user_id).await
    }

    /// Replace the whole profile and recompute its calorie targets.
    ///
    /// Unknown reference ids are rejected with a 400 via the foreign key.
    pub async fn save_profile(
        &self,
        account: &UserAccount,
        update: &ProfileUpdate,
        today: NaiveDate,
    ) -> Result<UserProfile> {
        let mut tx = self.begin_write().await?;

        for cuisine_id in &update.favorite_cuisines {
            let exists = sqlx::query("SELECT 1 FROM cuisines WHERE id = ?")
                .bind(cuisine_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(AppError::BadRequest(format!("unknown cuisine id {cuisine_id}")));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, activity_level, favorite_cuisines, disliked_ingredients)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                activity_level = excluded.activity_level,
                favorite_cuisines = excluded.favorite_cuisines,
                disliked_ingredients = excluded.disliked_ingredients
            "#,
        )
        .bind(account.id)
        .bind(update.activity_level.as_str())
        .bind(encode_json(&update.favorite_cuisines)?)
        .bind(encode_json(&update.disliked_ingredients)?)
        .execute(&mut *tx)
        .await?;

        for (link_table, ids) in [
            ("profile_allergies", &update.allergy_ids),
            ("profile_dietary_preferences", &update.dietary_preference_ids),
            ("profile_health_conditions", &update.health_condition_ids),
            ("profile_fitness_goals", &update.fitness_goal_ids),
        ] {
            replace_links(&mut tx, link_table, account.id, ids).await?;
        }

        store_calorie_targets(&mut tx, account, today).await?;
        let profile = fetch_profile(&mut tx, account.id).await?;

        tx.commit().await?;
        Ok(profile)
    }

    // ========================================================================
    // Recipes
    // ========================================================================

    pub async fn create_recipe(&self, new: &NewRecipe, created_by: Option<i64>) -> Result<Recipe> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO recipes (name, slug, description, cuisine_id, prep_time, cook_time,
                                 total_time, servings, difficulty, meal_type, ingredients,
                                 instructions, calories_per_serving, tags, dietary_labels,
                                 allergen_warnings, created_by, is_published, is_featured,
                                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(new.effective_slug())
        .bind(&new.description)
        .bind(new.cuisine_id)
        .bind(new.prep_time)
        .bind(new.cook_time)
        .bind(new.effective_total_time())
        .bind(new.servings)
        .bind(new.difficulty.as_str())
        .bind(new.meal_type.as_str())
        .bind(encode_json(&new.ingredients)?)
        .bind(encode_json(&new.instructions)?)
        .bind(new.calories_per_serving)
        .bind(encode_json(&new.tags)?)
        .bind(encode_json(&new.dietary_labels)?)
        .bind(encode_json(&new.allergen_warnings)?)
        .bind(created_by)
        .bind(new.is_published)
        .bind(new.is_featured)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_as(e, "a recipe with this slug already exists"))?;

        self.get_recipe(result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("recipe"))
    }

    /// Fetch a recipe whether or not it is published.
    pub async fn get_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        fetch_recipe(&mut conn, recipe_id).await
    }

    /// Edit a recipe the user created, published or not.
    ///
    /// Recipes created by someone else (or seeded without an author) are not
    /// found. An unknown `cuisine_id` is a bad request.
    pub async fn update_recipe(
        &self,
        user_id: i64,
        recipe_id: i64,
        update: RecipeUpdate,
    ) -> Result<Recipe> {
        let mut tx = self.begin_write().await?;

        let mut recipe = fetch_recipe(&mut tx, recipe_id)
            .await?
            .filter(|r| r.created_by == Some(user_id))
            .ok_or(AppError::NotFound("recipe"))?;
        recipe.apply(update);

        sqlx::query(
            r#"
            UPDATE recipes
            SET name = ?, slug = ?, description = ?, cuisine_id = ?, prep_time = ?, cook_time = ?,
                total_time = ?, servings = ?, difficulty = ?, meal_type = ?, ingredients = ?,
                instructions = ?, calories_per_serving = ?, tags = ?, dietary_labels = ?,
                allergen_warnings = ?, is_published = ?, is_featured = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&recipe.name)
        .bind(&recipe.slug)
        .bind(&recipe.description)
        .bind(recipe.cuisine_id)
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.total_time)
        .bind(recipe.servings)
        .bind(recipe.difficulty.as_str())
        .bind(recipe.meal_type.as_str())
        .bind(encode_json(&recipe.ingredients)?)
        .bind(encode_json(&recipe.instructions)?)
        .bind(recipe.calories_per_serving)
        .bind(encode_json(&recipe.tags)?)
        .bind(encode_json(&recipe.dietary_labels)?)
        .bind(encode_json(&recipe.allergen_warnings)?)
        .bind(recipe.is_published)
        .bind(recipe.is_featured)
        .bind(Utc::now().timestamp())
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, "a recipe with this slug already exists"))?;

        let recipe = fetch_recipe(&mut tx, recipe_id)
            .await?
            .ok_or(AppError::NotFound("recipe"))?;

        tx.commit().await?;
        Ok(recipe)
    }

    /// Fetch a recipe only if it is published.
    pub async fn get_published_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>> {
        Ok(self.get_recipe(recipe_id).await?.filter(|r| r.is_published))
    }

    /// One page of the published recipes matching `filter`, in relevance
    /// order, with the total number of matches.
    ///
    /// A page past the end is empty but still carries the count.
    pub async fn search_recipes(
        &self,
        filter: &RecipeFilter,
        pagination: Pagination,
    ) -> Result<Page<Recipe>> {
        let mut count_query = QueryBuilder::new(RECIPE_COUNT);
        push_recipe_filter(&mut count_query, filter);
        let count: i64 = count_query
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let results = self
            .find_recipes(filter, i64::from(pagination.page_size), pagination.offset())
            .await?;

        Ok(Page {
            results,
            count: count as usize,
            page: pagination.page,
            page_size: pagination.page_size,
        })
    }

    /// Published recipes matching `filter`, best rated first, skipping
    /// `offset` and returning at most `limit`.
    pub async fn find_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Recipe>> {
        let mut query = QueryBuilder::new(RECIPE_SELECT);
        push_recipe_filter(&mut query, filter);
        query
            .push(" ORDER BY r.average_rating DESC, r.total_ratings DESC, r.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(recipe_from_row).collect()
    }

    pub async fn list_featured_recipes(&self) -> Result<Vec<Recipe>> {
        let sql = format!(
            "{RECIPE_SELECT} WHERE r.is_published = 1 AND r.is_featured = 1 \
             ORDER BY r.average_rating DESC, r.total_ratings DESC, r.id"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(recipe_from_row).collect()
    }

    /// Published recipes with at least `min_ratings` ratings, best first.
    pub async fn list_popular_recipes(&self, min_ratings: i64, limit: i64) -> Result<Vec<Recipe>> {
        let sql = format!(
            "{RECIPE_SELECT} WHERE r.is_published = 1 AND r.total_ratings >= ? \
             ORDER BY r.average_rating DESC, r.total_ratings DESC, r.id LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(min_ratings)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(recipe_from_row).collect()
    }

    // ========================================================================
    // Ratings
    // ========================================================================

    pub async fn list_ratings(&self, recipe_id: i64) -> Result<Vec<Rating>> {
        let sql = format!("{RATING_SELECT} WHERE rr.recipe_id = ? ORDER BY rr.created_at DESC, rr.id DESC");
        let rows = sqlx::query(&sql)
            .bind(recipe_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(rating_from_row).collect()
    }

    /// Rate a published recipe and recompute its aggregate in one transaction.
    pub async fn create_rating(
        &self,
        user_id: i64,
        recipe_id: i64,
        request: &RatingRequest,
    ) -> Result<Rating> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let published = sqlx::query("SELECT 1 FROM recipes WHERE id = ? AND is_published = 1")
            .bind(recipe_id)
            .fetch_optional(&mut *tx)
            .await?;
        if published.is_none() {
            return Err(AppError::NotFound("recipe"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO recipe_ratings (recipe_id, user_id, rating, review, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(recipe_id)
        .bind(user_id)
        .bind(request.rating)
        .bind(&request.review)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, "you have already rated this recipe"))?;

        recompute_recipe_rating(&mut tx, recipe_id).await?;
        let rating = fetch_rating(&mut tx, result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("rating"))?;

        tx.commit().await?;
        Ok(rating)
    }

    /// Change the caller's own rating. Other users' ratings are not found.
    pub async fn update_rating(
        &self,
        user_id: i64,
        rating_id: i64,
        request: &RatingRequest,
    ) -> Result<Rating> {
        let mut tx = self.begin_write().await?;

        let recipe_id = owned_rating_recipe(&mut tx, user_id, rating_id).await?;
        sqlx::query("UPDATE recipe_ratings SET rating = ?, review = ?, updated_at = ? WHERE id = ?")
            .bind(request.rating)
            .bind(&request.review)
            .bind(Utc::now().timestamp())
            .bind(rating_id)
            .execute(&mut *tx)
            .await?;

        recompute_recipe_rating(&mut tx, recipe_id).await?;
        let rating = fetch_rating(&mut tx, rating_id)
            .await?
            .ok_or(AppError::NotFound("rating"))?;

        tx.commit().await?;
        Ok(rating)
    }

    /// Delete the caller's own rating and recompute the recipe aggregate.
    pub async fn delete_rating(&self, user_id: i64, rating_id: i64) -> Result<()> {
        let mut tx = self.begin_write().await?;

        let recipe_id = owned_rating_recipe(&mut tx, user_id, rating_id).await?;
        sqlx::query("DELETE FROM recipe_ratings WHERE id = ?")
            .bind(rating_id)
            .execute(&mut *tx)
            .await?;

        recompute_recipe_rating(&mut tx, recipe_id).await?;

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // User recipe interactions
    // ========================================================================

    pub async fn get_user_recipe(&self, user_id: i64, recipe_id: i64) -> Result<Option<UserRecipe>> {
        let mut conn = self.pool.acquire().await?;
        fetch_user_recipe(&mut conn, user_id, recipe_id).await
    }

    /// Mark a published recipe as saved. Returns the interaction and whether
    /// it was newly created.
    pub async fn save_recipe(&self, user_id: i64, recipe_id: i64) -> Result<(UserRecipe, bool)> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;
        ensure_published(&mut tx, recipe_id).await?;

        let created = match fetch_user_recipe(&mut tx, user_id, recipe_id).await? {
            Some(_) => {
                sqlx::query(
                    "UPDATE user_recipes SET status = ?, updated_at = ? WHERE user_id = ? AND recipe_id = ?",
                )
                .bind(UserRecipeStatus::Saved.as_str())
                .bind(now)
                .bind(user_id)
                .bind(recipe_id)
                .execute(&mut *tx)
                .await?;
                false
            }
            None => {
                insert_user_recipe(&mut tx, user_id, recipe_id, false, now).await?;
                true
            }
        };

        let user_recipe = fetch_user_recipe(&mut tx, user_id, recipe_id)
            .await?
            .ok_or(AppError::NotFound("recipe interaction"))?;

        tx.commit().await?;
        Ok((user_recipe, created))
    }

    /// Flip the favorite flag, creating the interaction as a favorite if
    /// there is none yet.
    pub async fn toggle_favorite(&self, user_id: i64, recipe_id: i64) -> Result<UserRecipe> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;
        ensure_published(&mut tx, recipe_id).await?;

        match fetch_user_recipe(&mut tx, user_id, recipe_id).await? {
            Some(existing) => {
                sqlx::query(
                    "UPDATE user_recipes SET is_favorite = ?, updated_at = ? WHERE id = ?",
                )
                .bind(!existing.is_favorite)
                .bind(now)
                .bind(existing.id)
                .execute(&mut *tx)
                .await?;
            }
            None => insert_user_recipe(&mut tx, user_id, recipe_id, true, now).await?,
        }

        let user_recipe = fetch_user_recipe(&mut tx, user_id, recipe_id)
            .await?
            .ok_or(AppError::NotFound("recipe interaction"))?;

        tx.commit().await?;
        Ok(user_recipe)
    }

    /// Apply an interaction update, completing a cooking session if one ends.
    pub async fn update_user_recipe(
        &self,
        user_id: i64,
        recipe_id: i64,
        mut update: UserRecipeUpdate,
    ) -> Result<UserRecipe> {
        let mut tx = self.begin_write().await?;

        let mut user_recipe = fetch_user_recipe(&mut tx, user_id, recipe_id)
            .await?
            .ok_or(AppError::NotFound("recipe interaction"))?;

        // Stored at second precision; compare at the same precision.
        update.cooking_started_at = update.cooking_started_at.map(|t| t.trunc_subsecs(0));
        update.cooking_completed_at = update.cooking_completed_at.map(|t| t.trunc_subsecs(0));
        user_recipe.apply(update)?;

        sqlx::query(
            r#"
            UPDATE user_recipes
            SET status = ?, is_favorite = ?, times_cooked = ?, last_cooked = ?,
                personal_notes = ?, modifications = ?, cooking_started_at = ?,
                cooking_completed_at = ?, cooking_duration = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(user_recipe.status.as_str())
        .bind(user_recipe.is_favorite)
        .bind(user_recipe.times_cooked)
        .bind(user_recipe.last_cooked.map(|t| t.timestamp()))
        .bind(&user_recipe.personal_notes)
        .bind(encode_json(&user_recipe.modifications)?)
        .bind(user_recipe.cooking_started_at.map(|t| t.timestamp()))
        .bind(user_recipe.cooking_completed_at.map(|t| t.timestamp()))
        .bind(user_recipe.cooking_duration)
        .bind(Utc::now().timestamp())
        .bind(user_recipe.id)
        .execute(&mut *tx)
        .await?;

        let user_recipe = fetch_user_recipe(&mut tx, user_id, recipe_id)
            .await?
            .ok_or(AppError::NotFound("recipe interaction"))?;

        tx.commit().await?;
        Ok(user_recipe)
    }

    pub async fn list_user_recipes(
        &self,
        user_id: i64,
        query: &UserRecipeQuery,
    ) -> Result<Vec<UserRecipe>> {
        let sql = format!(
            "{USER_RECIPE_SELECT} WHERE ur.user_id = ?1 \
             AND (?2 IS NULL OR ur.status = ?2) \
             AND (?3 IS NULL OR ur.is_favorite = ?3) \
             ORDER BY ur.updated_at DESC, ur.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.is_favorite)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(user_recipe_from_row).collect()
    }

    /// Ids of the user's most recently cooked completed recipes.
    ///
    /// Completed interactions that were never cooked through a session have
    /// no `last_cooked` and are left out.
    pub async fn recently_completed_recipe_ids(&self, user_id: i64, limit: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT recipe_id
            FROM user_recipes
            WHERE user_id = ? AND status = 'completed' AND last_cooked IS NOT NULL
            ORDER BY last_cooked DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("recipe_id")).collect())
    }

    pub async fn recipe_stats(&self, user_id: i64) -> Result<RecipeStats> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM recipes WHERE is_published = 1")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let counts = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(status = 'saved'), 0) AS saved,
                COALESCE(SUM(status = 'planned'), 0) AS planned,
                COALESCE(SUM(status = 'completed'), 0) AS completed,
                COALESCE(SUM(is_favorite), 0) AS favorites,
                COALESCE(SUM(cooking_duration), 0) AS cooking_time
            FROM user_recipes
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let mut by_difficulty = DifficultyBreakdown::default();
        let rows = sqlx::query(
            r#"
            SELECT r.difficulty AS difficulty, COUNT(*) AS n
            FROM user_recipes ur
            JOIN recipes r ON r.id = ur.recipe_id
            WHERE ur.user_id = ?
            GROUP BY r.difficulty
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let n: i64 = row.try_get("n")?;
            let difficulty: Difficulty = parse_column(row, "difficulty")?;
            match difficulty {
                Difficulty::Easy => by_difficulty.easy = n,
                Difficulty::Medium => by_difficulty.medium = n,
                Difficulty::Hard => by_difficulty.hard = n,
            }
        }

        let rows = sqlx::query(
            r#"
            SELECT c.name AS cuisine, COUNT(*) AS n
            FROM user_recipes ur
            JOIN recipes r ON r.id = ur.recipe_id
            JOIN cuisines c ON c.id = r.cuisine_id
            WHERE ur.user_id = ?
            GROUP BY c.id
            ORDER BY n DESC, c.name
            LIMIT 5
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let by_cuisine = rows
            .iter()
            .map(|row| {
                Ok(CuisineCount {
                    cuisine: row.try_get("cuisine")?,
                    count: row.try_get("n")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RecipeStats {
            total_recipes_available: total,
            saved_recipes: counts.try_get("saved")?,
            planned_recipes: counts.try_get("planned")?,
            completed_recipes: counts.try_get("completed")?,
            favorite_recipes: counts.try_get("favorites")?,
            total_cooking_time: counts.try_get("cooking_time")?,
            recipes_by_difficulty: by_difficulty,
            recipes_by_cuisine: by_cuisine,
        })
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub async fn list_collections(&self, user_id: i64) -> Result<Vec<Collection>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT * FROM recipe_collections WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut collections = Vec::with_capacity(rows.len());
        for row in &rows {
            collections.push(collection_from_row(&mut conn, row).await?);
        }
        Ok(collections)
    }

    /// Fetch one of the user's collections. Other users' collections are
    /// not found.
    pub async fn get_collection(&self, user_id: i64, collection_id: i64) -> Result<Option<Collection>> {
        let mut conn = self.pool.acquire().await?;
        fetch_collection(&mut conn, user_id, collection_id).await
    }

    pub async fn create_collection(&self, user_id: i64, new: &NewCollection) -> Result<Collection> {
        let now = Utc::now().timestamp();
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO recipe_collections (user_id, name, description, is_public, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.is_public)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_as(e, "you already have a collection with this name"))?;

        fetch_collection(&mut conn, user_id, result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("collection"))
    }

    pub async fn update_collection(
        &self,
        user_id: i64,
        collection_id: i64,
        update: &CollectionUpdate,
    ) -> Result<Collection> {
        let mut conn = self.pool.acquire().await?;
        let mut collection = fetch_collection(&mut conn, user_id, collection_id)
            .await?
            .ok_or(AppError::NotFound("collection"))?;

        if let Some(name) = &update.name {
            collection.name = name.clone();
        }
        if let Some(description) = &update.description {
            collection.description = description.clone();
        }
        if let Some(is_public) = update.is_public {
            collection.is_public = is_public;
        }

        sqlx::query(
            "UPDATE recipe_collections SET name = ?, description = ?, is_public = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(collection.is_public)
        .bind(Utc::now().timestamp())
        .bind(collection_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_as(e, "you already have a collection with this name"))?;

        fetch_collection(&mut conn, user_id, collection_id)
            .await?
            .ok_or(AppError::NotFound("collection"))
    }

    pub async fn delete_collection(&self, user_id: i64, collection_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM recipe_collections WHERE id = ? AND user_id = ?")
            .bind(collection_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("collection"));
        }
        Ok(())
    }

    /// Add a published recipe to a collection. Adding it twice is a no-op.
    pub async fn add_to_collection(
        &self,
        user_id: i64,
        collection_id: i64,
        recipe_id: i64,
    ) -> Result<Collection> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        fetch_collection(&mut tx, user_id, collection_id)
            .await?
            .ok_or(AppError::NotFound("collection"))?;
        ensure_published(&mut tx, recipe_id).await?;

        sqlx::query(
            "INSERT OR IGNORE INTO collection_recipes (collection_id, recipe_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(collection_id)
        .bind(recipe_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        touch_collection(&mut tx, collection_id, now).await?;

        let collection = fetch_collection(&mut tx, user_id, collection_id)
            .await?
            .ok_or(AppError::NotFound("collection"))?;

        tx.commit().await?;
        Ok(collection)
    }

    pub async fn remove_from_collection(
        &self,
        user_id: i64,
        collection_id: i64,
        recipe_id: i64,
    ) -> Result<Collection> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        fetch_collection(&mut tx, user_id, collection_id)
            .await?
            .ok_or(AppError::NotFound("collection"))?;

        let result =
            sqlx::query("DELETE FROM collection_recipes WHERE collection_id = ? AND recipe_id = ?")
                .bind(collection_id)
                .bind(recipe_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("recipe"));
        }
        touch_collection(&mut tx, collection_id, now).await?;

        let collection = fetch_collection(&mut tx, user_id, collection_id)
            .await?
            .ok_or(AppError::NotFound("collection"))?;

        tx.commit().await?;
        Ok(collection)
    }

    // ========================================================================
    // Meal plans
    // ========================================================================

    pub async fn list_meal_plans(&self, user_id: i64) -> Result<Vec<MealPlan>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT * FROM meal_plans WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut plans = Vec::with_capacity(rows.len());
        for row in &rows {
            plans.push(meal_plan_from_row(&mut conn, row).await?);
        }
        Ok(plans)
    }

    /// Fetch one of the user's meal plans with its entries. Other users'
    /// plans are not found.
    pub async fn get_meal_plan(&self, user_id: i64, plan_id: i64) -> Result<Option<MealPlan>> {
        let mut conn = self.pool.acquire().await?;
        fetch_meal_plan(&mut conn, user_id, plan_id).await
    }

    pub async fn create_meal_plan(&self, user_id: i64, new: &NewMealPlan) -> Result<MealPlan> {
        check_plan_dates(new.start_date, new.end_date)?;

        let now = Utc::now().timestamp();
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO meal_plans (user_id, name, start_date, end_date, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(new.start_date.to_string())
        .bind(new.end_date.to_string())
        .bind(new.is_active)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        fetch_meal_plan(&mut conn, user_id, result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("meal plan"))
    }

    pub async fn update_meal_plan(
        &self,
        user_id: i64,
        plan_id: i64,
        update: MealPlanUpdate,
    ) -> Result<MealPlan> {
        let mut tx = self.begin_write().await?;
        let mut plan = fetch_meal_plan(&mut tx, user_id, plan_id)
            .await?
            .ok_or(AppError::NotFound("meal plan"))?;
        plan.apply(update)?;

        sqlx::query(
            "UPDATE meal_plans SET name = ?, start_date = ?, end_date = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&plan.name)
        .bind(plan.start_date.to_string())
        .bind(plan.end_date.to_string())
        .bind(plan.is_active)
        .bind(Utc::now().timestamp())
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

        let plan = fetch_meal_plan(&mut tx, user_id, plan_id)
            .await?
            .ok_or(AppError::NotFound("meal plan"))?;

        tx.commit().await?;
        Ok(plan)
    }

    /// Delete a meal plan and its entries.
    pub async fn delete_meal_plan(&self, user_id: i64, plan_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM meal_plans WHERE id = ? AND user_id = ?")
            .bind(plan_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("meal plan"));
        }
        Ok(())
    }

    /// Schedule a published recipe for one meal on a day of the plan.
    ///
    /// The day must fall inside the plan and each meal of a day holds one
    /// entry; a second one conflicts.
    pub async fn add_meal_plan_entry(
        &self,
        user_id: i64,
        plan_id: i64,
        new: &NewMealPlanEntry,
    ) -> Result<MealPlanEntry> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let plan = fetch_meal_plan(&mut tx, user_id, plan_id)
            .await?
            .ok_or(AppError::NotFound("meal plan"))?;
        if !plan.covers(new.date) {
            return Err(AppError::BadRequest(
                "date falls outside the meal plan".to_string(),
            ));
        }
        ensure_published(&mut tx, new.recipe_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO meal_plan_entries (meal_plan_id, recipe_id, date, meal_type, servings,
                                           notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(plan_id)
        .bind(new.recipe_id)
        .bind(new.date.to_string())
        .bind(new.meal_type.as_str())
        .bind(new.servings)
        .bind(&new.notes)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, "this meal is already planned for that day"))?;
        touch_meal_plan(&mut tx, plan_id, now).await?;

        let entry = fetch_meal_plan_entry(&mut tx, user_id, result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("meal plan entry"))?;

        tx.commit().await?;
        Ok(entry)
    }

    pub async fn get_meal_plan_entry(
        &self,
        user_id: i64,
        entry_id: i64,
    ) -> Result<Option<MealPlanEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_meal_plan_entry(&mut conn, user_id, entry_id).await
    }

    /// Move, swap or resize a planned meal under the same rules as adding it.
    pub async fn update_meal_plan_entry(
        &self,
        user_id: i64,
        entry_id: i64,
        update: MealPlanEntryUpdate,
    ) -> Result<MealPlanEntry> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let mut entry = fetch_meal_plan_entry(&mut tx, user_id, entry_id)
            .await?
            .ok_or(AppError::NotFound("meal plan entry"))?;
        let plan = fetch_meal_plan(&mut tx, user_id, entry.meal_plan_id)
            .await?
            .ok_or(AppError::NotFound("meal plan"))?;

        let recipe_changed = update.recipe_id.is_some_and(|id| id != entry.recipe_id);
        entry.apply(update);
        if !plan.covers(entry.date) {
            return Err(AppError::BadRequest(
                "date falls outside the meal plan".to_string(),
            ));
        }
        if recipe_changed {
            ensure_published(&mut tx, entry.recipe_id).await?;
        }

        sqlx::query(
            "UPDATE meal_plan_entries SET recipe_id = ?, date = ?, meal_type = ?, servings = ?, notes = ? WHERE id = ?",
        )
        .bind(entry.recipe_id)
        .bind(entry.date.to_string())
        .bind(entry.meal_type.as_str())
        .bind(entry.servings)
        .bind(&entry.notes)
        .bind(entry_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, "this meal is already planned for that day"))?;
        touch_meal_plan(&mut tx, plan.id, now).await?;

        let entry = fetch_meal_plan_entry(&mut tx, user_id, entry_id)
            .await?
            .ok_or(AppError::NotFound("meal plan entry"))?;

        tx.commit().await?;
        Ok(entry)
    }

    pub async fn delete_meal_plan_entry(&self, user_id: i64, entry_id: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let entry = fetch_meal_plan_entry(&mut tx, user_id, entry_id)
            .await?
            .ok_or(AppError::NotFound("meal plan entry"))?;

        sqlx::query("DELETE FROM meal_plan_entries WHERE id = ?")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        touch_meal_plan(&mut tx, entry.meal_plan_id, now).await?;

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Shopping lists
    // ========================================================================

    pub async fn list_shopping_lists(&self, user_id: i64) -> Result<Vec<ShoppingList>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT * FROM shopping_lists WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut lists = Vec::with_capacity(rows.len());
        for row in &rows {
            lists.push(shopping_list_from_row(&mut conn, row).await?);
        }
        Ok(lists)
    }

    pub async fn get_shopping_list(&self, user_id: i64, list_id: i64) -> Result<Option<ShoppingList>> {
        let mut conn = self.pool.acquire().await?;
        fetch_shopping_list(&mut conn, user_id, list_id).await
    }

    pub async fn create_shopping_list(
        &self,
        user_id: i64,
        new: &NewShoppingList,
    ) -> Result<ShoppingList> {
        let now = Utc::now().timestamp();
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO shopping_lists (user_id, name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(new.is_active)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        fetch_shopping_list(&mut conn, user_id, result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("shopping list"))
    }

    pub async fn update_shopping_list(
        &self,
        user_id: i64,
        list_id: i64,
        update: &ShoppingListUpdate,
    ) -> Result<ShoppingList> {
        let mut tx = self.begin_write().await?;
        let mut list = fetch_shopping_list(&mut tx, user_id, list_id)
            .await?
            .ok_or(AppError::NotFound("shopping list"))?;

        if let Some(name) = &update.name {
            list.name = name.clone();
        }
        if let Some(active) = update.is_active {
            list.is_active = active;
        }

        sqlx::query("UPDATE shopping_lists SET name = ?, is_active = ?, updated_at = ? WHERE id = ?")
            .bind(&list.name)
            .bind(list.is_active)
            .bind(Utc::now().timestamp())
            .bind(list_id)
            .execute(&mut *tx)
            .await?;

        let list = fetch_shopping_list(&mut tx, user_id, list_id)
            .await?
            .ok_or(AppError::NotFound("shopping list"))?;

        tx.commit().await?;
        Ok(list)
    }

    /// Delete a shopping list and its items.
    pub async fn delete_shopping_list(&self, user_id: i64, list_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM shopping_lists WHERE id = ? AND user_id = ?")
            .bind(list_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("shopping list"));
        }
        Ok(())
    }

    pub async fn add_shopping_item(
        &self,
        user_id: i64,
        list_id: i64,
        new: &NewShoppingListItem,
    ) -> Result<ShoppingListItem> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        fetch_shopping_list(&mut tx, user_id, list_id)
            .await?
            .ok_or(AppError::NotFound("shopping list"))?;

        let result = sqlx::query(
            r#"
            INSERT INTO shopping_list_items (shopping_list_id, name, quantity, category,
                                             is_purchased, estimated_price, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(list_id)
        .bind(&new.name)
        .bind(&new.quantity)
        .bind(&new.category)
        .bind(new.is_purchased)
        .bind(new.estimated_price.map(round_price))
        .bind(now)
        .execute(&mut *tx)
        .await?;
        touch_shopping_list(&mut tx, list_id, now).await?;

        let item = fetch_shopping_item(&mut tx, user_id, result.last_insert_rowid())
            .await?
            .ok_or(AppError::NotFound("shopping list item"))?;

        tx.commit().await?;
        Ok(item)
    }

    pub async fn get_shopping_item(
        &self,
        user_id: i64,
        item_id: i64,
    ) -> Result<Option<ShoppingListItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_shopping_item(&mut conn, user_id, item_id).await
    }

    pub async fn update_shopping_item(
        &self,
        user_id: i64,
        item_id: i64,
        update: ShoppingListItemUpdate,
    ) -> Result<ShoppingListItem> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let mut item = fetch_shopping_item(&mut tx, user_id, item_id)
            .await?
            .ok_or(AppError::NotFound("shopping list item"))?;
        item.apply(update);

        sqlx::query(
            r#"
            UPDATE shopping_list_items
            SET name = ?, quantity = ?, category = ?, is_purchased = ?, estimated_price = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.name)
        .bind(&item.quantity)
        .bind(&item.category)
        .bind(item.is_purchased)
        .bind(item.estimated_price.map(round_price))
        .bind(item_id)
        .execute(&mut *tx)
        .await?;
        touch_shopping_list(&mut tx, item.shopping_list_id, now).await?;

        let item = fetch_shopping_item(&mut tx, user_id, item_id)
            .await?
            .ok_or(AppError::NotFound("shopping list item"))?;

        tx.commit().await?;
        Ok(item)
    }

    pub async fn delete_shopping_item(&self, user_id: i64, item_id: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let item = fetch_shopping_item(&mut tx, user_id, item_id)
            .await?
            .ok_or(AppError::NotFound("shopping list item"))?;

        sqlx::query("DELETE FROM shopping_list_items WHERE id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        touch_shopping_list(&mut tx, item.shopping_list_id, now).await?;

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // AI logs
    // ========================================================================

    pub async fn log_ai_interaction(&self, interaction: &NewInteraction) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ai_interactions (user_id, interaction_type, user_input, context_data,
                                         ai_model_used, ai_response, is_fallback, confidence_score,
                                         processing_time_ms, tokens_used, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(interaction.user_id)
        .bind(interaction.interaction_type.as_str())
        .bind(encode_json(&interaction.user_input)?)
        .bind(encode_json(&interaction.context_data)?)
        .bind(&interaction.ai_model_used)
        .bind(encode_json(&interaction.ai_response)?)
        .bind(interaction.is_fallback)
        .bind(interaction.confidence_score)
        .bind(interaction.processing_time_ms)
        .bind(interaction.tokens_used)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Number of logged AI interactions for a user.
    pub async fn count_ai_interactions(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM ai_interactions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("n")?)
    }

    pub async fn save_ai_recommendation(&self, recommendation: &NewAiRecommendation) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ai_recommendations (user_id, recommendation_type, content,
                                            confidence_score, user_context, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(recommendation.user_id)
        .bind(recommendation.recommendation_type.as_str())
        .bind(encode_json(&recommendation.content)?)
        .bind(recommendation.confidence_score)
        .bind(encode_json(&recommendation.user_context)?)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The user's most recent AI recommendations, newest first.
    pub async fn list_ai_recommendations(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<AiRecommendationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM ai_recommendations
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ai_recommendation_from_row).collect()
    }

    /// Attach feedback to one of the user's recommendations.
    pub async fn record_ai_feedback(
        &self,
        user_id: i64,
        feedback: &FeedbackRequest,
    ) -> Result<AiRecommendationRecord> {
        let result = sqlx::query(
            r#"
            UPDATE ai_recommendations
            SET user_rating = COALESCE(?, user_rating),
                user_feedback = ?,
                was_helpful = COALESCE(?, was_helpful)
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(feedback.rating)
        .bind(&feedback.feedback)
        .bind(feedback.was_helpful)
        .bind(feedback.recommendation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("recommendation"));
        }

        let row = sqlx::query("SELECT * FROM ai_recommendations WHERE id = ?")
            .bind(feedback.recommendation_id)
            .fetch_one(&self.pool)
            .await?;
        ai_recommendation_from_row(&row)
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

async fn fetch_user(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<UserAccount>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

async fn fetch_profile(conn: &mut SqliteConnection, user_id: i64) -> Result<UserProfile> {
    let row = sqlx::query("SELECT * FROM user_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    let mut profile = UserProfile {
        user_id,
        ..Default::default()
    };
    if let Some(row) = row {
        profile.activity_level = parse_column(&row, "activity_level")?;
        profile.favorite_cuisines = decode_json(&row, "favorite_cuisines")?;
        profile.disliked_ingredients = decode_json(&row, "disliked_ingredients")?;
        profile.bmr = row.try_get("bmr")?;
        profile.daily_calorie_target = row.try_get("daily_calorie_target")?;
    }

    profile.allergies = linked_items(conn, ReferenceKind::Allergy, user_id).await?;
    profile.dietary_preferences =
        linked_items(conn, ReferenceKind::DietaryPreference, user_id).await?;
    profile.health_conditions = linked_items(conn, ReferenceKind::HealthCondition, user_id).await?;
    profile.fitness_goals = linked_goals(conn, user_id).await?;

    Ok(profile)
}

async fn linked_items(
    conn: &mut SqliteConnection,
    kind: ReferenceKind,
    user_id: i64,
) -> Result<Vec<ReferenceItem>> {
    let sql = format!(
        "SELECT t.id, t.name, t.description FROM {} t JOIN {} l ON l.item_id = t.id \
         WHERE l.user_id = ? ORDER BY t.name",
        kind.table(),
        kind.link_table()
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(reference_item_from_row).collect()
}

async fn linked_goals(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<FitnessGoal>> {
    let rows = sqlx::query(
        r#"
        SELECT g.id, g.name, g.description, g.target_calories_adjustment
        FROM fitness_goals g
        JOIN profile_fitness_goals l ON l.item_id = g.id
        WHERE l.user_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(fitness_goal_from_row).collect()
}

/// Replace a user's rows in one profile link table.
async fn replace_links(
    conn: &mut SqliteConnection,
    link_table: &'static str,
    user_id: i64,
    ids: &[i64],
) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {link_table} WHERE user_id = ?"))
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    // OR IGNORE drops duplicate ids; foreign key failures still surface.
    let insert = format!("INSERT OR IGNORE INTO {link_table} (user_id, item_id) VALUES (?, ?)");
    for id in ids {
        sqlx::query(&insert)
            .bind(user_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Recompute and store BMR and daily calorie target from the account and
/// the stored activity level and fitness goals.
async fn store_calorie_targets(
    conn: &mut SqliteConnection,
    account: &UserAccount,
    today: NaiveDate,
) -> Result<()> {
    let row = sqlx::query("SELECT activity_level FROM user_profiles WHERE user_id = ?")
        .bind(account.id)
        .fetch_optional(&mut *conn)
        .await?;
    let activity: ActivityLevel = match &row {
        Some(row) => parse_column(row, "activity_level")?,
        None => ActivityLevel::default(),
    };
    let goals = linked_goals(conn, account.id).await?;

    let targets = calorie_targets(account, activity, &goals, today);
    sqlx::query("UPDATE user_profiles SET bmr = ?, daily_calorie_target = ? WHERE user_id = ?")
        .bind(targets.bmr)
        .bind(targets.daily_calorie_target)
        .bind(account.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn fetch_rating(conn: &mut SqliteConnection, rating_id: i64) -> Result<Option<Rating>> {
    let sql = format!("{RATING_SELECT} WHERE rr.id = ?");
    let row = sqlx::query(&sql)
        .bind(rating_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(rating_from_row).transpose()
}

/// Recipe id of a rating owned by `user_id`, or not found.
async fn owned_rating_recipe(
    conn: &mut SqliteConnection,
    user_id: i64,
    rating_id: i64,
) -> Result<i64> {
    let row = sqlx::query("SELECT recipe_id FROM recipe_ratings WHERE id = ? AND user_id = ?")
        .bind(rating_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| r.get("recipe_id"))
        .ok_or(AppError::NotFound("rating"))
}

async fn ensure_published(conn: &mut SqliteConnection, recipe_id: i64) -> Result<()> {
    let row = sqlx::query("SELECT 1 FROM recipes WHERE id = ? AND is_published = 1")
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|_| ()).ok_or(AppError::NotFound("recipe"))
}

async fn fetch_user_recipe(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipe_id: i64,
) -> Result<Option<UserRecipe>> {
    let sql = format!("{USER_RECIPE_SELECT} WHERE ur.user_id = ? AND ur.recipe_id = ?");
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(user_recipe_from_row).transpose()
}

async fn insert_user_recipe(
    conn: &mut SqliteConnection,
    user_id: i64,
    recipe_id: i64,
    is_favorite: bool,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_recipes (user_id, recipe_id, status, is_favorite, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .bind(UserRecipeStatus::Saved.as_str())
    .bind(is_favorite)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn fetch_collection(
    conn: &mut SqliteConnection,
    user_id: i64,
    collection_id: i64,
) -> Result<Option<Collection>> {
    let row = sqlx::query("SELECT * FROM recipe_collections WHERE id = ? AND user_id = ?")
        .bind(collection_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(collection_from_row(conn, &row).await?)),
        None => Ok(None),
    }
}

async fn collection_from_row(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<Collection> {
    let id: i64 = row.try_get("id")?;
    let recipe_rows = sqlx::query(
        "SELECT recipe_id FROM collection_recipes WHERE collection_id = ? ORDER BY added_at, recipe_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    let recipe_ids: Vec<i64> = recipe_rows.iter().map(|r| r.get("recipe_id")).collect();

    Ok(Collection {
        id,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_public: row.try_get("is_public")?,
        recipe_count: recipe_ids.len(),
        recipe_ids,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

async fn touch_collection(conn: &mut SqliteConnection, collection_id: i64, now: i64) -> Result<()> {
    sqlx::query("UPDATE recipe_collections SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(collection_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn fetch_recipe(conn: &mut SqliteConnection, recipe_id: i64) -> Result<Option<Recipe>> {
    let sql = format!("{RECIPE_SELECT} WHERE r.id = ?");
    let row = sqlx::query(&sql)
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(recipe_from_row).transpose()
}

async fn fetch_meal_plan(
    conn: &mut SqliteConnection,
    user_id: i64,
    plan_id: i64,
) -> Result<Option<MealPlan>> {
    let row = sqlx::query("SELECT * FROM meal_plans WHERE id = ? AND user_id = ?")
        .bind(plan_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(meal_plan_from_row(conn, &row).await?)),
        None => Ok(None),
    }
}

async fn meal_plan_from_row(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<MealPlan> {
    let id: i64 = row.try_get("id")?;
    let sql = format!("{ENTRY_SELECT} WHERE e.meal_plan_id = ?");
    let entry_rows = sqlx::query(&sql).bind(id).fetch_all(&mut *conn).await?;

    let mut entries = entry_rows
        .iter()
        .map(meal_plan_entry_from_row)
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by_key(|e| (e.date, e.meal_type));

    Ok(MealPlan {
        id,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        start_date: parse_date(row, "start_date")?,
        end_date: parse_date(row, "end_date")?,
        is_active: row.try_get("is_active")?,
        entries,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

/// An entry of one of the user's plans, or `None`.
async fn fetch_meal_plan_entry(
    conn: &mut SqliteConnection,
    user_id: i64,
    entry_id: i64,
) -> Result<Option<MealPlanEntry>> {
    let sql = format!("{ENTRY_SELECT} WHERE e.id = ? AND p.user_id = ?");
    let row = sqlx::query(&sql)
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(meal_plan_entry_from_row).transpose()
}

async fn touch_meal_plan(conn: &mut SqliteConnection, plan_id: i64, now: i64) -> Result<()> {
    sqlx::query("UPDATE meal_plans SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(plan_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn fetch_shopping_list(
    conn: &mut SqliteConnection,
    user_id: i64,
    list_id: i64,
) -> Result<Option<ShoppingList>> {
    let row = sqlx::query("SELECT * FROM shopping_lists WHERE id = ? AND user_id = ?")
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(shopping_list_from_row(conn, &row).await?)),
        None => Ok(None),
    }
}

async fn shopping_list_from_row(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<ShoppingList> {
    let id: i64 = row.try_get("id")?;
    let sql = format!("{ITEM_SELECT} WHERE i.shopping_list_id = ? ORDER BY i.category, i.name, i.id");
    let item_rows = sqlx::query(&sql).bind(id).fetch_all(&mut *conn).await?;

    let items = item_rows
        .iter()
        .map(shopping_item_from_row)
        .collect::<Result<Vec<_>>>()?;
    let remaining: f64 = items
        .iter()
        .filter(|i| !i.is_purchased)
        .filter_map(|i| i.estimated_price)
        .sum();

    Ok(ShoppingList {
        id,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        is_active: row.try_get("is_active")?,
        items,
        estimated_remaining: round_price(remaining),
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

async fn fetch_shopping_item(
    conn: &mut SqliteConnection,
    user_id: i64,
    item_id: i64,
) -> Result<Option<ShoppingListItem>> {
    let sql = format!("{ITEM_SELECT} WHERE i.id = ? AND l.user_id = ?");
    let row = sqlx::query(&sql)
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(shopping_item_from_row).transpose()
}

async fn touch_shopping_list(conn: &mut SqliteConnection, list_id: i64, now: i64) -> Result<()> {
    sqlx::query("UPDATE shopping_lists SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(list_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============================================================================
// Recipe filter
// ============================================================================

/// Append the `WHERE` clause for `filter` to a query over
/// `recipes r JOIN cuisines c JOIN regions g`.
///
/// Mirrors [`RecipeFilter::matches`]. List columns are JSON arrays, searched
/// with `json_each`. Terms are matched with `instr` so `%` and `_` stay
/// literal. SQLite's `lower` only folds ASCII.
fn push_recipe_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &RecipeFilter) {
    query.push(" WHERE r.is_published = 1");

    if let Some(term) = &filter.query {
        query
            .push(" AND (instr(lower(r.name), ")
            .push_bind(term.clone())
            .push(") > 0 OR instr(lower(r.description), ")
            .push_bind(term.clone())
            .push(") > 0 OR ");
        push_mention(query, "r.tags", "value", term);
        query.push(")");
    }

    if let Some(id) = filter.cuisine {
        query.push(" AND r.cuisine_id = ").push_bind(id);
    }
    if let Some(id) = filter.region {
        query.push(" AND c.region_id = ").push_bind(id);
    }
    if let Some(difficulty) = filter.difficulty {
        query.push(" AND r.difficulty = ").push_bind(difficulty.as_str());
    }
    if let Some(meal_type) = filter.meal_type {
        query.push(" AND r.meal_type = ").push_bind(meal_type.as_str());
    }
    for (column, max) in [
        ("r.prep_time", filter.max_prep_time),
        ("r.cook_time", filter.max_cook_time),
        ("r.total_time", filter.max_total_time),
    ] {
        if let Some(max) = max {
            query.push(format!(" AND {column} <= ")).push_bind(i64::from(max));
        }
    }
    if let Some(min) = filter.min_rating {
        query.push(" AND r.average_rating >= ").push_bind(min);
    }

    if !filter.difficulties.is_empty() {
        query.push(" AND r.difficulty IN (");
        let mut list = query.separated(", ");
        for difficulty in &filter.difficulties {
            list.push_bind(difficulty.as_str());
        }
        list.push_unseparated(")");
    }
    if !filter.cuisines.is_empty() {
        query.push(" AND r.cuisine_id IN (");
        let mut list = query.separated(", ");
        for id in &filter.cuisines {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
    }
    if !filter.exclude_ids.is_empty() {
        query.push(" AND r.id NOT IN (");
        let mut list = query.separated(", ");
        for id in &filter.exclude_ids {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
    }
    if !filter.region_names.is_empty() {
        query.push(" AND (");
        for (i, name) in filter.region_names.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            query
                .push("instr(lower(g.name), ")
                .push_bind(name.clone())
                .push(") > 0");
        }
        query.push(")");
    }

    for label in &filter.dietary_labels {
        query.push(" AND ");
        push_mention(query, "r.dietary_labels", "value", label);
    }
    if !filter.any_dietary_labels.is_empty() {
        query.push(" AND (");
        for (i, label) in filter.any_dietary_labels.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            push_mention(query, "r.dietary_labels", "value", label);
        }
        query.push(")");
    }
    for allergen in &filter.exclude_allergens {
        query.push(" AND NOT ");
        push_mention(query, "r.allergen_warnings", "value", allergen);
    }
    for term in &filter.ingredients {
        query.push(" AND ");
        push_mention(query, "r.ingredients", "json_extract(value, '$.name')", term);
    }
    for term in &filter.exclude_ingredients {
        query.push(" AND NOT ");
        push_mention(query, "r.ingredients", "json_extract(value, '$.name')", term);
    }
}

/// `EXISTS` test for an element of the JSON array `list` whose `element`
/// expression contains `term`.
fn push_mention(query: &mut QueryBuilder<'_, Sqlite>, list: &str, element: &str, term: &str) {
    query
        .push(format!(
            "EXISTS (SELECT 1 FROM json_each({list}) WHERE instr(lower({element}), "
        ))
        .push_bind(term.to_string())
        .push(") > 0)");
}

// ============================================================================
// Row decoding
// ============================================================================

fn timestamp(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("timestamp out of range: {ts}")))
}

fn optional_timestamp(ts: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    ts.map(timestamp).transpose()
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let text: String = row.try_get(column)?;
    text.parse().map_err(|e: UnknownVariant| AppError::Internal(e.into()))
}

fn parse_date(row: &SqliteRow, column: &str) -> Result<NaiveDate> {
    let text: String = row.try_get(column)?;
    text.parse().map_err(|e: chrono::ParseError| AppError::Internal(e.into()))
}

fn decode_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let text: String = row.try_get(column)?;
    Ok(serde_json::from_str(&text)?)
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Replace the generic conflict message of a unique violation.
fn conflict_as(e: sqlx::Error, message: &str) -> AppError {
    match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(message.to_string()),
        other => other,
    }
}

fn reference_item_from_row(row: &SqliteRow) -> Result<ReferenceItem> {
    Ok(ReferenceItem {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn fitness_goal_from_row(row: &SqliteRow) -> Result<FitnessGoal> {
    Ok(FitnessGoal {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        target_calories_adjustment: row.try_get("target_calories_adjustment")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<UserAccount> {
    let date_of_birth = row
        .try_get::<Option<String>, _>("date_of_birth")?
        .map(|d| d.parse::<NaiveDate>())
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;
    let gender = row
        .try_get::<Option<String>, _>("gender")?
        .map(|g| g.parse())
        .transpose()
        .map_err(|e: UnknownVariant| AppError::Internal(e.into()))?;

    Ok(UserAccount {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        date_of_birth,
        gender,
        height: row.try_get("height")?,
        weight: row.try_get("weight")?,
        country: row.try_get("country")?,
        city: row.try_get("city")?,
        location: row.try_get("location")?,
        cooking_level: parse_column(row, "cooking_level")?,
        family_size: row.try_get("family_size")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

fn recipe_from_row(row: &SqliteRow) -> Result<Recipe> {
    Ok(Recipe {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        cuisine_id: row.try_get("cuisine_id")?,
        cuisine_name: row.try_get("cuisine_name")?,
        region_id: row.try_get("region_id")?,
        region_name: row.try_get("region_name")?,
        prep_time: row.try_get("prep_time")?,
        cook_time: row.try_get("cook_time")?,
        total_time: row.try_get("total_time")?,
        servings: row.try_get("servings")?,
        difficulty: parse_column(row, "difficulty")?,
        meal_type: parse_column(row, "meal_type")?,
        ingredients: decode_json(row, "ingredients")?,
        instructions: decode_json(row, "instructions")?,
        calories_per_serving: row.try_get("calories_per_serving")?,
        tags: decode_json(row, "tags")?,
        dietary_labels: decode_json(row, "dietary_labels")?,
        allergen_warnings: decode_json(row, "allergen_warnings")?,
        created_by: row.try_get("created_by")?,
        is_published: row.try_get("is_published")?,
        is_featured: row.try_get("is_featured")?,
        average_rating: row.try_get("average_rating")?,
        total_ratings: row.try_get("total_ratings")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

fn rating_from_row(row: &SqliteRow) -> Result<Rating> {
    Ok(Rating {
        id: row.try_get("id")?,
        recipe_id: row.try_get("recipe_id")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        rating: row.try_get("rating")?,
        review: row.try_get("review")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

fn user_recipe_from_row(row: &SqliteRow) -> Result<UserRecipe> {
    Ok(UserRecipe {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        recipe_id: row.try_get("recipe_id")?,
        recipe_name: row.try_get("recipe_name")?,
        status: parse_column(row, "status")?,
        is_favorite: row.try_get("is_favorite")?,
        times_cooked: row.try_get("times_cooked")?,
        last_cooked: optional_timestamp(row.try_get("last_cooked")?)?,
        personal_notes: row.try_get("personal_notes")?,
        modifications: decode_json(row, "modifications")?,
        cooking_started_at: optional_timestamp(row.try_get("cooking_started_at")?)?,
        cooking_completed_at: optional_timestamp(row.try_get("cooking_completed_at")?)?,
        cooking_duration: row.try_get("cooking_duration")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
    })
}

fn meal_plan_entry_from_row(row: &SqliteRow) -> Result<MealPlanEntry> {
    Ok(MealPlanEntry {
        id: row.try_get("id")?,
        meal_plan_id: row.try_get("meal_plan_id")?,
        recipe_id: row.try_get("recipe_id")?,
        recipe_name: row.try_get("recipe_name")?,
        date: parse_date(row, "date")?,
        meal_type: parse_column(row, "meal_type")?,
        servings: row.try_get("servings")?,
        notes: row.try_get("notes")?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

fn shopping_item_from_row(row: &SqliteRow) -> Result<ShoppingListItem> {
    Ok(ShoppingListItem {
        id: row.try_get("id")?,
        shopping_list_id: row.try_get("shopping_list_id")?,
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        category: row.try_get("category")?,
        is_purchased: row.try_get("is_purchased")?,
        estimated_price: row.try_get("estimated_price")?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

fn ai_recommendation_from_row(row: &SqliteRow) -> Result<AiRecommendationRecord> {
    Ok(AiRecommendationRecord {
        id: row.try_get("id")?,
        recommendation_type: parse_column(row, "recommendation_type")?,
        content: decode_json(row, "content")?,
        confidence_score: row.try_get("confidence_score")?,
        user_rating: row.try_get("user_rating")?,
        user_feedback: row.try_get("user_feedback")?,
        was_helpful: row.try_get("was_helpful")?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}
