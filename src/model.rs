//! Data models for mealwise.
//!
//! Domain types (recipes, ratings, accounts, profiles, interactions, meal
//! plans, shopping lists) and the request/response bodies accepted by the HTTP
//! API. Enumerations serialize as the lowercase strings stored in the
//! database.
//!
//! # Health data
//!
//! Profile fields (allergies, health conditions, body measurements) are
//! personal health information. They are returned to their owner and passed
//! to the AI gateway, but are never written to logs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Error returned when a stored or submitted enum value is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a lowercase string enum.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// The canonical string stored in the database.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// ============================================================================
// Enumerations
// ============================================================================

/// How hard a recipe is to cook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

string_enum!(Difficulty, "difficulty", {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

/// The meal a recipe is intended for, in the order meals fall in a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Dessert,
    Beverage,
}

string_enum!(MealType, "meal type", {
    Breakfast => "breakfast",
    Lunch => "lunch",
    Dinner => "dinner",
    Snack => "snack",
    Dessert => "dessert",
    Beverage => "beverage",
});

/// A user's declared cooking skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookingLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

string_enum!(CookingLevel, "cooking level", {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
    Expert => "expert",
});

impl CookingLevel {
    /// Recipe difficulties a cook at this level is offered.
    ///
    /// - `beginner`: easy
    /// - `intermediate`: easy, medium
    /// - `advanced` / `expert`: easy, medium, hard
    pub fn allowed_difficulties(&self) -> &'static [Difficulty] {
        match self {
            CookingLevel::Beginner => &[Difficulty::Easy],
            CookingLevel::Intermediate => &[Difficulty::Easy, Difficulty::Medium],
            CookingLevel::Advanced | CookingLevel::Expert => {
                &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
            }
        }
    }
}

/// Gender as recorded on the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    /// Male
    M,
    /// Female
    F,
    /// Other
    O,
    /// Prefer not to say
    P,
}

string_enum!(Gender, "gender", {
    M => "M",
    F => "F",
    O => "O",
    P => "P",
});

/// Self-reported physical activity, used for calorie targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// Little or no exercise.
    Sedentary,
    /// Light exercise 1-3 days/week.
    Light,
    /// Moderate exercise 3-5 days/week.
    #[default]
    Moderate,
    /// Hard exercise 6-7 days/week.
    Very,
    /// Very hard exercise or a physical job.
    Extra,
}

string_enum!(ActivityLevel, "activity level", {
    Sedentary => "sedentary",
    Light => "light",
    Moderate => "moderate",
    Very => "very",
    Extra => "extra",
});

impl ActivityLevel {
    /// Multiplier applied to the basal metabolic rate.
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Very => 1.725,
            ActivityLevel::Extra => 1.9,
        }
    }
}

/// Where a recipe sits in a user's cooking lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRecipeStatus {
    #[default]
    Saved,
    Planned,
    Cooking,
    Completed,
}

string_enum!(UserRecipeStatus, "recipe status", {
    Saved => "saved",
    Planned => "planned",
    Cooking => "cooking",
    Completed => "completed",
});

// ============================================================================
// Recipes
// ============================================================================

/// A single ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Ingredient {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub quantity: f64,

    #[serde(default)]
    pub unit: String,
}

/// One step of a recipe's method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InstructionStep {
    #[validate(range(min = 1))]
    pub step_number: u32,

    #[validate(length(min = 1))]
    pub instruction: String,

    /// Optional timer for this step in minutes.
    #[serde(default)]
    pub timer_minutes: Option<u32>,
}

/// A recipe as stored in the catalog.
///
/// `average_rating` and `total_ratings` are derived from the recipe's ratings
/// and are only ever written by [`crate::aggregation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,

    pub cuisine_id: i64,
    pub cuisine_name: String,
    pub region_id: i64,
    pub region_name: String,

    /// Preparation time in minutes.
    pub prep_time: u32,
    /// Cooking time in minutes.
    pub cook_time: u32,
    /// Total time in minutes; prep + cook unless set explicitly.
    pub total_time: u32,
    pub servings: u32,
    pub difficulty: Difficulty,
    pub meal_type: MealType,

    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<InstructionStep>,
    pub calories_per_serving: Option<u32>,

    pub tags: Vec<String>,
    pub dietary_labels: Vec<String>,
    pub allergen_warnings: Vec<String>,

    pub created_by: Option<i64>,
    pub is_published: bool,
    pub is_featured: bool,

    pub average_rating: f64,
    pub total_ratings: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for POST /recipes.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRecipe {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// Derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,

    #[serde(default)]
    pub description: String,

    pub cuisine_id: i64,

    pub prep_time: u32,
    pub cook_time: u32,

    /// Defaults to prep + cook when absent or zero.
    #[serde(default)]
    pub total_time: Option<u32>,

    #[serde(default = "default_servings")]
    #[validate(range(min = 1))]
    pub servings: u32,

    pub difficulty: Difficulty,
    pub meal_type: MealType,

    #[validate(length(min = 1), nested)]
    pub ingredients: Vec<Ingredient>,

    #[validate(length(min = 1), nested)]
    pub instructions: Vec<InstructionStep>,

    #[serde(default)]
    pub calories_per_serving: Option<u32>,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dietary_labels: Vec<String>,
    #[serde(default)]
    pub allergen_warnings: Vec<String>,

    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub is_featured: bool,
}

fn default_servings() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

impl NewRecipe {
    /// Total time, falling back to prep + cook when unset.
    pub fn effective_total_time(&self) -> u32 {
        match self.total_time {
            Some(total) if total > 0 => total,
            _ => self.prep_time + self.cook_time,
        }
    }

    /// The slug to store: the explicit one, or one derived from the name.
    pub fn effective_slug(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slugify(slug),
            _ => slugify(&self.name),
        }
    }
}

/// Request body for PATCH /recipes/:id. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RecipeUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cuisine_id: Option<i64>,

    #[serde(default)]
    pub prep_time: Option<u32>,
    #[serde(default)]
    pub cook_time: Option<u32>,
    /// Zero recomputes prep + cook.
    #[serde(default)]
    pub total_time: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub servings: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub meal_type: Option<MealType>,

    #[serde(default)]
    #[validate(length(min = 1), nested)]
    pub ingredients: Option<Vec<Ingredient>>,
    #[serde(default)]
    #[validate(length(min = 1), nested)]
    pub instructions: Option<Vec<InstructionStep>>,

    #[serde(default)]
    pub calories_per_serving: Option<u32>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub dietary_labels: Option<Vec<String>>,
    #[serde(default)]
    pub allergen_warnings: Option<Vec<String>>,

    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

impl Recipe {
    /// Apply an author's edit in place.
    ///
    /// Changing prep or cook time without an explicit total recomputes the
    /// total. Cuisine and region names are left stale until the recipe is
    /// read back. Rating aggregates are never touched.
    pub fn apply(&mut self, update: RecipeUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(slug) = update.slug.filter(|s| !s.trim().is_empty()) {
            self.slug = slugify(&slug);
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(cuisine_id) = update.cuisine_id {
            self.cuisine_id = cuisine_id;
        }

        let times_changed = update.prep_time.is_some() || update.cook_time.is_some();
        if let Some(prep) = update.prep_time {
            self.prep_time = prep;
        }
        if let Some(cook) = update.cook_time {
            self.cook_time = cook;
        }
        match update.total_time {
            Some(total) if total > 0 => self.total_time = total,
            Some(_) => self.total_time = self.prep_time + self.cook_time,
            None if times_changed => self.total_time = self.prep_time + self.cook_time,
            None => {}
        }

        if let Some(servings) = update.servings {
            self.servings = servings;
        }
        if let Some(difficulty) = update.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(meal_type) = update.meal_type {
            self.meal_type = meal_type;
        }
        if let Some(ingredients) = update.ingredients {
            self.ingredients = ingredients;
        }
        if let Some(instructions) = update.instructions {
            self.instructions = instructions;
        }
        if update.calories_per_serving.is_some() {
            self.calories_per_serving = update.calories_per_serving;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(labels) = update.dietary_labels {
            self.dietary_labels = labels;
        }
        if let Some(allergens) = update.allergen_warnings {
            self.allergen_warnings = allergens;
        }
        if let Some(published) = update.is_published {
            self.is_published = published;
        }
        if let Some(featured) = update.is_featured {
            self.is_featured = featured;
        }
    }
}

/// Lowercase, ASCII-alphanumeric words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }

    slug
}

// ============================================================================
// Ratings
// ============================================================================

/// One user's rating of one recipe.
#[derive(Debug, Clone, Serialize)]
pub struct Rating {
    pub id: i64,
    pub recipe_id: i64,
    pub user_id: i64,
    pub username: String,
    pub rating: u8,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or updating a rating.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RatingRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,

    #[serde(default)]
    #[validate(length(max = 5000))]
    pub review: String,
}

// ============================================================================
// Reference data
// ============================================================================

/// A geographic region grouping cuisines.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// A cuisine within a region.
#[derive(Debug, Clone, Serialize)]
pub struct Cuisine {
    pub id: i64,
    pub name: String,
    pub region_id: i64,
    pub region_name: String,
    pub description: String,
}

/// A named reference entry: allergy, dietary preference or health condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceItem {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// A fitness goal with its daily calorie adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessGoal {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Daily calorie delta applied on top of maintenance (+/- kcal).
    pub target_calories_adjustment: i64,
}

// ============================================================================
// Accounts and profiles
// ============================================================================

/// A user account with the personal fields used for personalization.
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    /// Height in centimeters.
    pub height: Option<f64>,
    /// Weight in kilograms.
    pub weight: Option<f64>,
    pub country: String,
    pub city: String,
    pub location: String,
    pub cooking_level: CookingLevel,
    pub family_size: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for POST /users.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 150))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,

    #[serde(default)]
    #[validate(range(min = 50.0, max = 300.0))]
    pub height: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 20.0, max = 500.0))]
    pub weight: Option<f64>,

    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub cooking_level: CookingLevel,

    #[serde(default = "default_family_size")]
    #[validate(range(min = 1, max = 20))]
    pub family_size: u32,
}

fn default_family_size() -> u32 {
    1
}

/// Request body for PATCH /me. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AccountUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,

    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,

    #[serde(default)]
    #[validate(range(min = 50.0, max = 300.0))]
    pub height: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 20.0, max = 500.0))]
    pub weight: Option<f64>,

    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub cooking_level: Option<CookingLevel>,

    #[serde(default)]
    #[validate(range(min = 1, max = 20))]
    pub family_size: Option<u32>,
}

impl UserAccount {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: AccountUpdate) {
        if let Some(username) = update.username {
            self.username = username;
        }
        if update.date_of_birth.is_some() {
            self.date_of_birth = update.date_of_birth;
        }
        if update.gender.is_some() {
            self.gender = update.gender;
        }
        if update.height.is_some() {
            self.height = update.height;
        }
        if update.weight.is_some() {
            self.weight = update.weight;
        }
        if let Some(country) = update.country {
            self.country = country;
        }
        if let Some(city) = update.city {
            self.city = city;
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        if let Some(level) = update.cooking_level {
            self.cooking_level = level;
        }
        if let Some(size) = update.family_size {
            self.family_size = size;
        }
    }

    /// Free-text location, falling back to the country.
    pub fn display_location(&self) -> Option<&str> {
        [self.location.as_str(), self.country.as_str()]
            .into_iter()
            .find(|s| !s.trim().is_empty())
    }
}

/// Health and dietary profile of a user.
///
/// `bmr` and `daily_calorie_target` are derived by [`crate::nutrition`] and
/// are `None` unless height, weight, age and gender are all known.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub health_conditions: Vec<ReferenceItem>,
    pub allergies: Vec<ReferenceItem>,
    pub dietary_preferences: Vec<ReferenceItem>,
    pub fitness_goals: Vec<FitnessGoal>,
    pub activity_level: ActivityLevel,
    /// Cuisine ids the user prefers.
    pub favorite_cuisines: Vec<i64>,
    pub disliked_ingredients: Vec<String>,
    pub bmr: Option<i64>,
    pub daily_calorie_target: Option<i64>,
}

/// Request body for PUT /me/profile. Replaces the whole profile.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub health_condition_ids: Vec<i64>,
    #[serde(default)]
    pub allergy_ids: Vec<i64>,
    #[serde(default)]
    pub dietary_preference_ids: Vec<i64>,
    #[serde(default)]
    pub fitness_goal_ids: Vec<i64>,
    #[serde(default)]
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub favorite_cuisines: Vec<i64>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub disliked_ingredients: Vec<String>,
}

// ============================================================================
// User recipe interactions
// ============================================================================

/// A user's relationship to one recipe.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecipe {
    pub id: i64,
    pub user_id: i64,
    pub recipe_id: i64,
    pub recipe_name: String,
    pub status: UserRecipeStatus,
    pub is_favorite: bool,
    pub times_cooked: u32,
    pub last_cooked: Option<DateTime<Utc>>,
    pub personal_notes: String,
    pub modifications: Vec<String>,
    pub cooking_started_at: Option<DateTime<Utc>>,
    pub cooking_completed_at: Option<DateTime<Utc>>,
    /// Actual duration of the last completed session in minutes.
    pub cooking_duration: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for PATCH /recipes/:id/interaction.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserRecipeUpdate {
    #[serde(default)]
    pub status: Option<UserRecipeStatus>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub personal_notes: Option<String>,
    #[serde(default)]
    pub modifications: Option<Vec<String>>,
    #[serde(default)]
    pub cooking_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cooking_completed_at: Option<DateTime<Utc>>,
}

impl UserRecipe {
    /// Apply an interaction update, completing a cooking session if one ends.
    ///
    /// A session completes when a completion time arrives while a start time
    /// exists and no completion is recorded yet. Completion derives the
    /// duration, bumps `times_cooked`, stamps `last_cooked` and sets the
    /// status to `completed`. Repeating the completion is a no-op; a new
    /// start time opens a new session.
    ///
    /// Returns `true` when this update completed a session.
    pub fn apply(&mut self, update: UserRecipeUpdate) -> Result<bool, AppError> {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(favorite) = update.is_favorite {
            self.is_favorite = favorite;
        }
        if let Some(notes) = update.personal_notes {
            self.personal_notes = notes;
        }
        if let Some(modifications) = update.modifications {
            self.modifications = modifications;
        }

        if let Some(started) = update.cooking_started_at {
            if self.cooking_started_at != Some(started) {
                self.cooking_started_at = Some(started);
                self.cooking_completed_at = None;
                self.cooking_duration = None;
            }
        }

        let Some(completed) = update.cooking_completed_at else {
            return Ok(false);
        };
        let Some(started) = self.cooking_started_at else {
            return Ok(false);
        };
        if self.cooking_completed_at.is_some() {
            return Ok(false);
        }
        if completed < started {
            return Err(AppError::BadRequest(
                "cooking_completed_at must not precede cooking_started_at".to_string(),
            ));
        }

        self.cooking_completed_at = Some(completed);
        self.cooking_duration = Some((completed - started).num_minutes());
        self.times_cooked += 1;
        self.last_cooked = Some(completed);
        self.status = UserRecipeStatus::Completed;
        Ok(true)
    }
}

/// Query parameters for GET /me/recipes.
#[derive(Debug, Default, Deserialize)]
pub struct UserRecipeQuery {
    pub status: Option<UserRecipeStatus>,
    pub is_favorite: Option<bool>,
}

// ============================================================================
// Collections
// ============================================================================

/// A user-curated, named set of recipes.
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub recipe_ids: Vec<i64>,
    pub recipe_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for POST /collections.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCollection {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

/// Request body for PATCH /collections/:id.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CollectionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

// ============================================================================
// Meal plans
// ============================================================================

/// A dated plan of meals owned by one user.
#[derive(Debug, Clone, Serialize)]
pub struct MealPlan {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    /// Ordered by date, then by meal of the day.
    pub entries: Vec<MealPlanEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recipe scheduled for a meal on a day of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct MealPlanEntry {
    pub id: i64,
    pub meal_plan_id: i64,
    pub recipe_id: i64,
    pub recipe_name: String,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub servings: u32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /meal-plans.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMealPlan {
    #[serde(default = "default_meal_plan_name")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_meal_plan_name() -> String {
    "My Meal Plan".to_string()
}

/// Request body for PATCH /meal-plans/:id.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MealPlanUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl MealPlan {
    /// Apply a partial update, rejecting a range that ends before it starts
    /// or that leaves existing entries outside it.
    pub fn apply(&mut self, update: MealPlanUpdate) -> Result<(), AppError> {
        let start = update.start_date.unwrap_or(self.start_date);
        let end = update.end_date.unwrap_or(self.end_date);
        check_plan_dates(start, end)?;
        if self.entries.iter().any(|e| e.date < start || e.date > end) {
            return Err(AppError::BadRequest(
                "the new dates would leave planned meals outside the plan".to_string(),
            ));
        }

        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.start_date = start;
        self.end_date = end;
        Ok(())
    }

    /// Whether `date` falls inside the plan, both ends included.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A plan's end date may equal its start date but not precede it.
pub fn check_plan_dates(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::BadRequest(
            "end_date must not precede start_date".to_string(),
        ));
    }
    Ok(())
}

/// Request body for POST /meal-plans/:id/entries.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMealPlanEntry {
    pub recipe_id: i64,
    pub date: NaiveDate,
    pub meal_type: MealType,
    #[serde(default = "default_entry_servings")]
    #[validate(range(min = 1, max = 50))]
    pub servings: u32,
    #[serde(default)]
    pub notes: String,
}

fn default_entry_servings() -> u32 {
    1
}

/// Request body for PATCH /meal-plan-entries/:id.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MealPlanEntryUpdate {
    #[serde(default)]
    pub recipe_id: Option<i64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    #[serde(default)]
    #[validate(range(min = 1, max = 50))]
    pub servings: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MealPlanEntry {
    pub fn apply(&mut self, update: MealPlanEntryUpdate) {
        if let Some(recipe_id) = update.recipe_id {
            self.recipe_id = recipe_id;
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(meal_type) = update.meal_type {
            self.meal_type = meal_type;
        }
        if let Some(servings) = update.servings {
            self.servings = servings;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
    }
}

// ============================================================================
// Shopping lists
// ============================================================================

/// A named shopping list owned by one user.
#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub is_active: bool,
    /// Ordered by category, then name.
    pub items: Vec<ShoppingListItem>,
    /// Sum of the estimated prices of items not yet purchased.
    pub estimated_remaining: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListItem {
    pub id: i64,
    pub shopping_list_id: i64,
    pub name: String,
    /// Free text such as "2 kg" or "a bunch".
    pub quantity: String,
    pub category: String,
    pub is_purchased: bool,
    pub estimated_price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /shopping-lists.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewShoppingList {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request body for PATCH /shopping-lists/:id.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ShoppingListUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Request body for POST /shopping-lists/:id/items.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewShoppingListItem {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub quantity: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub category: String,
    #[serde(default)]
    pub is_purchased: bool,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 99_999_999.99))]
    pub estimated_price: Option<f64>,
}

/// Request body for PATCH /shopping-list-items/:id.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ShoppingListItemUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub quantity: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub category: Option<String>,
    #[serde(default)]
    pub is_purchased: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 99_999_999.99))]
    pub estimated_price: Option<f64>,
}

impl ShoppingListItem {
    pub fn apply(&mut self, update: ShoppingListItemUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(quantity) = update.quantity {
            self.quantity = quantity;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(purchased) = update.is_purchased {
            self.is_purchased = purchased;
        }
        if update.estimated_price.is_some() {
            self.estimated_price = update.estimated_price;
        }
    }
}

/// Prices are kept to the cent.
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

// ============================================================================
// Search and recommendations
// ============================================================================

/// Request body for POST /recipes/search.
///
/// Every field is optional; absent fields impose no constraint.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SearchRequest {
    /// Case-insensitive substring over name, description and tags.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub cuisine: Option<i64>,
    #[serde(default)]
    pub region: Option<i64>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub meal_type: Option<MealType>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_prep_time: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_cook_time: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_total_time: Option<u32>,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0))]
    pub min_rating: Option<f64>,

    /// Recipe must carry all of these labels.
    #[serde(default)]
    pub dietary_labels: Vec<String>,
    /// Recipe must carry none of these allergens.
    #[serde(default)]
    pub exclude_allergens: Vec<String>,
    /// Recipe must mention all of these ingredients.
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Recipe must mention none of these ingredients.
    #[serde(default)]
    pub exclude_ingredients: Vec<String>,
}

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub count: usize,
    pub page: u32,
    pub page_size: u32,
}

/// Request body for POST /recipes/recommendations.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub meal_type: Option<MealType>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_prep_time: Option<u32>,

    /// Additional allergens to exclude on top of the profile's allergies.
    #[serde(default)]
    pub exclude_allergens: Vec<String>,

    /// Overrides the profile's favorite cuisines when present.
    #[serde(default)]
    pub favorite_cuisines: Option<Vec<i64>>,

    /// Overrides the account's cooking level when present.
    #[serde(default)]
    pub cooking_level: Option<CookingLevel>,

    #[serde(default = "default_recommendation_count")]
    #[validate(range(min = 1, max = 50))]
    pub count: u32,
}

fn default_recommendation_count() -> u32 {
    10
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self {
            meal_type: None,
            max_prep_time: None,
            exclude_allergens: Vec::new(),
            favorite_cuisines: None,
            cooking_level: None,
            count: default_recommendation_count(),
        }
    }
}

// ============================================================================
// AI logs
// ============================================================================

/// Kind of call made through the AI gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    RecommendationRequest,
    MealPlanGeneration,
    IngredientSubstitution,
    CulturalQuery,
}

string_enum!(InteractionType, "interaction type", {
    RecommendationRequest => "recommendation_request",
    MealPlanGeneration => "meal_plan_generation",
    IngredientSubstitution => "ingredient_substitution",
    CulturalQuery => "cultural_query",
});

/// Kind of stored AI recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    MealPlan,
    Recipe,
    IngredientSubstitute,
    CulturalInsight,
}

string_enum!(RecommendationType, "recommendation type", {
    MealPlan => "meal_plan",
    Recipe => "recipe",
    IngredientSubstitute => "ingredient_substitute",
    CulturalInsight => "cultural_insight",
});

/// One call through the AI gateway, successful or not.
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub user_id: i64,
    pub interaction_type: InteractionType,
    pub user_input: serde_json::Value,
    pub context_data: serde_json::Value,
    pub ai_model_used: String,
    pub ai_response: serde_json::Value,
    pub is_fallback: bool,
    pub confidence_score: f64,
    pub processing_time_ms: i64,
    pub tokens_used: Option<i64>,
}

/// A generated recommendation to persist for history and feedback.
#[derive(Debug, Clone)]
pub struct NewAiRecommendation {
    pub user_id: i64,
    pub recommendation_type: RecommendationType,
    pub content: serde_json::Value,
    pub confidence_score: f64,
    pub user_context: serde_json::Value,
}

/// A stored AI recommendation as returned by GET /ai/history.
#[derive(Debug, Clone, Serialize)]
pub struct AiRecommendationRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub content: serde_json::Value,
    pub confidence_score: f64,
    pub user_rating: Option<u8>,
    pub user_feedback: String,
    pub was_helpful: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /ai/feedback.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedbackRequest {
    pub recommendation_id: i64,
    #[serde(default)]
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<u8>,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub feedback: String,
    #[serde(default)]
    pub was_helpful: Option<bool>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Counts per recipe difficulty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DifficultyBreakdown {
    pub easy: i64,
    pub medium: i64,
    pub hard: i64,
}

/// A cuisine and how many of the user's recipes belong to it.
#[derive(Debug, Clone, Serialize)]
pub struct CuisineCount {
    pub cuisine: String,
    pub count: i64,
}

/// Response for GET /me/stats.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipeStats {
    pub total_recipes_available: i64,
    pub saved_recipes: i64,
    pub planned_recipes: i64,
    pub completed_recipes: i64,
    pub favorite_recipes: i64,
    /// Sum of recorded cooking durations in minutes.
    pub total_cooking_time: i64,
    pub recipes_by_difficulty: DifficultyBreakdown,
    /// Top five cuisines among the user's recipes.
    pub recipes_by_cuisine: Vec<CuisineCount>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_recipe() -> UserRecipe {
        let now = Utc::now();
        UserRecipe {
            id: 1,
            user_id: 1,
            recipe_id: 1,
            recipe_name: "Jollof Rice".to_string(),
            status: UserRecipeStatus::Saved,
            is_favorite: false,
            times_cooked: 0,
            last_cooked: None,
            personal_notes: String::new(),
            modifications: vec![],
            cooking_started_at: None,
            cooking_completed_at: None,
            cooking_duration: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cooking_level_difficulties() {
        assert_eq!(
            CookingLevel::Beginner.allowed_difficulties(),
            &[Difficulty::Easy]
        );
        assert_eq!(
            CookingLevel::Intermediate.allowed_difficulties(),
            &[Difficulty::Easy, Difficulty::Medium]
        );
        assert_eq!(
            CookingLevel::Advanced.allowed_difficulties(),
            CookingLevel::Expert.allowed_difficulties()
        );
        assert!(
            CookingLevel::Expert
                .allowed_difficulties()
                .contains(&Difficulty::Hard)
        );
    }

    #[test]
    fn test_enum_round_trip_through_strings() {
        assert_eq!("medium".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!(MealType::Beverage.as_str(), "beverage");
        assert_eq!("P".parse::<Gender>(), Ok(Gender::P));
        assert!("spicy".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Jollof Rice"), "jollof-rice");
        assert_eq!(slugify("  Egusi -- Soup!  "), "egusi-soup");
        assert_eq!(slugify("Doro Wat (Spicy)"), "doro-wat-spicy");
    }

    #[test]
    fn test_total_time_defaults_to_prep_plus_cook() {
        let recipe: NewRecipe = serde_json::from_value(serde_json::json!({
            "name": "Akara",
            "cuisine_id": 1,
            "prep_time": 15,
            "cook_time": 20,
            "difficulty": "easy",
            "meal_type": "breakfast",
            "ingredients": [{"name": "black-eyed peas", "quantity": 2, "unit": "cups"}],
            "instructions": [{"step_number": 1, "instruction": "Blend and fry"}]
        }))
        .unwrap();

        assert_eq!(recipe.effective_total_time(), 35);
        assert_eq!(recipe.effective_slug(), "akara");
        assert_eq!(recipe.servings, 4);
        assert!(recipe.is_published);
    }

    #[test]
    fn test_cooking_session_completion() {
        let mut ur = user_recipe();
        let start = Utc::now() - Duration::minutes(45);

        let completed = ur
            .apply(UserRecipeUpdate {
                cooking_started_at: Some(start),
                ..Default::default()
            })
            .unwrap();
        assert!(!completed);

        let end = start + Duration::minutes(42);
        let completed = ur
            .apply(UserRecipeUpdate {
                cooking_completed_at: Some(end),
                ..Default::default()
            })
            .unwrap();

        assert!(completed);
        assert_eq!(ur.cooking_duration, Some(42));
        assert_eq!(ur.times_cooked, 1);
        assert_eq!(ur.last_cooked, Some(end));
        assert_eq!(ur.status, UserRecipeStatus::Completed);
    }

    #[test]
    fn test_cooking_session_completion_is_idempotent() {
        let mut ur = user_recipe();
        let start = Utc::now() - Duration::minutes(30);
        let end = start + Duration::minutes(30);
        let update = UserRecipeUpdate {
            cooking_started_at: Some(start),
            cooking_completed_at: Some(end),
            ..Default::default()
        };

        assert!(ur.apply(update.clone()).unwrap());
        assert!(!ur.apply(update).unwrap());
        assert_eq!(ur.times_cooked, 1);
    }

    #[test]
    fn test_new_session_after_completion() {
        let mut ur = user_recipe();
        let start = Utc::now() - Duration::hours(5);
        ur.apply(UserRecipeUpdate {
            cooking_started_at: Some(start),
            cooking_completed_at: Some(start + Duration::minutes(20)),
            ..Default::default()
        })
        .unwrap();

        let second = start + Duration::hours(2);
        assert!(
            ur.apply(UserRecipeUpdate {
                cooking_started_at: Some(second),
                cooking_completed_at: Some(second + Duration::minutes(50)),
                ..Default::default()
            })
            .unwrap()
        );
        assert_eq!(ur.times_cooked, 2);
        assert_eq!(ur.cooking_duration, Some(50));
    }

    #[test]
    fn test_completion_without_start_is_ignored() {
        let mut ur = user_recipe();
        let completed = ur
            .apply(UserRecipeUpdate {
                cooking_completed_at: Some(Utc::now()),
                ..Default::default()
            })
            .unwrap();

        assert!(!completed);
        assert_eq!(ur.times_cooked, 0);
        assert!(ur.cooking_completed_at.is_none());
    }

    #[test]
    fn test_completion_before_start_is_rejected() {
        let mut ur = user_recipe();
        let start = Utc::now();
        let result = ur.apply(UserRecipeUpdate {
            cooking_started_at: Some(start),
            cooking_completed_at: Some(start - Duration::minutes(1)),
            ..Default::default()
        });

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_recommendation_count_bounds() {
        let request = RecommendationRequest {
            count: 51,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = RecommendationRequest {
            count: 0,
            ..Default::default()
        };
        assert!(request.validate().is_err());

        assert!(RecommendationRequest::default().validate().is_ok());
    }

    #[test]
    fn test_recipe_edit_recomputes_total_time() {
        let mut recipe: Recipe = serde_json::from_value(serde_json::json!({
            "id": 1, "name": "Akara", "slug": "akara", "description": "",
            "cuisine_id": 1, "cuisine_name": "Nigerian", "region_id": 1, "region_name": "West Africa",
            "prep_time": 15, "cook_time": 20, "total_time": 35, "servings": 4,
            "difficulty": "easy", "meal_type": "breakfast",
            "ingredients": [], "instructions": [], "calories_per_serving": null,
            "tags": [], "dietary_labels": [], "allergen_warnings": [],
            "created_by": 1, "is_published": true, "is_featured": false,
            "average_rating": 4.5, "total_ratings": 2,
            "created_at": "2026-01-01T00:00:00Z", "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        recipe.apply(RecipeUpdate {
            cook_time: Some(25),
            slug: Some("Akara Balls".to_string()),
            ..Default::default()
        });
        assert_eq!(recipe.total_time, 40);
        assert_eq!(recipe.slug, "akara-balls");
        assert_eq!(recipe.name, "Akara");

        recipe.apply(RecipeUpdate {
            total_time: Some(60),
            ..Default::default()
        });
        assert_eq!(recipe.total_time, 60);

        recipe.apply(RecipeUpdate {
            name: Some("Akara Fritters".to_string()),
            ..Default::default()
        });
        assert_eq!(recipe.total_time, 60);
        assert_eq!(recipe.average_rating, 4.5);
        assert_eq!(recipe.total_ratings, 2);
    }

    #[test]
    fn test_recipe_update_rejects_empty_ingredients() {
        let update = RecipeUpdate {
            ingredients: Some(vec![]),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(RecipeUpdate::default().validate().is_ok());
    }

    #[test]
    fn test_meal_plan_dates() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let new: NewMealPlan = serde_json::from_value(serde_json::json!({
            "start_date": "2026-03-02",
            "end_date": "2026-03-08"
        }))
        .unwrap();
        assert_eq!(new.name, "My Meal Plan");
        assert!(new.is_active);

        assert!(check_plan_dates(day(2), day(2)).is_ok());
        assert!(matches!(
            check_plan_dates(day(8), day(2)),
            Err(AppError::BadRequest(_))
        ));

        let now = Utc::now();
        let mut plan = MealPlan {
            id: 1,
            user_id: 1,
            name: new.name,
            start_date: new.start_date,
            end_date: new.end_date,
            is_active: true,
            entries: vec![MealPlanEntry {
                id: 1,
                meal_plan_id: 1,
                recipe_id: 1,
                recipe_name: "Jollof Rice".to_string(),
                date: day(5),
                meal_type: MealType::Dinner,
                servings: 2,
                notes: String::new(),
                created_at: now,
            }],
            created_at: now,
            updated_at: now,
        };
        assert!(plan.covers(day(8)));
        assert!(!plan.covers(day(9)));

        let shrink = MealPlanUpdate {
            end_date: Some(day(4)),
            ..Default::default()
        };
        assert!(matches!(plan.apply(shrink), Err(AppError::BadRequest(_))));
        assert_eq!(plan.end_date, day(8));

        plan.apply(MealPlanUpdate {
            end_date: Some(day(5)),
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(plan.end_date, day(5));
        assert!(!plan.is_active);
    }

    #[test]
    fn test_meals_sort_in_day_order() {
        let mut meals = vec![MealType::Snack, MealType::Dinner, MealType::Breakfast, MealType::Lunch];
        meals.sort();
        assert_eq!(
            meals,
            vec![MealType::Breakfast, MealType::Lunch, MealType::Dinner, MealType::Snack]
        );
    }

    #[test]
    fn test_prices_round_to_cents() {
        assert_eq!(round_price(2.499), 2.5);
        assert_eq!(round_price(10.0), 10.0);
        assert_eq!(round_price(0.004), 0.0);
    }
}
