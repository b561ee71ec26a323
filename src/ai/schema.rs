//! Request bodies and strict reply schemas for the AI gateway.
//!
//! A model reply is trusted only after it deserializes into one of the reply
//! types here and passes validation. Any mismatch is treated exactly like a
//! transport failure. Every reply type carries a `fallback` flag that the
//! model cannot set; it is only true on locally built output.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::model::{MealType, Recipe};

/// Upper bound on AI recipe recommendations per request.
pub const MAX_AI_RECOMMENDATIONS: u32 = 20;

/// Upper bound on meal plan length in days.
pub const MAX_MEAL_PLAN_DAYS: u32 = 14;

// ============================================================================
// Requests
// ============================================================================

/// Request body for POST /ai/recommendations.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AiRecommendationRequest {
    #[serde(default)]
    pub meal_type: Option<MealType>,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_prep_time: Option<u32>,

    #[serde(default)]
    pub preferred_regions: Vec<String>,

    /// Clamped to 1..=[`MAX_AI_RECOMMENDATIONS`].
    #[serde(default = "default_ai_count")]
    pub count: u32,
}

fn default_ai_count() -> u32 {
    5
}

impl AiRecommendationRequest {
    pub fn effective_count(&self) -> u32 {
        self.count.clamp(1, MAX_AI_RECOMMENDATIONS)
    }
}

/// Request body for POST /ai/meal-plan.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MealPlanRequest {
    /// Clamped to 1..=[`MAX_MEAL_PLAN_DAYS`].
    #[serde(default = "default_days")]
    pub days: u32,

    #[serde(default = "default_budget")]
    #[validate(length(min = 1, max = 50))]
    pub budget: String,

    #[serde(default = "default_plan_prep_time")]
    #[validate(range(min = 1))]
    pub max_prep_time: u32,
}

fn default_days() -> u32 {
    7
}

fn default_budget() -> String {
    "moderate".to_string()
}

fn default_plan_prep_time() -> u32 {
    60
}

impl MealPlanRequest {
    pub fn effective_days(&self) -> u32 {
        self.days.clamp(1, MAX_MEAL_PLAN_DAYS)
    }
}

/// Request body for POST /ai/ingredient-substitutes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubstituteRequest {
    #[validate(length(min = 1, max = 200))]
    pub ingredient: String,
    #[serde(default)]
    pub recipe_name: Option<String>,
    #[serde(default)]
    pub cooking_method: Option<String>,
    #[serde(default)]
    pub cuisine_type: Option<String>,
}

/// Request body for POST /ai/cultural-insight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CulturalInsightRequest {
    pub recipe_id: i64,
}

// ============================================================================
// Replies
// ============================================================================

/// One recipe suggested by the model, or by the local fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecipeSuggestion {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub description: String,

    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub prep_time: Option<u32>,
    #[serde(default)]
    pub cook_time: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub health_benefits: Vec<String>,
    #[serde(default)]
    pub cultural_significance: String,
    #[serde(default)]
    pub why_it_matches: String,

    /// Catalog recipe this suggestion refers to, for local suggestions.
    #[serde(default, skip_deserializing)]
    pub recipe_id: Option<i64>,

    #[serde(default = "default_suggestion_confidence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

fn default_suggestion_confidence() -> f64 {
    0.8
}

impl RecipeSuggestion {
    /// A suggestion pointing at a catalog recipe.
    pub fn from_recipe(recipe: &Recipe, confidence: f64) -> Self {
        let description = if recipe.description.trim().is_empty() {
            format!("A {} dish from {}.", recipe.cuisine_name, recipe.region_name)
        } else {
            recipe.description.clone()
        };

        Self {
            name: recipe.name.clone(),
            description,
            origin: format!("{}, {}", recipe.cuisine_name, recipe.region_name),
            prep_time: Some(recipe.prep_time),
            cook_time: Some(recipe.cook_time),
            difficulty: Some(recipe.difficulty.to_string()),
            key_ingredients: recipe
                .ingredients
                .iter()
                .take(5)
                .map(|i| i.name.clone())
                .collect(),
            health_benefits: Vec::new(),
            cultural_significance: String::new(),
            why_it_matches: String::new(),
            recipe_id: Some(recipe.id),
            confidence,
        }
    }
}

/// Models answer either with a bare array or with a wrapping object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuggestionList {
    Bare(Vec<RecipeSuggestion>),
    Wrapped {
        recommendations: Vec<RecipeSuggestion>,
    },
}

/// Parsed model output for recipe recommendations.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(from = "SuggestionList")]
pub struct SuggestionReply {
    #[validate(length(min = 1), nested)]
    pub recommendations: Vec<RecipeSuggestion>,
}

impl From<SuggestionList> for SuggestionReply {
    fn from(list: SuggestionList) -> Self {
        let recommendations = match list {
            SuggestionList::Bare(items) => items,
            SuggestionList::Wrapped { recommendations } => recommendations,
        };
        Self { recommendations }
    }
}

/// Response of POST /ai/recommendations.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationsReply {
    pub recommendations: Vec<RecipeSuggestion>,
    pub confidence_score: f64,
    pub processing_time_ms: i64,
    pub fallback: bool,
}

/// The three main meals of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DayMeals {
    #[validate(length(min = 1))]
    pub breakfast: String,
    #[validate(length(min = 1))]
    pub lunch: String,
    #[validate(length(min = 1))]
    pub dinner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCategory {
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// A multi-day meal plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MealPlan {
    /// Day key (e.g. "monday" or "day_01") to that day's meals.
    #[validate(custom(function = "validate_days"))]
    pub meal_plan: BTreeMap<String, DayMeals>,

    #[serde(default)]
    pub shopping_list: Vec<ShoppingCategory>,
    #[serde(default)]
    pub prep_tips: Vec<String>,
    /// Free-form nutrient name to amount.
    #[serde(default)]
    pub nutritional_summary: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub cultural_notes: Vec<String>,

    #[serde(default, skip_deserializing)]
    pub fallback: bool,
}

fn validate_days(days: &BTreeMap<String, DayMeals>) -> Result<(), ValidationError> {
    if days.is_empty() {
        return Err(ValidationError::new("empty_meal_plan"));
    }
    if days.values().any(|meals| meals.validate().is_err()) {
        return Err(ValidationError::new("incomplete_day"));
    }
    Ok(())
}

/// Rotation used for locally built meal plans.
const FALLBACK_DAYS: &[(&str, &str, &str)] = &[
    ("Akara with Pap", "Jollof Rice", "Grilled Fish with Plantain"),
    ("Injera with Honey", "Couscous with Vegetables", "Chicken Tagine"),
    ("Koko with Koose", "Waakye", "Egusi Soup with Fufu"),
    ("Chapati with Tea", "Githeri", "Sukuma Wiki with Ugali"),
    ("Ful Medames", "Moin Moin with Rice", "Doro Wat with Injera"),
    ("Yam and Egg Sauce", "Red Red", "Pepper Soup"),
    ("Mandazi with Chai", "Thieboudienne", "Bobotie"),
];

impl MealPlan {
    /// Deterministic plan of `days` days keyed `day_01`, `day_02`, ...
    pub fn fallback(days: u32) -> Self {
        let meal_plan = (0..days.clamp(1, MAX_MEAL_PLAN_DAYS) as usize)
            .map(|i| {
                let (breakfast, lunch, dinner) = FALLBACK_DAYS[i % FALLBACK_DAYS.len()];
                (
                    format!("day_{:02}", i + 1),
                    DayMeals {
                        breakfast: breakfast.to_string(),
                        lunch: lunch.to_string(),
                        dinner: dinner.to_string(),
                    },
                )
            })
            .collect();

        Self {
            meal_plan,
            shopping_list: Vec::new(),
            prep_tips: vec![
                "Prepare ingredients in advance".to_string(),
                "Batch cook grains".to_string(),
            ],
            nutritional_summary: BTreeMap::new(),
            cultural_notes: Vec::new(),
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Substitute {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub flavor_profile: String,
    #[serde(default)]
    pub conversion_ratio: String,
    #[serde(default)]
    pub cultural_note: String,
    #[serde(default = "default_substitute_confidence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

fn default_substitute_confidence() -> f64 {
    0.5
}

/// Ingredient substitution advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SubstituteReply {
    #[validate(length(min = 1), nested)]
    pub substitutes: Vec<Substitute>,
    #[serde(default)]
    pub general_tips: Vec<String>,
    #[serde(default)]
    pub cultural_context: String,

    #[serde(default, skip_deserializing)]
    pub fallback: bool,
}

impl SubstituteReply {
    pub fn fallback(ingredient: &str) -> Self {
        Self {
            substitutes: vec![Substitute {
                name: format!("Alternative to {ingredient}"),
                availability: "Common".to_string(),
                flavor_profile: "Similar".to_string(),
                conversion_ratio: "1:1".to_string(),
                cultural_note: String::new(),
                confidence: default_substitute_confidence(),
            }],
            general_tips: Vec::new(),
            cultural_context: String::new(),
            fallback: true,
        }
    }
}

/// Cultural background of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CulturalInsight {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub historical_origin: String,
    #[validate(length(min = 1))]
    pub cultural_significance: String,

    #[serde(default)]
    pub traditional_occasions: Vec<String>,
    /// Place name to how the dish differs there.
    #[serde(default)]
    pub regional_variations: BTreeMap<String, String>,
    #[serde(default)]
    pub cooking_traditions: String,
    #[serde(default)]
    pub nutritional_wisdom: String,
    #[serde(default)]
    pub modern_adaptations: String,
    #[serde(default)]
    pub interesting_facts: Vec<String>,

    #[serde(default, skip_deserializing)]
    pub fallback: bool,
}

impl CulturalInsight {
    pub fn fallback(recipe: &Recipe) -> Self {
        Self {
            title: format!("Cultural Heritage of {}", recipe.name),
            historical_origin: format!(
                "{} is a traditional dish from {}.",
                recipe.name, recipe.region_name
            ),
            cultural_significance: "This dish holds special meaning in local traditions."
                .to_string(),
            traditional_occasions: Vec::new(),
            regional_variations: BTreeMap::new(),
            cooking_traditions: String::new(),
            nutritional_wisdom: String::new(),
            modern_adaptations: String::new(),
            interesting_facts: Vec::new(),
            fallback: true,
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Why a model reply was rejected.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("reply is not valid JSON for the expected shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply failed validation: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse and validate a model reply against `T`.
pub fn parse_reply<T>(content: &str) -> Result<T, SchemaError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_str(strip_code_fence(content))?;
    value.validate()?;
    Ok(value)
}
