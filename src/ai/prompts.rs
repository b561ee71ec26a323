//! User context and prompt templates.
//!
//! Prompts are plain string templates: the same context and request always
//! render the same text.

use chrono::NaiveDate;
use serde::Serialize;

use crate::ai::schema::{AiRecommendationRequest, MealPlanRequest, SubstituteRequest};
use crate::model::{ActivityLevel, CookingLevel, Recipe, UserAccount, UserProfile};
use crate::nutrition::age_on;

pub const RECOMMENDATION_SYSTEM: &str = "You are an expert African cuisine nutritionist and \
cultural food advisor. Provide personalized meal recommendations that respect cultural \
traditions while meeting health goals. Reply with JSON only.";

pub const MEAL_PLAN_SYSTEM: &str = "You are an expert African cuisine meal planner with deep \
knowledge of traditional recipes, nutrition, and cultural food practices. Reply with JSON only.";

pub const SUBSTITUTE_SYSTEM: &str = "You are an expert in African ingredients and traditional \
cooking methods with deep knowledge of regional availability and cultural significance. \
Reply with JSON only.";

pub const CULTURAL_INSIGHT_SYSTEM: &str = "You are a cultural anthropologist and food historian \
specializing in African cuisine. Reply with JSON only.";

/// What the model is told about the user.
///
/// Contains health data; it is stored with interaction logs but never
/// written to the application log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserContext {
    pub cooking_level: CookingLevel,
    pub family_size: u32,
    pub location: Option<String>,
    pub age: Option<u32>,
    pub health_goals: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub allergies: Vec<String>,
    pub daily_calorie_target: Option<i64>,
    pub activity_level: ActivityLevel,
}

impl UserContext {
    pub fn new(account: &UserAccount, profile: &UserProfile, today: NaiveDate) -> Self {
        Self {
            cooking_level: account.cooking_level,
            family_size: account.family_size,
            location: account.display_location().map(str::to_string),
            age: account.date_of_birth.and_then(|dob| age_on(dob, today)),
            health_goals: profile.fitness_goals.iter().map(|g| g.name.clone()).collect(),
            dietary_restrictions: profile
                .dietary_preferences
                .iter()
                .map(|p| p.name.clone())
                .collect(),
            allergies: profile.allergies.iter().map(|a| a.name.clone()).collect(),
            daily_calorie_target: profile.daily_calorie_target,
            activity_level: profile.activity_level,
        }
    }

    fn location_or(&self, default: &str) -> String {
        self.location.clone().unwrap_or_else(|| default.to_string())
    }
}

fn joined(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

fn calorie_line(context: &UserContext) -> String {
    match context.daily_calorie_target {
        Some(kcal) => format!("{kcal} kcal per day"),
        None => "not set".to_string(),
    }
}

pub fn recommendation_prompt(context: &UserContext, request: &AiRecommendationRequest) -> String {
    let meal_type = request
        .meal_type
        .map(|m| m.to_string())
        .unwrap_or_else(|| "any".to_string());

    format!(
        r#"Recommend {count} African recipes for a user with this profile:

User Profile:
- Cooking Level: {level}
- Family Size: {family} people
- Location: {location}
- Activity Level: {activity}
- Daily Calorie Target: {calories}
- Health Goals: {goals}
- Dietary Restrictions: {restrictions}
- Allergies to avoid: {allergies}

Request Specifics:
- Meal Type: {meal_type}
- Max Prep Time: {prep} minutes
- Preferred Regions: {regions}

Reply with a JSON array. Each element must be an object with the keys
"name", "description", "origin", "prep_time", "cook_time", "difficulty",
"key_ingredients", "health_benefits", "cultural_significance",
"why_it_matches" and "confidence" (0 to 1)."#,
        count = request.effective_count(),
        level = context.cooking_level,
        family = context.family_size,
        location = context.location_or("Africa"),
        activity = context.activity_level,
        calories = calorie_line(context),
        goals = joined(&context.health_goals, "none"),
        restrictions = joined(&context.dietary_restrictions, "none"),
        allergies = joined(&context.allergies, "none"),
        prep = request.max_prep_time.unwrap_or(60),
        regions = joined(&request.preferred_regions, "Any"),
    )
}

pub fn meal_plan_prompt(context: &UserContext, request: &MealPlanRequest) -> String {
    format!(
        r#"Create a {days}-day African meal plan for a user with the following profile:

User Profile:
- Cooking Level: {level}
- Family Size: {family}
- Daily Calorie Target: {calories}
- Health Goals: {goals}
- Dietary Restrictions: {restrictions}
- Allergies to avoid: {allergies}
- Budget: {budget}
- Prep Time Preference: {prep} minutes max

Requirements:
1. Include breakfast, lunch, and dinner for each day
2. Ensure nutritional balance and variety
3. Respect cultural authenticity
4. Consider seasonal ingredients
5. Organize the shopping list by category
6. Include prep tips for busy days

Reply with JSON of this shape:
{{
    "meal_plan": {{"day_01": {{"breakfast": "...", "lunch": "...", "dinner": "..."}}}},
    "shopping_list": [{{"category": "Proteins", "items": ["..."]}}],
    "prep_tips": ["..."],
    "nutritional_summary": {{"calories": 0}},
    "cultural_notes": ["..."]
}}"#,
        days = request.effective_days(),
        level = context.cooking_level,
        family = context.family_size,
        calories = calorie_line(context),
        goals = joined(&context.health_goals, "none"),
        restrictions = joined(&context.dietary_restrictions, "none"),
        allergies = joined(&context.allergies, "none"),
        budget = request.budget,
        prep = request.max_prep_time,
    )
}

pub fn substitute_prompt(context: &UserContext, request: &SubstituteRequest) -> String {
    format!(
        r#"Find suitable African ingredient substitutes for "{ingredient}" considering:

User Context:
- Location: {location}
- Dietary Restrictions: {restrictions}
- Allergies: {allergies}
- Recipe Context: {recipe}
- Cooking Method: {method}
- Cuisine: {cuisine}

Provide 3-5 authentic African alternatives with their availability in
different African regions, flavor profile comparison, quantity conversion
ratio and cultural significance.

Reply with JSON of this shape:
{{
    "substitutes": [
        {{
            "name": "...",
            "availability": "...",
            "flavor_profile": "...",
            "conversion_ratio": "...",
            "cultural_note": "...",
            "confidence": 0.9
        }}
    ],
    "general_tips": ["..."],
    "cultural_context": "..."
}}"#,
        ingredient = request.ingredient,
        location = context.location_or("Africa"),
        restrictions = joined(&context.dietary_restrictions, "none"),
        allergies = joined(&context.allergies, "none"),
        recipe = request.recipe_name.as_deref().unwrap_or("General cooking"),
        method = request.cooking_method.as_deref().unwrap_or("Various"),
        cuisine = request.cuisine_type.as_deref().unwrap_or("Any"),
    )
}

pub fn cultural_insight_prompt(recipe: &Recipe) -> String {
    let ingredients: Vec<String> = recipe
        .ingredients
        .iter()
        .take(10)
        .map(|i| i.name.clone())
        .collect();

    format!(
        r#"Provide rich cultural context for the African dish "{name}" from {region}:

Recipe Details:
- Name: {name}
- Region: {region}
- Cuisine: {cuisine}
- Ingredients: {ingredients}

Cover its historical origins, cultural significance, regional variations,
traditional occasions, cooking traditions, nutritional wisdom and modern
adaptations.

Reply with JSON of this shape:
{{
    "title": "Cultural Heritage of {name}",
    "historical_origin": "...",
    "cultural_significance": "...",
    "traditional_occasions": ["..."],
    "regional_variations": {{"Place": "..."}},
    "cooking_traditions": "...",
    "nutritional_wisdom": "...",
    "modern_adaptations": "...",
    "interesting_facts": ["..."]
}}"#,
        name = recipe.name,
        region = recipe.region_name,
        cuisine = recipe.cuisine_name,
        ingredients = joined(&ingredients, "unknown"),
    )
}
