//! HTTP API handlers for mealwise.
//!
//! # Authentication
//!
//! Token issuance happens upstream. Every `/me`, recipe, rating, collection,
//! meal plan, shopping list and AI route requires an `X-User-Id` header
//! naming an existing user; anything else is answered with `401`. Registration, reference data and
//! the health check are public.
//!
//! # Logging
//!
//! Handlers log ids and counts only. Request bodies that carry health data
//! (profiles, AI context) are skipped from spans.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::ai::AiGateway;
use crate::ai::prompts::UserContext;
use crate::ai::schema::{
    AiRecommendationRequest, CulturalInsight, CulturalInsightRequest,
    MealPlan as GeneratedMealPlan, MealPlanRequest, RecommendationsReply, SubstituteReply,
    SubstituteRequest,
};
use crate::error::{AppError, Result};
use crate::model::{
    AccountUpdate, AiRecommendationRecord, Collection, CollectionUpdate, Cuisine, FeedbackRequest,
    FitnessGoal, MealPlan, MealPlanEntry, MealPlanEntryUpdate, MealPlanUpdate, NewCollection,
    NewMealPlan, NewMealPlanEntry, NewRecipe, NewShoppingList, NewShoppingListItem, NewUser, Page,
    PageQuery, ProfileUpdate, Rating, RatingRequest, Recipe, RecipeStats, RecipeUpdate,
    RecommendationRequest, ReferenceItem, Region, SearchRequest, ShoppingList, ShoppingListItem,
    ShoppingListItemUpdate, ShoppingListUpdate, UserAccount, UserProfile, UserRecipe,
    UserRecipeQuery, UserRecipeUpdate,
};
use crate::recommend::{
    Personalization, RECENTLY_COMPLETED_LIMIT, candidate_pool_size, select,
};
use crate::search::{Pagination, RecipeFilter};
use crate::storage::{ReferenceKind, Storage};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Minimum rating count for the popular listing.
pub const POPULAR_MIN_RATINGS: i64 = 5;

/// Size of the popular listing.
pub const POPULAR_LIMIT: i64 = 20;

/// How many stored AI recommendations GET /ai/history returns.
pub const AI_HISTORY_LIMIT: i64 = 50;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub ai: AiGateway,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(create_user))
        .route("/me", get(get_me).patch(update_me))
        .route("/me/profile", get(get_profile).put(put_profile))
        .route("/me/recipes", get(list_my_recipes))
        .route("/me/stats", get(get_stats))
        .route("/regions", get(list_regions))
        .route("/cuisines", get(list_cuisines))
        .route("/allergies", get(list_allergies))
        .route("/dietary-preferences", get(list_dietary_preferences))
        .route("/fitness-goals", get(list_fitness_goals))
        .route("/health-conditions", get(list_health_conditions))
        .route("/recipes", post(create_recipe))
        .route("/recipes/featured", get(featured_recipes))
        .route("/recipes/popular", get(popular_recipes))
        .route("/recipes/search", post(search_recipes))
        .route("/recipes/recommendations", post(recommend_recipes))
        .route("/recipes/:id", get(get_recipe).patch(update_recipe))
        .route("/recipes/:id/ratings", get(list_ratings).post(create_rating))
        .route("/recipes/:id/save", post(save_recipe))
        .route("/recipes/:id/favorite", post(toggle_favorite))
        .route("/recipes/:id/interaction", patch(update_interaction))
        .route("/ratings/:id", put(update_rating).delete(delete_rating))
        .route("/collections", get(list_collections).post(create_collection))
        .route(
            "/collections/:id",
            get(get_collection)
                .patch(update_collection)
                .delete(delete_collection),
        )
        .route(
            "/collections/:id/recipes/:recipe_id",
            post(add_to_collection).delete(remove_from_collection),
        )
        .route("/meal-plans", get(list_meal_plans).post(create_meal_plan))
        .route(
            "/meal-plans/:id",
            get(get_meal_plan)
                .patch(update_meal_plan)
                .delete(delete_meal_plan),
        )
        .route(
            "/meal-plans/:id/entries",
            get(list_meal_plan_entries).post(add_meal_plan_entry),
        )
        .route(
            "/meal-plan-entries/:id",
            get(get_meal_plan_entry)
                .patch(update_meal_plan_entry)
                .delete(delete_meal_plan_entry),
        )
        .route(
            "/shopping-lists",
            get(list_shopping_lists).post(create_shopping_list),
        )
        .route(
            "/shopping-lists/:id",
            get(get_shopping_list)
                .patch(update_shopping_list)
                .delete(delete_shopping_list),
        )
        .route(
            "/shopping-lists/:id/items",
            get(list_shopping_items).post(add_shopping_item),
        )
        .route(
            "/shopping-list-items/:id",
            get(get_shopping_item)
                .patch(update_shopping_item)
                .delete(delete_shopping_item),
        )
        .route("/ai/recommendations", post(ai_recommendations))
        .route("/ai/meal-plan", post(ai_meal_plan))
        .route("/ai/ingredient-substitutes", post(ai_ingredient_substitutes))
        .route("/ai/cultural-insight", post(ai_cultural_insight))
        .route("/ai/feedback", post(ai_feedback))
        .route("/ai/history", get(ai_history))
        .with_state(state)
}

/// The authenticated account named by the `X-User-Id` header.
pub struct CurrentUser(pub UserAccount);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or(AppError::Unauthorized)?;

        match state.storage.get_user(user_id).await? {
            Some(account) => Ok(CurrentUser(account)),
            None => {
                warn!(user_id, "Request for unknown user");
                Err(AppError::Unauthorized)
            }
        }
    }
}

fn validated<T: Validate>(value: T) -> Result<T> {
    value.validate()?;
    Ok(value)
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

// ============================================================================
// Accounts and profiles
// ============================================================================

/// POST /users - Register an account.
///
/// The email is stored lowercased and must be unique (`409` otherwise).
/// An empty profile is created alongside the account.
#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, Json<UserAccount>)> {
    let request = validated(request)?;
    let account = state.storage.create_user(&request).await?;

    info!(user_id = account.id, "User registered");
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /me
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserAccount> {
    Json(user)
}

/// PATCH /me - Update account fields. Absent fields are left unchanged.
///
/// Calorie targets on the profile are recomputed because they depend on
/// height, weight, age and gender.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<UserAccount>> {
    let update = validated(update)?;
    user.apply(update);

    let account = state
        .storage
        .update_user(&user, Utc::now().date_naive())
        .await?;
    info!("Account updated");
    Ok(Json(account))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.storage.get_profile(user.id).await?))
}

/// PUT /me/profile - Replace the profile.
///
/// Reference ids must exist (`400` otherwise). `bmr` and
/// `daily_calorie_target` are derived, never accepted from the client.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn put_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>> {
    let update = validated(update)?;
    let profile = state
        .storage
        .save_profile(&user, &update, Utc::now().date_naive())
        .await?;

    info!(
        has_calorie_target = profile.daily_calorie_target.is_some(),
        "Profile saved"
    );
    Ok(Json(profile))
}

/// GET /me/recipes - The user's recipe interactions.
///
/// # Query Parameters
///
/// - `status` (optional): saved, planned, cooking or completed
/// - `is_favorite` (optional): true or false
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_my_recipes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<UserRecipeQuery>,
) -> Result<Json<Vec<UserRecipe>>> {
    Ok(Json(state.storage.list_user_recipes(user.id, &query).await?))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<RecipeStats>> {
    Ok(Json(state.storage.recipe_stats(user.id).await?))
}

// ============================================================================
// Reference data
// ============================================================================

pub async fn list_regions(State(state): State<AppState>) -> Result<Json<Vec<Region>>> {
    Ok(Json(state.storage.list_regions().await?))
}

/// Query parameters for GET /cuisines.
#[derive(Debug, Deserialize)]
pub struct CuisineQuery {
    /// Restrict to one region.
    pub region: Option<i64>,
}

pub async fn list_cuisines(
    State(state): State<AppState>,
    Query(query): Query<CuisineQuery>,
) -> Result<Json<Vec<Cuisine>>> {
    Ok(Json(state.storage.list_cuisines(query.region).await?))
}

pub async fn list_allergies(State(state): State<AppState>) -> Result<Json<Vec<ReferenceItem>>> {
    Ok(Json(
        state
            .storage
            .list_reference_items(ReferenceKind::Allergy)
            .await?,
    ))
}

pub async fn list_dietary_preferences(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReferenceItem>>> {
    Ok(Json(
        state
            .storage
            .list_reference_items(ReferenceKind::DietaryPreference)
            .await?,
    ))
}

pub async fn list_health_conditions(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReferenceItem>>> {
    Ok(Json(
        state
            .storage
            .list_reference_items(ReferenceKind::HealthCondition)
            .await?,
    ))
}

pub async fn list_fitness_goals(State(state): State<AppState>) -> Result<Json<Vec<FitnessGoal>>> {
    Ok(Json(state.storage.list_fitness_goals().await?))
}

// ============================================================================
// Recipes
// ============================================================================

/// POST /recipes - Create a recipe owned by the caller.
///
/// The slug is derived from the name when absent; a duplicate slug is a
/// `409`. Aggregate rating fields always start at zero.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>)> {
    let request = validated(request)?;
    let recipe = state.storage.create_recipe(&request, Some(user.id)).await?;

    info!(recipe_id = recipe.id, slug = %recipe.slug, "Recipe created");
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip_all)]
pub async fn featured_recipes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Recipe>>> {
    Ok(Json(state.storage.list_featured_recipes().await?))
}

/// GET /recipes/popular - Published recipes with at least five ratings,
/// best first, at most twenty.
#[instrument(skip_all)]
pub async fn popular_recipes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Recipe>>> {
    Ok(Json(
        state
            .storage
            .list_popular_recipes(POPULAR_MIN_RATINGS, POPULAR_LIMIT)
            .await?,
    ))
}

/// POST /recipes/search - Filter the published catalog.
///
/// # Query Parameters
///
/// - `page` (optional): 1-based page number (default: 1)
/// - `page_size` (optional): results per page (default: 20, clamped to 50)
///
/// # Request Body
///
/// ```json
/// {
///     "query": "jollof",
///     "meal_type": "dinner",
///     "max_prep_time": 30,
///     "exclude_allergens": ["peanuts"]
/// }
/// ```
///
/// Every field is optional. The response is
/// `{"results": [...], "count": 12, "page": 1, "page_size": 20}`.
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn search_recipes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Page<Recipe>>> {
    let request = validated(request)?;
    let pagination = Pagination::from_query(page)?;
    let filter = RecipeFilter::from(&request);

    let page = state.storage.search_recipes(&filter, pagination).await?;

    info!(
        count = page.count,
        returned = page.results.len(),
        page = page.page,
        "Recipes searched"
    );
    Ok(Json(page))
}

/// Response for POST /recipes/recommendations.
#[derive(Debug, Serialize)]
pub struct RecommendationList {
    pub recommendations: Vec<Recipe>,
    pub count: usize,
}

/// POST /recipes/recommendations - Personalized picks from the catalog.
///
/// `count` defaults to 10 and must lie in 1 to 50. Repeated calls may
/// return different picks from the same candidate pool.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn recommend_recipes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationList>> {
    let request = validated(request)?;

    let profile = state.storage.get_profile(user.id).await?;
    let recent = state
        .storage
        .recently_completed_recipe_ids(user.id, RECENTLY_COMPLETED_LIMIT)
        .await?;
    let person = Personalization::resolve(&user, &profile, &request, recent);
    let pool = state
        .storage
        .find_recipes(&person.filter(&request), candidate_pool_size(&request), 0)
        .await?;
    let recommendations = select(pool, &person, &request, &mut rand::thread_rng());

    info!(
        requested = request.count,
        returned = recommendations.len(),
        "Recommendations selected"
    );
    Ok(Json(RecommendationList {
        count: recommendations.len(),
        recommendations,
    }))
}

/// GET /recipes/:id - A published recipe.
#[instrument(skip(state, _user))]
pub async fn get_recipe(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(recipe_id): Path<i64>,
) -> Result<Json<Recipe>> {
    state
        .storage
        .get_published_recipe(recipe_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("recipe"))
}

/// PATCH /recipes/:id - Edit a recipe the caller created.
///
/// Drafts can be edited and published this way. Recipes created by anyone
/// else are `404`. Rating aggregates cannot be set.
#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
    Json(update): Json<RecipeUpdate>,
) -> Result<Json<Recipe>> {
    let update = validated(update)?;
    let recipe = state
        .storage
        .update_recipe(user.id, recipe_id, update)
        .await?;

    info!(slug = %recipe.slug, is_published = recipe.is_published, "Recipe updated");
    Ok(Json(recipe))
}

// ============================================================================
// Ratings
// ============================================================================

#[instrument(skip(state, _user))]
pub async fn list_ratings(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(recipe_id): Path<i64>,
) -> Result<Json<Vec<Rating>>> {
    state
        .storage
        .get_published_recipe(recipe_id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;

    Ok(Json(state.storage.list_ratings(recipe_id).await?))
}

/// POST /recipes/:id/ratings - Rate a recipe.
///
/// # Request Body
///
/// ```json
/// {
///     "rating": 4,
///     "review": "Great with fried plantain"
/// }
/// ```
///
/// One rating per user and recipe; a second one is a `409`. The recipe's
/// `average_rating` and `total_ratings` are recomputed in the same
/// transaction.
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn create_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
    Json(request): Json<RatingRequest>,
) -> Result<(StatusCode, Json<Rating>)> {
    let request = validated(request)?;
    let rating = state
        .storage
        .create_rating(user.id, recipe_id, &request)
        .await?;

    info!(rating_id = rating.id, value = rating.rating, "Rating created");
    Ok((StatusCode::CREATED, Json(rating)))
}

/// PUT /ratings/:id - Change one of the caller's ratings.
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn update_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(rating_id): Path<i64>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<Rating>> {
    let request = validated(request)?;
    let rating = state
        .storage
        .update_rating(user.id, rating_id, &request)
        .await?;

    info!(value = rating.rating, "Rating updated");
    Ok(Json(rating))
}

/// DELETE /ratings/:id - Remove one of the caller's ratings.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(rating_id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.delete_rating(user.id, rating_id).await?;

    info!("Rating deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// User recipe interactions
// ============================================================================

/// POST /recipes/:id/save - `201` when the interaction is new, `200` when
/// an existing one was reset to `saved`.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn save_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> Result<(StatusCode, Json<UserRecipe>)> {
    let (user_recipe, created) = state.storage.save_recipe(user.id, recipe_id).await?;

    info!(created, "Recipe saved");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(user_recipe)))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
) -> Result<Json<UserRecipe>> {
    let user_recipe = state.storage.toggle_favorite(user.id, recipe_id).await?;

    info!(is_favorite = user_recipe.is_favorite, "Favorite toggled");
    Ok(Json(user_recipe))
}

/// PATCH /recipes/:id/interaction - Update status, notes or a cooking
/// session.
///
/// # Request Body
///
/// ```json
/// {
///     "cooking_started_at": "2024-03-01T18:00:00Z",
///     "cooking_completed_at": "2024-03-01T18:45:00Z"
/// }
/// ```
///
/// A completion while a session is open derives `cooking_duration`,
/// increments `times_cooked` and sets the status to `completed`. Repeating
/// the same completion changes nothing. A recipe the user has not
/// interacted with yet is saved first.
#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_interaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(recipe_id): Path<i64>,
    Json(update): Json<UserRecipeUpdate>,
) -> Result<Json<UserRecipe>> {
    let update = validated(update)?;

    if state
        .storage
        .get_user_recipe(user.id, recipe_id)
        .await?
        .is_none()
    {
        state.storage.save_recipe(user.id, recipe_id).await?;
    }

    let times_cooked_before = state
        .storage
        .get_user_recipe(user.id, recipe_id)
        .await?
        .map_or(0, |r| r.times_cooked);
    let user_recipe = state
        .storage
        .update_user_recipe(user.id, recipe_id, update)
        .await?;

    if user_recipe.times_cooked > times_cooked_before {
        info!(
            duration_minutes = user_recipe.cooking_duration,
            times_cooked = user_recipe.times_cooked,
            "Cooking session completed"
        );
    } else {
        info!(status = %user_recipe.status, "Interaction updated");
    }
    Ok(Json(user_recipe))
}

// ============================================================================
// Collections
// ============================================================================

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_collections(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Collection>>> {
    Ok(Json(state.storage.list_collections(user.id).await?))
}

/// POST /collections - Names are unique per user (`409` otherwise).
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn create_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewCollection>,
) -> Result<(StatusCode, Json<Collection>)> {
    let request = validated(request)?;
    let collection = state.storage.create_collection(user.id, &request).await?;

    info!(collection_id = collection.id, "Collection created");
    Ok((StatusCode::CREATED, Json(collection)))
}

/// GET /collections/:id - Collections of other users are not found.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(collection_id): Path<i64>,
) -> Result<Json<Collection>> {
    state
        .storage
        .get_collection(user.id, collection_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("collection"))
}

#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(collection_id): Path<i64>,
    Json(update): Json<CollectionUpdate>,
) -> Result<Json<Collection>> {
    let update = validated(update)?;
    let collection = state
        .storage
        .update_collection(user.id, collection_id, &update)
        .await?;

    info!("Collection updated");
    Ok(Json(collection))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(collection_id): Path<i64>,
) -> Result<StatusCode> {
    state
        .storage
        .delete_collection(user.id, collection_id)
        .await?;

    info!("Collection deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /collections/:id/recipes/:recipe_id - Adding twice is a no-op.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn add_to_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((collection_id, recipe_id)): Path<(i64, i64)>,
) -> Result<Json<Collection>> {
    let collection = state
        .storage
        .add_to_collection(user.id, collection_id, recipe_id)
        .await?;

    info!(recipe_count = collection.recipe_count, "Recipe added to collection");
    Ok(Json(collection))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn remove_from_collection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((collection_id, recipe_id)): Path<(i64, i64)>,
) -> Result<Json<Collection>> {
    let collection = state
        .storage
        .remove_from_collection(user.id, collection_id, recipe_id)
        .await?;

    info!(
        recipe_count = collection.recipe_count,
        "Recipe removed from collection"
    );
    Ok(Json(collection))
}

// ============================================================================
// Meal plans
// ============================================================================

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_meal_plans(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<MealPlan>>> {
    Ok(Json(state.storage.list_meal_plans(user.id).await?))
}

/// POST /meal-plans - Start a dated plan.
///
/// # Request Body
///
/// ```json
/// {
///     "name": "Harmattan week",
///     "start_date": "2026-01-05",
///     "end_date": "2026-01-11"
/// }
/// ```
///
/// `name` defaults to "My Meal Plan". An end before the start is a `400`.
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn create_meal_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewMealPlan>,
) -> Result<(StatusCode, Json<MealPlan>)> {
    let request = validated(request)?;
    let plan = state.storage.create_meal_plan(user.id, &request).await?;

    info!(meal_plan_id = plan.id, "Meal plan created");
    Ok((StatusCode::CREATED, Json(plan)))
}

/// GET /meal-plans/:id - Plans of other users are not found.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_meal_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<i64>,
) -> Result<Json<MealPlan>> {
    state
        .storage
        .get_meal_plan(user.id, plan_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("meal plan"))
}

/// PATCH /meal-plans/:id - Dates may not shrink past a planned meal.
#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_meal_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<i64>,
    Json(update): Json<MealPlanUpdate>,
) -> Result<Json<MealPlan>> {
    let update = validated(update)?;
    let plan = state
        .storage
        .update_meal_plan(user.id, plan_id, update)
        .await?;

    info!("Meal plan updated");
    Ok(Json(plan))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_meal_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.delete_meal_plan(user.id, plan_id).await?;

    info!("Meal plan deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_meal_plan_entries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<i64>,
) -> Result<Json<Vec<MealPlanEntry>>> {
    let plan = state
        .storage
        .get_meal_plan(user.id, plan_id)
        .await?
        .ok_or(AppError::NotFound("meal plan"))?;

    Ok(Json(plan.entries))
}

/// POST /meal-plans/:id/entries - Schedule a recipe.
///
/// # Request Body
///
/// ```json
/// {
///     "recipe_id": 12,
///     "date": "2026-01-06",
///     "meal_type": "dinner",
///     "servings": 4
/// }
/// ```
///
/// The date must fall inside the plan (`400`), the recipe must be published
/// (`404`), and a meal already planned for that day is a `409`.
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn add_meal_plan_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(plan_id): Path<i64>,
    Json(request): Json<NewMealPlanEntry>,
) -> Result<(StatusCode, Json<MealPlanEntry>)> {
    let request = validated(request)?;
    let entry = state
        .storage
        .add_meal_plan_entry(user.id, plan_id, &request)
        .await?;

    info!(entry_id = entry.id, meal_type = %entry.meal_type, "Meal planned");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_meal_plan_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(entry_id): Path<i64>,
) -> Result<Json<MealPlanEntry>> {
    state
        .storage
        .get_meal_plan_entry(user.id, entry_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("meal plan entry"))
}

#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_meal_plan_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(entry_id): Path<i64>,
    Json(update): Json<MealPlanEntryUpdate>,
) -> Result<Json<MealPlanEntry>> {
    let update = validated(update)?;
    let entry = state
        .storage
        .update_meal_plan_entry(user.id, entry_id, update)
        .await?;

    info!("Meal plan entry updated");
    Ok(Json(entry))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_meal_plan_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(entry_id): Path<i64>,
) -> Result<StatusCode> {
    state
        .storage
        .delete_meal_plan_entry(user.id, entry_id)
        .await?;

    info!("Meal plan entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Shopping lists
// ============================================================================

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_shopping_lists(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ShoppingList>>> {
    Ok(Json(state.storage.list_shopping_lists(user.id).await?))
}

#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn create_shopping_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewShoppingList>,
) -> Result<(StatusCode, Json<ShoppingList>)> {
    let request = validated(request)?;
    let list = state.storage.create_shopping_list(user.id, &request).await?;

    info!(shopping_list_id = list.id, "Shopping list created");
    Ok((StatusCode::CREATED, Json(list)))
}

/// GET /shopping-lists/:id - Items come ordered by category, then name.
#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_shopping_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
) -> Result<Json<ShoppingList>> {
    state
        .storage
        .get_shopping_list(user.id, list_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("shopping list"))
}

#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_shopping_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
    Json(update): Json<ShoppingListUpdate>,
) -> Result<Json<ShoppingList>> {
    let update = validated(update)?;
    let list = state
        .storage
        .update_shopping_list(user.id, list_id, &update)
        .await?;

    info!("Shopping list updated");
    Ok(Json(list))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_shopping_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.delete_shopping_list(user.id, list_id).await?;

    info!("Shopping list deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_shopping_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
) -> Result<Json<Vec<ShoppingListItem>>> {
    let list = state
        .storage
        .get_shopping_list(user.id, list_id)
        .await?
        .ok_or(AppError::NotFound("shopping list"))?;

    Ok(Json(list.items))
}

/// POST /shopping-lists/:id/items - Add an item.
///
/// # Request Body
///
/// ```json
/// {
///     "name": "Plantain",
///     "quantity": "6 fingers",
///     "category": "produce",
///     "estimated_price": 3.5
/// }
/// ```
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn add_shopping_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
    Json(request): Json<NewShoppingListItem>,
) -> Result<(StatusCode, Json<ShoppingListItem>)> {
    let request = validated(request)?;
    let item = state
        .storage
        .add_shopping_item(user.id, list_id, &request)
        .await?;

    info!(item_id = item.id, "Shopping list item added");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_shopping_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<i64>,
) -> Result<Json<ShoppingListItem>> {
    state
        .storage
        .get_shopping_item(user.id, item_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("shopping list item"))
}

/// PATCH /shopping-list-items/:id - Typically to tick an item off.
#[instrument(skip(state, user, update), fields(user_id = user.id))]
pub async fn update_shopping_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<i64>,
    Json(update): Json<ShoppingListItemUpdate>,
) -> Result<Json<ShoppingListItem>> {
    let update = validated(update)?;
    let item = state
        .storage
        .update_shopping_item(user.id, item_id, update)
        .await?;

    info!(is_purchased = item.is_purchased, "Shopping list item updated");
    Ok(Json(item))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_shopping_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.delete_shopping_item(user.id, item_id).await?;

    info!("Shopping list item deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// AI gateway
// ============================================================================

async fn user_context(storage: &Storage, user: &UserAccount) -> Result<UserContext> {
    let profile = storage.get_profile(user.id).await?;
    Ok(UserContext::new(user, &profile, Utc::now().date_naive()))
}

/// POST /ai/recommendations - Model-generated recipe suggestions.
///
/// # Request Body
///
/// ```json
/// {
///     "meal_type": "dinner",
///     "max_prep_time": 45,
///     "preferred_regions": ["West Africa"],
///     "count": 5
/// }
/// ```
///
/// Always `200`. When the model is unavailable or answers with something
/// other than the expected JSON, suggestions are drawn from the catalog and
/// the response carries `"fallback": true`.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn ai_recommendations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<AiRecommendationRequest>,
) -> Result<Json<RecommendationsReply>> {
    let request = validated(request)?;
    let context = user_context(&state.storage, &user).await?;

    Ok(Json(
        state.ai.recommendations(user.id, &context, &request).await,
    ))
}

/// POST /ai/meal-plan - A multi-day plan (at most 14 days).
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn ai_meal_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<MealPlanRequest>,
) -> Result<Json<GeneratedMealPlan>> {
    let request = validated(request)?;
    let context = user_context(&state.storage, &user).await?;

    Ok(Json(state.ai.meal_plan(user.id, &context, &request).await))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn ai_ingredient_substitutes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SubstituteRequest>,
) -> Result<Json<SubstituteReply>> {
    let request = validated(request)?;
    let context = user_context(&state.storage, &user).await?;

    Ok(Json(
        state
            .ai
            .ingredient_substitutes(user.id, &context, &request)
            .await,
    ))
}

/// POST /ai/cultural-insight - Background on a published recipe.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn ai_cultural_insight(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CulturalInsightRequest>,
) -> Result<Json<CulturalInsight>> {
    let recipe = state
        .storage
        .get_published_recipe(request.recipe_id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    let context = user_context(&state.storage, &user).await?;

    Ok(Json(
        state.ai.cultural_insight(user.id, &context, &recipe).await,
    ))
}

/// POST /ai/feedback - Rate a stored recommendation.
///
/// Recommendations of other users are not found.
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn ai_feedback(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<AiRecommendationRecord>> {
    let request = validated(request)?;
    let record = state.storage.record_ai_feedback(user.id, &request).await?;

    info!(
        recommendation_id = record.id,
        rating = record.user_rating,
        was_helpful = record.was_helpful,
        "AI feedback recorded"
    );
    Ok(Json(record))
}

/// GET /ai/history - The caller's most recent stored recommendations.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn ai_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<AiRecommendationRecord>>> {
    Ok(Json(
        state
            .storage
            .list_ai_recommendations(user.id, AI_HISTORY_LIMIT)
            .await?,
    ))
}
