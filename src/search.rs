//! Recipe filter and search engine.
//!
//! A [`RecipeFilter`] is a conjunction of independent, optional predicates.
//! Absent predicates impose no constraint, so applying filters `A` and `B`
//! together selects exactly the intersection of `A` alone and `B` alone.
//!
//! List predicates (dietary labels, allergens, ingredients) match
//! case-insensitively: a term matches a recipe when some element of the
//! list contains it as a substring.
//!
//! The catalog is filtered, ordered and paginated by the database; see
//! [`crate::storage::Storage::search_recipes`]. [`RecipeFilter::matches`] is
//! the same predicate over a single in-memory recipe.

use std::cmp::Ordering;

use crate::error::AppError;
use crate::model::{Difficulty, MealType, PageQuery, Recipe, SearchRequest};

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on the page size; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Compiled search predicates with all text terms lowercased.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub query: Option<String>,
    pub cuisine: Option<i64>,
    pub region: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub meal_type: Option<MealType>,
    pub max_prep_time: Option<u32>,
    pub max_cook_time: Option<u32>,
    pub max_total_time: Option<u32>,
    pub min_rating: Option<f64>,
    /// Every label must be present.
    pub dietary_labels: Vec<String>,
    /// At least one label must be present when non-empty.
    pub any_dietary_labels: Vec<String>,
    pub exclude_allergens: Vec<String>,
    pub ingredients: Vec<String>,
    pub exclude_ingredients: Vec<String>,

    /// Allowed difficulties; empty allows any.
    pub difficulties: Vec<Difficulty>,
    /// Allowed cuisine ids; empty allows any.
    pub cuisines: Vec<i64>,
    /// Region name terms, any of which must appear in the region's name.
    pub region_names: Vec<String>,
    pub exclude_ids: Vec<i64>,
}

impl From<&SearchRequest> for RecipeFilter {
    fn from(request: &SearchRequest) -> Self {
        RecipeFilter {
            query: request
                .query
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_lowercase),
            cuisine: request.cuisine,
            region: request.region,
            difficulty: request.difficulty,
            meal_type: request.meal_type,
            max_prep_time: request.max_prep_time,
            max_cook_time: request.max_cook_time,
            max_total_time: request.max_total_time,
            min_rating: request.min_rating,
            dietary_labels: normalize_terms(&request.dietary_labels),
            exclude_allergens: normalize_terms(&request.exclude_allergens),
            ingredients: normalize_terms(&request.ingredients),
            exclude_ingredients: normalize_terms(&request.exclude_ingredients),
            ..Default::default()
        }
    }
}

impl RecipeFilter {
    /// Whether a recipe satisfies every configured predicate.
    ///
    /// Unpublished recipes never match.
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if !recipe.is_published {
            return false;
        }

        if let Some(query) = &self.query {
            let hit = contains_ci(&recipe.name, query)
                || contains_ci(&recipe.description, query)
                || list_mentions(&recipe.tags, query);
            if !hit {
                return false;
            }
        }

        if self.cuisine.is_some_and(|id| recipe.cuisine_id != id) {
            return false;
        }
        if self.region.is_some_and(|id| recipe.region_id != id) {
            return false;
        }
        if self.difficulty.is_some_and(|d| recipe.difficulty != d) {
            return false;
        }
        if self.meal_type.is_some_and(|m| recipe.meal_type != m) {
            return false;
        }
        if !self.difficulties.is_empty() && !self.difficulties.contains(&recipe.difficulty) {
            return false;
        }
        if !self.cuisines.is_empty() && !self.cuisines.contains(&recipe.cuisine_id) {
            return false;
        }
        if !self.region_names.is_empty()
            && !self
                .region_names
                .iter()
                .any(|name| contains_ci(&recipe.region_name, name))
        {
            return false;
        }
        if self.exclude_ids.contains(&recipe.id) {
            return false;
        }

        if self.max_prep_time.is_some_and(|max| recipe.prep_time > max) {
            return false;
        }
        if self.max_cook_time.is_some_and(|max| recipe.cook_time > max) {
            return false;
        }
        if self.max_total_time.is_some_and(|max| recipe.total_time > max) {
            return false;
        }
        if self.min_rating.is_some_and(|min| recipe.average_rating < min) {
            return false;
        }

        if !self
            .dietary_labels
            .iter()
            .all(|label| list_mentions(&recipe.dietary_labels, label))
        {
            return false;
        }
        if !self.any_dietary_labels.is_empty()
            && !self
                .any_dietary_labels
                .iter()
                .any(|label| list_mentions(&recipe.dietary_labels, label))
        {
            return false;
        }
        if self
            .exclude_allergens
            .iter()
            .any(|allergen| list_mentions(&recipe.allergen_warnings, allergen))
        {
            return false;
        }

        if !self
            .ingredients
            .iter()
            .all(|term| mentions_ingredient(recipe, term))
        {
            return false;
        }
        if self
            .exclude_ingredients
            .iter()
            .any(|term| mentions_ingredient(recipe, term))
        {
            return false;
        }

        true
    }
}

/// Validated page number and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    /// Resolve query parameters, applying defaults and clamping the size.
    ///
    /// Page numbers start at 1. A zero page or zero page size is rejected.
    pub fn from_query(query: PageQuery) -> Result<Self, AppError> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }

        let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(AppError::BadRequest(
                "page_size must be at least 1".to_string(),
            ));
        }

        Ok(Pagination {
            page,
            page_size: page_size.min(MAX_PAGE_SIZE),
        })
    }

    /// Number of results before this page.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Relevance order: average rating desc, then rating count desc, then id.
///
/// Storage sorts by the same keys in SQL.
pub fn by_relevance(a: &Recipe, b: &Recipe) -> Ordering {
    b.average_rating
        .total_cmp(&a.average_rating)
        .then_with(|| b.total_ratings.cmp(&a.total_ratings))
        .then_with(|| a.id.cmp(&b.id))
}

/// Case-insensitive substring test; `needle` must already be lowercase.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Whether any element of `list` contains the lowercase `term`.
pub(crate) fn list_mentions(list: &[String], term: &str) -> bool {
    list.iter().any(|item| contains_ci(item, term))
}

fn mentions_ingredient(recipe: &Recipe, term: &str) -> bool {
    recipe
        .ingredients
        .iter()
        .any(|ingredient| contains_ci(&ingredient.name, term))
}

/// Trim, lowercase and drop empty terms.
pub(crate) fn normalize_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
