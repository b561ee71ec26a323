//! Personalized recipe recommendations.
//!
//! Candidates are the published recipes that fit the user's profile:
//! no allergen overlap, a matching dietary label when the user has
//! preferences, a difficulty allowed for their cooking level, a favorite
//! cuisine when they have any, not among their recently completed recipes,
//! and rated at least [`MIN_RECOMMENDED_RATING`]. Candidates are ordered by
//! rating; the top `2 * count` are shuffled and truncated to `count`, which
//! trades strict rating order for variety across repeated calls.
//!
//! [`Personalization::filter`] expresses the candidate rules as a
//! [`RecipeFilter`], so storage only has to return the best
//! [`candidate_pool_size`] rows.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::model::{CookingLevel, Recipe, RecommendationRequest, UserAccount, UserProfile};
use crate::search::{RecipeFilter, by_relevance, normalize_terms};

/// Minimum average rating of a recommended recipe.
pub const MIN_RECOMMENDED_RATING: f64 = 3.0;

/// How many recently completed recipes are excluded.
pub const RECENTLY_COMPLETED_LIMIT: i64 = 10;

/// Upper bound on the number of recommendations per request.
pub const MAX_RECOMMENDATIONS: u32 = 50;

/// Everything about the user the selector needs, resolved once per request.
#[derive(Debug, Clone, Default)]
pub struct Personalization {
    /// Lowercase allergen terms to exclude.
    pub allergies: Vec<String>,
    /// Lowercase dietary preference names; any one must match when non-empty.
    pub dietary_preferences: Vec<String>,
    pub cooking_level: CookingLevel,
    /// Cuisine ids to restrict to; empty means any cuisine.
    pub favorite_cuisines: Vec<i64>,
    /// Recipe ids the user completed most recently.
    pub recently_completed: HashSet<i64>,
}

impl Personalization {
    /// Merge the stored profile with request overrides.
    ///
    /// The request's cooking level and favorite cuisines replace the stored
    /// ones when present; request allergens are added to the profile's.
    pub fn resolve(
        account: &UserAccount,
        profile: &UserProfile,
        request: &RecommendationRequest,
        recently_completed: impl IntoIterator<Item = i64>,
    ) -> Self {
        let mut allergies: Vec<String> = profile
            .allergies
            .iter()
            .map(|a| a.name.to_lowercase())
            .collect();
        allergies.extend(normalize_terms(&request.exclude_allergens));

        Personalization {
            allergies,
            dietary_preferences: profile
                .dietary_preferences
                .iter()
                .map(|p| p.name.to_lowercase())
                .collect(),
            cooking_level: request.cooking_level.unwrap_or(account.cooking_level),
            favorite_cuisines: request
                .favorite_cuisines
                .clone()
                .unwrap_or_else(|| profile.favorite_cuisines.clone()),
            recently_completed: recently_completed.into_iter().collect(),
        }
    }

    /// The candidate rules for this user and request.
    pub fn filter(&self, request: &RecommendationRequest) -> RecipeFilter {
        let mut exclude_ids: Vec<i64> = self.recently_completed.iter().copied().collect();
        exclude_ids.sort_unstable();

        RecipeFilter {
            meal_type: request.meal_type,
            max_prep_time: request.max_prep_time,
            min_rating: Some(MIN_RECOMMENDED_RATING),
            any_dietary_labels: self.dietary_preferences.clone(),
            exclude_allergens: self.allergies.clone(),
            difficulties: self.cooking_level.allowed_difficulties().to_vec(),
            cuisines: self.favorite_cuisines.clone(),
            exclude_ids,
            ..Default::default()
        }
    }
}

fn effective_count(request: &RecommendationRequest) -> usize {
    request.count.clamp(1, MAX_RECOMMENDATIONS) as usize
}

/// How many of the best candidates are sampled from: `2 * count`.
pub fn candidate_pool_size(request: &RecommendationRequest) -> i64 {
    effective_count(request) as i64 * 2
}

/// Eligible recipes, best rated first.
pub fn candidates(
    catalog: Vec<Recipe>,
    person: &Personalization,
    request: &RecommendationRequest,
) -> Vec<Recipe> {
    let filter = person.filter(request);
    let mut eligible: Vec<Recipe> = catalog.into_iter().filter(|r| filter.matches(r)).collect();
    eligible.sort_by(by_relevance);
    eligible
}

/// Pick up to `request.count` recommendations.
///
/// `catalog` is usually the candidate pool storage returned for
/// [`Personalization::filter`], but any superset gives the same result.
/// Takes the `2 * count` best candidates, shuffles them with `rng` and keeps
/// `count`. Returns an empty list when nothing is eligible.
pub fn select<R: Rng + ?Sized>(
    catalog: Vec<Recipe>,
    person: &Personalization,
    request: &RecommendationRequest,
    rng: &mut R,
) -> Vec<Recipe> {
    let count = effective_count(request);

    let mut pool = candidates(catalog, person, request);
    pool.truncate(count * 2);
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, MealType, ReferenceItem};
    use crate::search::tests::recipe;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rated(id: i64, rating: f64, difficulty: Difficulty) -> Recipe {
        let mut r = recipe(id, &format!("Recipe {id}"));
        r.average_rating = rating;
        r.total_ratings = 4;
        r.difficulty = difficulty;
        r
    }

    fn item(id: i64, name: &str) -> ReferenceItem {
        ReferenceItem {
            id,
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn everything() -> Personalization {
        Personalization {
            cooking_level: CookingLevel::Expert,
            ..Default::default()
        }
    }

    #[test]
    fn test_allergens_are_excluded() {
        let mut peanut = rated(1, 5.0, Difficulty::Easy);
        peanut.allergen_warnings = vec!["Peanuts".to_string()];
        let safe = rated(2, 4.0, Difficulty::Easy);

        let person = Personalization {
            allergies: vec!["peanuts".to_string()],
            ..everything()
        };
        let picked = candidates(vec![peanut, safe], &person, &RecommendationRequest::default());

        assert_eq!(picked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_any_dietary_preference_matches() {
        let mut vegan = rated(1, 4.0, Difficulty::Easy);
        vegan.dietary_labels = vec!["Vegan".to_string()];
        let mut halal = rated(2, 4.0, Difficulty::Easy);
        halal.dietary_labels = vec!["halal".to_string()];
        let plain = rated(3, 4.0, Difficulty::Easy);

        let person = Personalization {
            dietary_preferences: vec!["vegan".to_string(), "halal".to_string()],
            ..everything()
        };
        let picked = candidates(
            vec![vegan, halal, plain],
            &person,
            &RecommendationRequest::default(),
        );

        assert_eq!(picked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_beginner_only_gets_easy() {
        let catalog = vec![
            rated(1, 4.0, Difficulty::Easy),
            rated(2, 4.0, Difficulty::Medium),
            rated(3, 4.0, Difficulty::Hard),
        ];
        let person = Personalization::default();
        let picked = candidates(catalog, &person, &RecommendationRequest::default());

        assert!(picked.iter().all(|r| r.difficulty == Difficulty::Easy));
        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn test_request_cooking_level_overrides_stored_level() {
        let account = crate::search::tests::account();
        let profile = UserProfile::default();
        let request = RecommendationRequest {
            cooking_level: Some(CookingLevel::Advanced),
            ..Default::default()
        };

        let person = Personalization::resolve(&account, &profile, &request, Vec::<i64>::new());
        assert_eq!(person.cooking_level, CookingLevel::Advanced);

        let person = Personalization::resolve(
            &account,
            &profile,
            &RecommendationRequest::default(),
            Vec::<i64>::new(),
        );
        assert_eq!(person.cooking_level, CookingLevel::Beginner);
    }

    #[test]
    fn test_resolve_merges_allergies_and_favorites() {
        let account = crate::search::tests::account();
        let profile = UserProfile {
            allergies: vec![item(1, "Peanuts")],
            favorite_cuisines: vec![7],
            ..Default::default()
        };
        let request = RecommendationRequest {
            exclude_allergens: vec![" Shellfish ".to_string()],
            ..Default::default()
        };

        let person = Personalization::resolve(&account, &profile, &request, [3_i64, 4]);
        assert_eq!(person.allergies, vec!["peanuts", "shellfish"]);
        assert_eq!(person.favorite_cuisines, vec![7]);
        assert!(person.recently_completed.contains(&4));

        let request = RecommendationRequest {
            favorite_cuisines: Some(vec![]),
            ..Default::default()
        };
        let person = Personalization::resolve(&account, &profile, &request, Vec::<i64>::new());
        assert!(person.favorite_cuisines.is_empty());
    }

    #[test]
    fn test_recently_completed_and_low_rated_are_excluded() {
        let catalog = vec![
            rated(1, 4.0, Difficulty::Easy),
            rated(2, 4.0, Difficulty::Easy),
            rated(3, 2.9, Difficulty::Easy),
        ];
        let person = Personalization {
            recently_completed: HashSet::from([1]),
            ..everything()
        };
        let picked = candidates(catalog, &person, &RecommendationRequest::default());

        assert_eq!(picked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_meal_type_and_cuisine_restrictions() {
        let mut lunch = rated(1, 4.0, Difficulty::Easy);
        lunch.meal_type = MealType::Lunch;
        let mut other_cuisine = rated(2, 4.0, Difficulty::Easy);
        other_cuisine.cuisine_id = 9;
        let dinner = rated(3, 4.0, Difficulty::Easy);

        let person = Personalization {
            favorite_cuisines: vec![1],
            ..everything()
        };
        let request = RecommendationRequest {
            meal_type: Some(MealType::Dinner),
            ..Default::default()
        };
        let picked = candidates(vec![lunch, other_cuisine, dinner], &person, &request);

        assert_eq!(picked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_select_respects_count_and_top_pool() {
        let catalog: Vec<Recipe> = (1..=30)
            .map(|id| rated(id, 5.0 - id as f64 * 0.05, Difficulty::Easy))
            .collect();
        let request = RecommendationRequest {
            count: 5,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);

        let picked = select(catalog, &everything(), &request, &mut rng);

        assert_eq!(picked.len(), 5);
        // only the ten best-rated candidates are eligible for sampling
        assert!(picked.iter().all(|r| r.id <= 10));
    }

    #[test]
    fn test_filter_carries_every_rule() {
        let person = Personalization {
            allergies: vec!["peanuts".to_string()],
            dietary_preferences: vec!["halal".to_string()],
            cooking_level: CookingLevel::Intermediate,
            favorite_cuisines: vec![4],
            recently_completed: HashSet::from([9, 2]),
        };
        let request = RecommendationRequest {
            meal_type: Some(MealType::Lunch),
            max_prep_time: Some(20),
            count: 7,
            ..Default::default()
        };

        let filter = person.filter(&request);
        assert_eq!(filter.min_rating, Some(MIN_RECOMMENDED_RATING));
        assert_eq!(filter.difficulties, vec![Difficulty::Easy, Difficulty::Medium]);
        assert_eq!(filter.exclude_ids, vec![2, 9]);
        assert_eq!(filter.any_dietary_labels, vec!["halal"]);
        assert_eq!(filter.exclude_allergens, vec!["peanuts"]);
        assert_eq!(filter.cuisines, vec![4]);
        assert_eq!(filter.meal_type, Some(MealType::Lunch));
        assert_eq!(candidate_pool_size(&request), 14);
    }

    #[test]
    fn test_select_with_no_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        let picked = select(vec![], &everything(), &RecommendationRequest::default(), &mut rng);

        assert!(picked.is_empty());
    }

    #[test]
    fn test_select_never_violates_allergies() {
        let catalog: Vec<Recipe> = (1..=40)
            .map(|id| {
                let mut r = rated(id, 4.0, Difficulty::Easy);
                if id % 3 == 0 {
                    r.allergen_warnings = vec!["Tree nuts".to_string()];
                }
                r
            })
            .collect();
        let person = Personalization {
            allergies: vec!["nuts".to_string()],
            ..everything()
        };
        let request = RecommendationRequest {
            count: 50,
            ..Default::default()
        };

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select(catalog.clone(), &person, &request, &mut rng);
            assert!(picked.len() <= 50);
            assert!(picked.iter().all(|r| r.allergen_warnings.is_empty()));
        }
    }
}
