//! The AI gateway: prompt, call, validate, or fall back.
//!
//! Every public method returns a value, never an error. A failed, slow or
//! malformed model reply is replaced by locally built output of the same
//! shape with `fallback: true`. Each call is recorded as an AI interaction;
//! successful recommendations and cultural insights are also stored as AI
//! recommendations for history and feedback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::ai::client::{ChatMessage, ChatRequest, LanguageModel, ModelError};
use crate::ai::prompts::{
    CULTURAL_INSIGHT_SYSTEM, MEAL_PLAN_SYSTEM, RECOMMENDATION_SYSTEM, SUBSTITUTE_SYSTEM,
    UserContext, cultural_insight_prompt, meal_plan_prompt, recommendation_prompt,
    substitute_prompt,
};
use crate::ai::schema::{
    AiRecommendationRequest, CulturalInsight, MealPlan, MealPlanRequest, RecipeSuggestion,
    RecommendationsReply, SchemaError, SubstituteReply, SubstituteRequest, SuggestionReply,
    parse_reply,
};
use crate::model::{InteractionType, NewAiRecommendation, NewInteraction, Recipe, RecommendationType};
use crate::search::{RecipeFilter, normalize_terms};
use crate::storage::Storage;

/// Confidence reported for validated model output.
pub const SUCCESS_CONFIDENCE: f64 = 0.85;

/// Confidence reported for locally built output.
pub const FALLBACK_CONFIDENCE: f64 = 0.6;

/// Confidence stored with generated cultural insights.
pub const INSIGHT_CONFIDENCE: f64 = 0.8;

/// The four kinds of model call and their sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiCallKind {
    Recommendations,
    MealPlan,
    IngredientSubstitution,
    CulturalInsight,
}

impl AiCallKind {
    pub fn max_tokens(self) -> u32 {
        match self {
            AiCallKind::Recommendations => 2000,
            AiCallKind::MealPlan => 3000,
            AiCallKind::IngredientSubstitution => 1500,
            AiCallKind::CulturalInsight => 2000,
        }
    }

    pub fn temperature(self) -> f32 {
        match self {
            AiCallKind::Recommendations => 0.7,
            AiCallKind::MealPlan => 0.6,
            AiCallKind::IngredientSubstitution => 0.5,
            AiCallKind::CulturalInsight => 0.6,
        }
    }

    pub fn interaction_type(self) -> InteractionType {
        match self {
            AiCallKind::Recommendations => InteractionType::RecommendationRequest,
            AiCallKind::MealPlan => InteractionType::MealPlanGeneration,
            AiCallKind::IngredientSubstitution => InteractionType::IngredientSubstitution,
            AiCallKind::CulturalInsight => InteractionType::CulturalQuery,
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            AiCallKind::Recommendations => RECOMMENDATION_SYSTEM,
            AiCallKind::MealPlan => MEAL_PLAN_SYSTEM,
            AiCallKind::IngredientSubstitution => SUBSTITUTE_SYSTEM,
            AiCallKind::CulturalInsight => CULTURAL_INSIGHT_SYSTEM,
        }
    }
}

/// Why a call took the fallback path.
#[derive(Debug, thiserror::Error)]
enum CallFailure {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

struct Reply<T> {
    value: T,
    total_tokens: Option<i64>,
}

/// Validated model output, or the fallback that replaced it.
struct Outcome<T> {
    value: T,
    fallback: bool,
    total_tokens: Option<i64>,
}

/// Gateway between handlers and the language model.
#[derive(Clone)]
pub struct AiGateway {
    model: Arc<dyn LanguageModel>,
    storage: Storage,
    timeout: Duration,
}

impl AiGateway {
    /// Create a gateway around an explicitly constructed model client.
    ///
    /// `timeout` bounds each model call; hitting it counts as a failure.
    pub fn new(model: Arc<dyn LanguageModel>, storage: Storage, timeout: Duration) -> Self {
        Self {
            model,
            storage,
            timeout,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Suggest recipes for the user.
    #[instrument(skip(self, context, request))]
    pub async fn recommendations(
        &self,
        user_id: i64,
        context: &UserContext,
        request: &AiRecommendationRequest,
    ) -> RecommendationsReply {
        let started = Instant::now();
        let kind = AiCallKind::Recommendations;
        let count = request.effective_count() as usize;

        let result = self
            .call::<SuggestionReply>(kind, recommendation_prompt(context, request))
            .await;
        let outcome = match result {
            Ok(reply) => {
                let mut suggestions = reply.value.recommendations;
                suggestions.truncate(count);
                Outcome {
                    value: suggestions,
                    fallback: false,
                    total_tokens: reply.total_tokens,
                }
            }
            Err(e) => {
                warn!(user_id, kind = ?kind, error = %e, "AI call failed, using fallback");
                Outcome {
                    value: self.local_suggestions(context, request).await,
                    fallback: true,
                    total_tokens: None,
                }
            }
        };

        let reply = RecommendationsReply {
            recommendations: outcome.value,
            confidence_score: confidence(outcome.fallback),
            processing_time_ms: elapsed_ms(started),
            fallback: outcome.fallback,
        };

        self.log_interaction(
            user_id,
            kind,
            to_json(request),
            to_json(context),
            to_json(&reply),
            outcome.fallback,
            reply.processing_time_ms,
            outcome.total_tokens,
        )
        .await;

        if !reply.fallback {
            for suggestion in &reply.recommendations {
                self.save_recommendation(NewAiRecommendation {
                    user_id,
                    recommendation_type: RecommendationType::Recipe,
                    content: to_json(suggestion),
                    confidence_score: suggestion.confidence,
                    user_context: to_json(context),
                })
                .await;
            }
        }

        reply
    }

    /// Generate a multi-day meal plan.
    #[instrument(skip(self, context, request))]
    pub async fn meal_plan(
        &self,
        user_id: i64,
        context: &UserContext,
        request: &MealPlanRequest,
    ) -> MealPlan {
        let started = Instant::now();
        let kind = AiCallKind::MealPlan;

        let outcome = self
            .call_or(kind, user_id, meal_plan_prompt(context, request), || {
                MealPlan::fallback(request.effective_days())
            })
            .await;

        self.log_interaction(
            user_id,
            kind,
            to_json(request),
            to_json(context),
            to_json(&outcome.value),
            outcome.fallback,
            elapsed_ms(started),
            outcome.total_tokens,
        )
        .await;

        outcome.value
    }

    /// Suggest substitutes for an ingredient.
    #[instrument(skip(self, context, request))]
    pub async fn ingredient_substitutes(
        &self,
        user_id: i64,
        context: &UserContext,
        request: &SubstituteRequest,
    ) -> SubstituteReply {
        let started = Instant::now();
        let kind = AiCallKind::IngredientSubstitution;

        let outcome = self
            .call_or(kind, user_id, substitute_prompt(context, request), || {
                SubstituteReply::fallback(&request.ingredient)
            })
            .await;

        self.log_interaction(
            user_id,
            kind,
            to_json(request),
            to_json(context),
            to_json(&outcome.value),
            outcome.fallback,
            elapsed_ms(started),
            outcome.total_tokens,
        )
        .await;

        outcome.value
    }

    /// Describe the cultural background of a recipe.
    #[instrument(skip(self, context, recipe), fields(recipe_id = recipe.id))]
    pub async fn cultural_insight(
        &self,
        user_id: i64,
        context: &UserContext,
        recipe: &Recipe,
    ) -> CulturalInsight {
        let started = Instant::now();
        let kind = AiCallKind::CulturalInsight;

        let outcome = self
            .call_or(kind, user_id, cultural_insight_prompt(recipe), || {
                CulturalInsight::fallback(recipe)
            })
            .await;

        self.log_interaction(
            user_id,
            kind,
            serde_json::json!({ "recipe_id": recipe.id }),
            to_json(context),
            to_json(&outcome.value),
            outcome.fallback,
            elapsed_ms(started),
            outcome.total_tokens,
        )
        .await;

        if !outcome.fallback {
            let mut content = to_json(&outcome.value);
            if let Value::Object(map) = &mut content {
                map.insert("recipe_id".to_string(), recipe.id.into());
            }
            self.save_recommendation(NewAiRecommendation {
                user_id,
                recommendation_type: RecommendationType::CulturalInsight,
                content,
                confidence_score: INSIGHT_CONFIDENCE,
                user_context: to_json(context),
            })
            .await;
        }

        outcome.value
    }

    /// Send one prompt and validate the reply against `T`.
    async fn call<T>(&self, kind: AiCallKind, prompt: String) -> Result<Reply<T>, CallFailure>
    where
        T: DeserializeOwned + Validate,
    {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(kind.system_prompt()),
                ChatMessage::user(prompt),
            ],
            max_tokens: kind.max_tokens(),
            temperature: kind.temperature(),
        };

        let completion = tokio::time::timeout(self.timeout, self.model.complete(&request))
            .await
            .map_err(|_| CallFailure::Timeout(self.timeout))??;

        let value = parse_reply(&completion.content)?;
        Ok(Reply {
            value,
            total_tokens: completion.total_tokens,
        })
    }

    /// [`Self::call`], replacing any failure with `fallback()`.
    async fn call_or<T, F>(
        &self,
        kind: AiCallKind,
        user_id: i64,
        prompt: String,
        fallback: F,
    ) -> Outcome<T>
    where
        T: DeserializeOwned + Validate,
        F: FnOnce() -> T,
    {
        match self.call::<T>(kind, prompt).await {
            Ok(reply) => Outcome {
                value: reply.value,
                fallback: false,
                total_tokens: reply.total_tokens,
            },
            Err(e) => {
                warn!(user_id, kind = ?kind, error = %e, "AI call failed, using fallback");
                Outcome {
                    value: fallback(),
                    fallback: true,
                    total_tokens: None,
                }
            }
        }
    }

    /// Rule-based suggestions from the published catalog.
    ///
    /// Honors the request's meal type, prep time and regions plus the
    /// user's allergies and cooking level.
    async fn local_suggestions(
        &self,
        context: &UserContext,
        request: &AiRecommendationRequest,
    ) -> Vec<RecipeSuggestion> {
        let filter = RecipeFilter {
            meal_type: request.meal_type,
            max_prep_time: request.max_prep_time,
            difficulties: context.cooking_level.allowed_difficulties().to_vec(),
            exclude_allergens: normalize_terms(&context.allergies),
            region_names: normalize_terms(&request.preferred_regions),
            ..Default::default()
        };
        let limit = i64::from(request.effective_count());

        match self.storage.find_recipes(&filter, limit, 0).await {
            Ok(recipes) => recipes
                .iter()
                .map(|r| RecipeSuggestion::from_recipe(r, FALLBACK_CONFIDENCE))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Could not load catalog for fallback suggestions");
                Vec::new()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn log_interaction(
        &self,
        user_id: i64,
        kind: AiCallKind,
        user_input: Value,
        context_data: Value,
        ai_response: Value,
        is_fallback: bool,
        processing_time_ms: i64,
        tokens_used: Option<i64>,
    ) {
        let interaction = NewInteraction {
            user_id,
            interaction_type: kind.interaction_type(),
            user_input,
            context_data,
            ai_model_used: self.model.model_name().to_string(),
            ai_response,
            is_fallback,
            confidence_score: confidence(is_fallback),
            processing_time_ms,
            tokens_used,
        };

        match self.storage.log_ai_interaction(&interaction).await {
            Ok(_) => info!(
                user_id,
                kind = ?kind,
                fallback = is_fallback,
                processing_time_ms,
                tokens_used,
                "AI interaction recorded"
            ),
            Err(e) => warn!(user_id, kind = ?kind, error = %e, "Failed to record AI interaction"),
        }
    }

    async fn save_recommendation(&self, recommendation: NewAiRecommendation) {
        if let Err(e) = self.storage.save_ai_recommendation(&recommendation).await {
            warn!(
                user_id = recommendation.user_id,
                error = %e,
                "Failed to store AI recommendation"
            );
        }
    }
}

fn confidence(fallback: bool) -> f64 {
    if fallback {
        FALLBACK_CONFIDENCE
    } else {
        SUCCESS_CONFIDENCE
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}
