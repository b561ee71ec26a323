//! Integration tests for mealwise API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API,
//! with a stub language model standing in for the hosted one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};
use tokio_test::assert_ok;
use tower::ServiceExt;

use mealwise::ai::AiGateway;
use mealwise::ai::client::{ChatCompletion, ChatRequest, LanguageModel, ModelError};
use mealwise::api::{AppState, router};
use mealwise::storage::Storage;

/// Replies with fixed text, or fails like a client without an API key.
struct StubModel {
    reply: Option<&'static str>,
}

#[async_trait]
impl LanguageModel for StubModel {
    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatCompletion, ModelError> {
        match self.reply {
            Some(text) => Ok(ChatCompletion {
                content: text.to_string(),
                total_tokens: Some(120),
            }),
            None => Err(ModelError::NotConfigured),
        }
    }
}

const INSIGHT_REPLY: &str = r#"{
    "title": "Cultural Heritage of Jollof Rice",
    "historical_origin": "Traced to the Wolof empire of the Senegambia region.",
    "cultural_significance": "Served at nearly every celebration in West Africa.",
    "traditional_occasions": ["weddings", "naming ceremonies"]
}"#;

async fn state_with(reply: Option<&'static str>) -> AppState {
    state_on("sqlite::memory:", reply).await
}

async fn state_on(database_url: &str, reply: Option<&'static str>) -> AppState {
    let storage = Storage::new(database_url).await.unwrap();
    let ai = AiGateway::new(
        Arc::new(StubModel { reply }),
        storage.clone(),
        Duration::from_secs(5),
    );
    AppState { storage, ai }
}

async fn create_test_server() -> TestServer {
    TestServer::new(router(state_with(None).await)).unwrap()
}

fn as_user(user_id: i64) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

async fn register(server: &TestServer, username: &str) -> i64 {
    let response = server
        .post("/users")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com")
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn reference_id(server: &TestServer, path: &str, name: &str) -> i64 {
    let items: Vec<Value> = server.get(path).await.json();
    items
        .iter()
        .find(|item| item["name"] == name)
        .and_then(|item| item["id"].as_i64())
        .unwrap()
}

/// Create a recipe as `user_id`, overriding the defaults with `overrides`.
async fn create_recipe(server: &TestServer, user_id: i64, name: &str, overrides: Value) -> i64 {
    let cuisine_id = reference_id(server, "/cuisines", "Nigerian").await;

    let mut body = json!({
        "name": name,
        "description": format!("A plate of {name}"),
        "cuisine_id": cuisine_id,
        "prep_time": 15,
        "cook_time": 30,
        "difficulty": "easy",
        "meal_type": "dinner",
        "ingredients": [{"name": "Rice", "quantity": 2.0, "unit": "cups"}],
        "instructions": [{"step_number": 1, "instruction": "Cook everything"}]
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }

    let (name, value) = as_user(user_id);
    let response = server
        .post("/recipes")
        .add_header(name, value)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);

    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn rate(server: &TestServer, user_id: i64, recipe_id: i64, rating: u8) -> Value {
    let (name, value) = as_user(user_id);
    let response = server
        .post(&format!("/recipes/{recipe_id}/ratings"))
        .add_header(name, value)
        .json(&json!({ "rating": rating }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn get_as(server: &TestServer, user_id: i64, path: &str) -> Value {
    let (name, value) = as_user(user_id);
    let response = server.get(path).add_header(name, value).await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_missing_or_unknown_user_is_unauthorized() {
    let server = create_test_server().await;

    server
        .get("/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = as_user(999);
    let response = server.get("/me").add_header(name, value).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "authentication required");
}

#[tokio::test]
async fn test_router_rejects_garbage_user_header() {
    let app = router(state_with(None).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/recipes/featured")
                .header("x-user-id", "not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reference_data_is_public() {
    let server = create_test_server().await;

    let regions: Vec<Value> = server.get("/regions").await.json();
    assert_eq!(regions.len(), 5);

    let west = reference_id(&server, "/regions", "West Africa").await;
    let cuisines: Vec<Value> = server.get(&format!("/cuisines?region={west}")).await.json();
    assert!(cuisines.iter().any(|c| c["name"] == "Ghanaian"));
    assert!(cuisines.iter().all(|c| c["region_id"] == west));

    let goals: Vec<Value> = server.get("/fitness-goals").await.json();
    let loss = goals.iter().find(|g| g["name"] == "Weight Loss").unwrap();
    assert_eq!(loss["target_calories_adjustment"], -500);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let server = create_test_server().await;
    register(&server, "kofi").await;

    server
        .post("/users")
        .json(&json!({"username": "kofi2", "email": "KOFI@example.com"}))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_profile_derives_calorie_target() {
    let server = create_test_server().await;
    let user = register(&server, "ama").await;

    let (name, value) = as_user(user);
    server
        .patch("/me")
        .add_header(name, value)
        .json(&json!({
            "gender": "F",
            "height": 165.0,
            "weight": 60.0,
            "date_of_birth": "1994-01-01"
        }))
        .await
        .assert_status_ok();

    let goal = reference_id(&server, "/fitness-goals", "Weight Loss").await;
    let (name, value) = as_user(user);
    let response = server
        .put("/me/profile")
        .add_header(name, value)
        .json(&json!({ "fitness_goal_ids": [goal], "activity_level": "moderate" }))
        .await;
    response.assert_status_ok();

    let profile: Value = response.json();
    assert!(profile["bmr"].as_i64().unwrap() > 1000);
    assert_eq!(
        profile["daily_calorie_target"].as_i64().unwrap(),
        (profile["bmr"].as_f64().unwrap() * 1.55).round() as i64 - 500
    );
}

#[tokio::test]
async fn test_rating_aggregates_follow_writes() {
    let server = create_test_server().await;
    let author = register(&server, "chef").await;
    let recipe = create_recipe(&server, author, "Jollof Rice", json!({})).await;

    let mut last_rating = Value::Null;
    for (i, value) in [4, 5, 3].into_iter().enumerate() {
        let rater = register(&server, &format!("rater{i}")).await;
        last_rating = rate(&server, rater, recipe, value).await;
    }

    let detail = get_as(&server, author, &format!("/recipes/{recipe}")).await;
    assert_eq!(detail["average_rating"], 4.0);
    assert_eq!(detail["total_ratings"], 3);

    let rating_id = last_rating["id"].as_i64().unwrap();
    let owner = last_rating["user_id"].as_i64().unwrap();

    // only the owner may delete
    let (name, value) = as_user(author);
    server
        .delete(&format!("/ratings/{rating_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = as_user(owner);
    server
        .delete(&format!("/ratings/{rating_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let detail = get_as(&server, author, &format!("/recipes/{recipe}")).await;
    assert_eq!(detail["average_rating"], 4.5);
    assert_eq!(detail["total_ratings"], 2);
}

#[tokio::test]
async fn test_duplicate_rating_conflicts() {
    let server = create_test_server().await;
    let user = register(&server, "yaw").await;
    let recipe = create_recipe(&server, user, "Waakye", json!({})).await;
    rate(&server, user, recipe, 5).await;

    let (name, value) = as_user(user);
    let response = server
        .post(&format!("/recipes/{recipe}/ratings"))
        .add_header(name, value)
        .json(&json!({ "rating": 4 }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(
        response.json::<Value>()["error"],
        "you have already rated this recipe"
    );
}

#[tokio::test]
async fn test_rating_out_of_range_is_rejected() {
    let server = create_test_server().await;
    let user = register(&server, "esi").await;
    let recipe = create_recipe(&server, user, "Kelewele", json!({})).await;

    let (name, value) = as_user(user);
    let response = server
        .post(&format!("/recipes/{recipe}/ratings"))
        .add_header(name, value)
        .json(&json!({ "rating": 6 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["fields"]["rating"].is_array());
}

#[tokio::test]
async fn test_search_filters_and_clamps_page_size() {
    let server = create_test_server().await;
    let user = register(&server, "tunde").await;
    create_recipe(
        &server,
        user,
        "Groundnut Soup",
        json!({ "allergen_warnings": ["Peanuts"] }),
    )
    .await;
    create_recipe(&server, user, "Jollof Rice", json!({})).await;
    create_recipe(
        &server,
        user,
        "Akara",
        json!({ "meal_type": "breakfast", "prep_time": 40 }),
    )
    .await;

    let (name, value) = as_user(user);
    let response = server
        .post("/recipes/search?page_size=100")
        .add_header(name, value)
        .json(&json!({ "exclude_allergens": ["peanuts"] }))
        .await;
    response.assert_status_ok();

    let page: Value = response.json();
    assert_eq!(page["page_size"], 50);
    assert_eq!(page["count"], 2);
    let names: Vec<&str> = page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert!(!names.contains(&"Groundnut Soup"));

    let (name, value) = as_user(user);
    let page: Value = server
        .post("/recipes/search?page=3&page_size=1")
        .add_header(name, value)
        .json(&json!({ "meal_type": "dinner", "max_prep_time": 20 }))
        .await
        .json();
    assert_eq!(page["count"], 2);
    assert!(page["results"].as_array().unwrap().is_empty());

    let (name, value) = as_user(user);
    server
        .post("/recipes/search?page=0")
        .add_header(name, value)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_respect_allergies_and_level() {
    let server = create_test_server().await;
    let user = register(&server, "nneka").await;
    let critic = register(&server, "critic").await;

    let peanut = create_recipe(
        &server,
        user,
        "Groundnut Soup",
        json!({ "allergen_warnings": ["peanuts"] }),
    )
    .await;
    let easy = create_recipe(&server, user, "Jollof Rice", json!({})).await;
    let hard = create_recipe(
        &server,
        user,
        "Ofada Stew",
        json!({ "difficulty": "hard" }),
    )
    .await;
    for recipe in [peanut, easy, hard] {
        rate(&server, critic, recipe, 5).await;
    }

    let peanuts = reference_id(&server, "/allergies", "Peanuts").await;
    let (name, value) = as_user(user);
    server
        .put("/me/profile")
        .add_header(name, value)
        .json(&json!({ "allergy_ids": [peanuts] }))
        .await
        .assert_status_ok();

    let (name, value) = as_user(user);
    let body: Value = server
        .post("/recipes/recommendations")
        .add_header(name, value)
        .json(&json!({}))
        .await
        .json();
    let ids: Vec<i64> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![easy]);

    // an explicit cooking level overrides the stored beginner level
    let (name, value) = as_user(user);
    let body: Value = server
        .post("/recipes/recommendations")
        .add_header(name, value)
        .json(&json!({ "cooking_level": "advanced", "count": 5 }))
        .await
        .json();
    assert_eq!(body["count"], 2);

    let (name, value) = as_user(user);
    server
        .post("/recipes/recommendations")
        .add_header(name, value)
        .json(&json!({ "count": 51 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cooking_session_completes_once() {
    let server = create_test_server().await;
    let user = register(&server, "kwame").await;
    let recipe = create_recipe(&server, user, "Banku", json!({})).await;

    let (name, value) = as_user(user);
    server
        .post(&format!("/recipes/{recipe}/save"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::CREATED);

    let session = json!({
        "cooking_started_at": "2024-03-01T18:00:00Z",
        "cooking_completed_at": "2024-03-01T18:45:00Z"
    });
    for _ in 0..2 {
        let (name, value) = as_user(user);
        let body: Value = server
            .patch(&format!("/recipes/{recipe}/interaction"))
            .add_header(name, value)
            .json(&session)
            .await
            .json();
        assert_eq!(body["status"], "completed");
        assert_eq!(body["times_cooked"], 1);
        assert_eq!(body["cooking_duration"], 45);
    }

    let stats = get_as(&server, user, "/me/stats").await;
    assert_eq!(stats["completed_recipes"], 1);
    assert_eq!(stats["total_cooking_time"], 45);

    let mine = get_as(&server, user, "/me/recipes?status=completed").await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_collections_are_private() {
    let server = create_test_server().await;
    let owner = register(&server, "owner").await;
    let other = register(&server, "other").await;
    let recipe = create_recipe(&server, owner, "Suya", json!({})).await;

    let (name, value) = as_user(owner);
    let created: Value = server
        .post("/collections")
        .add_header(name, value)
        .json(&json!({ "name": "Weeknight" }))
        .await
        .json();
    let collection = created["id"].as_i64().unwrap();

    for _ in 0..2 {
        let (name, value) = as_user(owner);
        let body: Value = server
            .post(&format!("/collections/{collection}/recipes/{recipe}"))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(body["recipe_count"], 1);
    }

    let (name, value) = as_user(other);
    server
        .get(&format!("/collections/{collection}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = as_user(owner);
    server
        .post("/collections")
        .add_header(name, value)
        .json(&json!({ "name": "Weeknight" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ai_routes_fall_back_without_model() {
    let state = state_with(None).await;
    let storage = state.storage.clone();
    let server = TestServer::new(router(state)).unwrap();
    let user = register(&server, "abena").await;
    create_recipe(&server, user, "Red Red", json!({})).await;

    let (name, value) = as_user(user);
    let reply: Value = server
        .post("/ai/recommendations")
        .add_header(name, value)
        .json(&json!({ "count": 3 }))
        .await
        .json();
    assert_eq!(reply["fallback"], true);
    assert_eq!(reply["recommendations"][0]["name"], "Red Red");

    let (name, value) = as_user(user);
    let plan: Value = server
        .post("/ai/meal-plan")
        .add_header(name, value)
        .json(&json!({ "days": 3 }))
        .await
        .json();
    assert_eq!(plan["fallback"], true);
    assert_eq!(plan["meal_plan"].as_object().unwrap().len(), 3);
    assert!(plan["meal_plan"]["day_01"]["breakfast"].is_string());

    let (name, value) = as_user(user);
    let substitutes: Value = server
        .post("/ai/ingredient-substitutes")
        .add_header(name, value)
        .json(&json!({ "ingredient": "palm oil" }))
        .await
        .json();
    assert_eq!(substitutes["fallback"], true);
    assert!(!substitutes["substitutes"].as_array().unwrap().is_empty());

    assert_eq!(assert_ok!(storage.count_ai_interactions(user).await), 3);
    let history = get_as(&server, user, "/ai/history").await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cultural_insight_is_stored_and_rated() {
    let state = state_with(Some(INSIGHT_REPLY)).await;
    let server = TestServer::new(router(state)).unwrap();
    let user = register(&server, "fatou").await;
    let stranger = register(&server, "stranger").await;
    let recipe = create_recipe(&server, user, "Jollof Rice", json!({})).await;

    let (name, value) = as_user(user);
    let insight: Value = server
        .post("/ai/cultural-insight")
        .add_header(name, value)
        .json(&json!({ "recipe_id": recipe }))
        .await
        .json();
    assert_eq!(insight["fallback"], false);
    assert_eq!(insight["traditional_occasions"][0], "weddings");

    let history = get_as(&server, user, "/ai/history").await;
    let record = &history.as_array().unwrap()[0];
    assert_eq!(record["type"], "cultural_insight");
    assert_eq!(record["content"]["recipe_id"], recipe);
    let recommendation_id = record["id"].as_i64().unwrap();

    let feedback = json!({
        "recommendation_id": recommendation_id,
        "rating": 5,
        "was_helpful": true
    });

    let (name, value) = as_user(stranger);
    server
        .post("/ai/feedback")
        .add_header(name, value)
        .json(&feedback)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = as_user(user);
    let stored: Value = server
        .post("/ai/feedback")
        .add_header(name, value)
        .json(&feedback)
        .await
        .json();
    assert_eq!(stored["user_rating"], 5);
    assert_eq!(stored["was_helpful"], true);

    let (name, value) = as_user(user);
    server
        .post("/ai/cultural-insight")
        .add_header(name, value)
        .json(&json!({ "recipe_id": 9999 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recommendations_skip_only_the_ten_latest_completions() {
    let server = create_test_server().await;
    let user = register(&server, "yaa").await;
    let critic = register(&server, "critic").await;

    let mut cooked = Vec::new();
    for i in 0..12 {
        let recipe = create_recipe(&server, user, &format!("Stew {i:02}"), json!({})).await;
        rate(&server, critic, recipe, 5).await;
        cooked.push(recipe);
    }
    let fresh = create_recipe(&server, user, "Waakye", json!({})).await;
    rate(&server, critic, fresh, 5).await;

    // completed in creation order, but cooked on days running backwards, so
    // the two oldest completions are the last two recipes created
    for (i, recipe) in cooked.iter().enumerate() {
        let day = 12 - i;
        let (name, value) = as_user(user);
        let body: Value = server
            .patch(&format!("/recipes/{recipe}/interaction"))
            .add_header(name, value)
            .json(&json!({
                "cooking_started_at": format!("2024-03-{day:02}T18:00:00Z"),
                "cooking_completed_at": format!("2024-03-{day:02}T19:00:00Z")
            }))
            .await
            .json();
        assert_eq!(body["status"], "completed");
    }

    let (name, value) = as_user(user);
    let body: Value = server
        .post("/recipes/recommendations")
        .add_header(name, value)
        .json(&json!({ "count": 50 }))
        .await
        .json();
    let mut ids: Vec<i64> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, vec![cooked[10], cooked[11], fresh]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ratings_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}/mealwise.db?mode=rwc", dir.path().display());
    let app = router(state_on(&url, None).await);
    let server = TestServer::new(app.clone()).unwrap();

    let author = register(&server, "author").await;
    let recipe = create_recipe(&server, author, "Kelewele", json!({})).await;
    let mut raters = Vec::new();
    for i in 0..12 {
        raters.push(register(&server, &format!("rater{i}")).await);
    }

    let tasks: Vec<_> = raters
        .into_iter()
        .enumerate()
        .map(|(i, user)| {
            let app = app.clone();
            tokio::spawn(async move {
                let request = Request::builder()
                    .method("POST")
                    .uri(format!("/recipes/{recipe}/ratings"))
                    .header("x-user-id", user.to_string())
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "rating": i % 5 + 1 }).to_string()))
                    .unwrap();
                app.oneshot(request).await.unwrap().status()
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::CREATED);
    }

    // 1..=5 twice, then 1 and 2
    let body = get_as(&server, author, &format!("/recipes/{recipe}")).await;
    assert_eq!(body["total_ratings"], 12);
    assert_eq!(body["average_rating"], 2.75);
}

#[tokio::test]
async fn test_recipe_edits_are_for_the_author_only() {
    let server = create_test_server().await;
    let author = register(&server, "chef").await;
    let other = register(&server, "diner").await;
    let draft = create_recipe(
        &server,
        author,
        "Kontomire Stew",
        json!({ "is_published": false }),
    )
    .await;

    let (name, value) = as_user(author);
    server
        .get(&format!("/recipes/{draft}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let edit = json!({ "is_published": true, "cook_time": 45 });
    let (name, value) = as_user(other);
    server
        .patch(&format!("/recipes/{draft}"))
        .add_header(name, value)
        .json(&edit)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = as_user(author);
    let body: Value = server
        .patch(&format!("/recipes/{draft}"))
        .add_header(name, value)
        .json(&edit)
        .await
        .json();
    assert_eq!(body["is_published"], true);
    assert_eq!(body["total_time"], 60);
    assert_eq!(body["total_ratings"], 0);

    let body = get_as(&server, other, &format!("/recipes/{draft}")).await;
    assert_eq!(body["name"], "Kontomire Stew");

    let (name, value) = as_user(author);
    server
        .patch(&format!("/recipes/{draft}"))
        .add_header(name, value)
        .json(&json!({ "instructions": [] }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meal_plan_lifecycle() {
    let server = create_test_server().await;
    let owner = register(&server, "adwoa").await;
    let other = register(&server, "kojo").await;
    let jollof = create_recipe(&server, owner, "Jollof Rice", json!({})).await;
    let koko = create_recipe(
        &server,
        owner,
        "Koko",
        json!({ "meal_type": "breakfast" }),
    )
    .await;

    let (name, value) = as_user(owner);
    server
        .post("/meal-plans")
        .add_header(name, value)
        .json(&json!({ "start_date": "2026-01-11", "end_date": "2026-01-05" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = as_user(owner);
    let response = server
        .post("/meal-plans")
        .add_header(name, value)
        .json(&json!({ "start_date": "2026-01-05", "end_date": "2026-01-11" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let plan: Value = response.json();
    assert_eq!(plan["name"], "My Meal Plan");
    assert_eq!(plan["is_active"], true);
    let plan_id = plan["id"].as_i64().unwrap();

    let entries_path = format!("/meal-plans/{plan_id}/entries");
    let dinner = json!({ "recipe_id": jollof, "date": "2026-01-06", "meal_type": "dinner" });
    let (name, value) = as_user(owner);
    let response = server
        .post(&entries_path)
        .add_header(name, value)
        .json(&dinner)
        .await;
    response.assert_status(StatusCode::CREATED);
    let entry: Value = response.json();
    assert_eq!(entry["servings"], 1);
    assert_eq!(entry["recipe_name"], "Jollof Rice");
    let entry_id = entry["id"].as_i64().unwrap();

    let (name, value) = as_user(owner);
    server
        .post(&entries_path)
        .add_header(name, value)
        .json(&dinner)
        .await
        .assert_status(StatusCode::CONFLICT);

    let (name, value) = as_user(owner);
    server
        .post(&entries_path)
        .add_header(name, value)
        .json(&json!({ "recipe_id": koko, "date": "2026-01-12", "meal_type": "breakfast" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = as_user(owner);
    server
        .post(&entries_path)
        .add_header(name, value)
        .json(&json!({ "recipe_id": koko, "date": "2026-01-06", "meal_type": "breakfast" }))
        .await
        .assert_status(StatusCode::CREATED);

    let entries = get_as(&server, owner, &entries_path).await;
    let meals: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["meal_type"].as_str().unwrap())
        .collect();
    assert_eq!(meals, vec!["breakfast", "dinner"]);

    let (name, value) = as_user(other);
    server
        .get(&format!("/meal-plans/{plan_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let (name, value) = as_user(other);
    server
        .patch(&format!("/meal-plan-entries/{entry_id}"))
        .add_header(name, value)
        .json(&json!({ "servings": 6 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = as_user(owner);
    let moved: Value = server
        .patch(&format!("/meal-plan-entries/{entry_id}"))
        .add_header(name, value)
        .json(&json!({ "date": "2026-01-07", "servings": 6 }))
        .await
        .json();
    assert_eq!(moved["date"], "2026-01-07");
    assert_eq!(moved["servings"], 6);

    let (name, value) = as_user(owner);
    server
        .delete(&format!("/meal-plan-entries/{entry_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let (name, value) = as_user(owner);
    server
        .delete(&format!("/meal-plans/{plan_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let plans = get_as(&server, owner, "/meal-plans").await;
    assert!(plans.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_shopping_list_lifecycle() {
    let server = create_test_server().await;
    let owner = register(&server, "esi").await;
    let other = register(&server, "kwesi").await;

    let (name, value) = as_user(owner);
    let response = server
        .post("/shopping-lists")
        .add_header(name, value)
        .json(&json!({ "name": "Makola market" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let list_id = response.json::<Value>()["id"].as_i64().unwrap();
    let items_path = format!("/shopping-lists/{list_id}/items");

    let mut item_ids = Vec::new();
    for (item, category, price) in [("Plantain", "produce", 3.5), ("Shito", "pantry", 6.0)] {
        let (name, value) = as_user(owner);
        let response = server
            .post(&items_path)
            .add_header(name, value)
            .json(&json!({
                "name": item,
                "quantity": "1",
                "category": category,
                "estimated_price": price
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        item_ids.push(response.json::<Value>()["id"].as_i64().unwrap());
    }

    let (name, value) = as_user(owner);
    server
        .post(&items_path)
        .add_header(name, value)
        .json(&json!({ "name": "Gari", "estimated_price": -1.0 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = as_user(owner);
    let item: Value = server
        .patch(&format!("/shopping-list-items/{}", item_ids[0]))
        .add_header(name, value)
        .json(&json!({ "is_purchased": true }))
        .await
        .json();
    assert_eq!(item["is_purchased"], true);

    let list = get_as(&server, owner, &format!("/shopping-lists/{list_id}")).await;
    assert_eq!(list["items"][0]["name"], "Shito");
    assert_eq!(list["estimated_remaining"], 6.0);

    let (name, value) = as_user(other);
    server
        .get(&items_path)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let (name, value) = as_user(other);
    server
        .delete(&format!("/shopping-list-items/{}", item_ids[1]))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = as_user(owner);
    server
        .delete(&format!("/shopping-lists/{list_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let (name, value) = as_user(owner);
    server
        .get(&format!("/shopping-list-items/{}", item_ids[1]))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
