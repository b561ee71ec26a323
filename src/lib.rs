//! mealwise - a meal-planning backend for African cuisine.
//!
//! # Overview
//!
//! mealwise serves a recipe catalog with ratings, per-user recipe
//! interactions and collections, meal plans and shopping lists, personalized
//! recommendations, and a set of AI-assisted features behind a gateway that
//! never fails the request.
//!
//! # Health data
//!
//! Profiles carry allergies, health conditions and body measurements. They
//! are used for filtering and prompts but never written to the log.
//!
//! # Modules
//!
//! - [`model`]: Domain types and request bodies
//! - [`storage`]: SQLite storage layer
//! - [`aggregation`]: Recipe rating aggregates
//! - [`search`]: Recipe filter and search engine
//! - [`recommend`]: Personalized recommendation selector
//! - [`nutrition`]: BMR and daily calorie targets
//! - [`ai`]: Model client, prompts, reply schemas and the fallback gateway
//! - [`api`]: HTTP API handlers
//! - [`config`]: Environment configuration
//! - [`error`]: Error type and HTTP mapping

pub mod aggregation;
pub mod ai;
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod nutrition;
pub mod recommend;
pub mod search;
pub mod storage;
