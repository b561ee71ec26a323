//! Rating aggregation for recipes.
//!
//! A recipe's `average_rating` and `total_ratings` are always derived from
//! its full set of ratings. They are recomputed from scratch after every
//! rating insert, update or delete, inside the same transaction as the
//! write, so no reader sees a count that disagrees with the rating rows.

use sqlx::{Row, SqliteConnection};

/// Aggregate rating figures for one recipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingAggregate {
    /// Arithmetic mean of all rating values; 0.0 without ratings.
    pub average_rating: f64,

    /// Number of ratings.
    pub total_ratings: i64,
}

impl RatingAggregate {
    /// Compute the aggregate of a set of rating values.
    ///
    /// An empty set resets both figures to zero.
    pub fn from_values(values: &[i64]) -> Self {
        if values.is_empty() {
            return RatingAggregate {
                average_rating: 0.0,
                total_ratings: 0,
            };
        }

        let total: i64 = values.iter().sum();
        let count = values.len() as i64;

        RatingAggregate {
            average_rating: total as f64 / count as f64,
            total_ratings: count,
        }
    }
}

/// Recompute and store the aggregate for a recipe.
///
/// Must be called on the connection (or transaction) that performed the
/// rating write, before it commits.
///
/// # Arguments
///
/// * `conn` - Connection or transaction holding the rating write
/// * `recipe_id` - The recipe whose ratings changed
pub async fn recompute_recipe_rating(
    conn: &mut SqliteConnection,
    recipe_id: i64,
) -> Result<RatingAggregate, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT rating
        FROM recipe_ratings
        WHERE recipe_id = ?
        "#,
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await?;

    let values = rows
        .iter()
        .map(|r| r.try_get("rating"))
        .collect::<Result<Vec<i64>, _>>()?;
    let aggregate = RatingAggregate::from_values(&values);

    sqlx::query(
        r#"
        UPDATE recipes
        SET average_rating = ?, total_ratings = ?
        WHERE id = ?
        "#,
    )
    .bind(aggregate.average_rating)
    .bind(aggregate.total_ratings)
    .bind(recipe_id)
    .execute(&mut *conn)
    .await?;

    Ok(aggregate)
}
