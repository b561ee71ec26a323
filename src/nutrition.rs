//! Calorie targets derived from a user's body measurements.
//!
//! Basal metabolic rate uses the Mifflin-St Jeor equation:
//!
//! - male: `10 * kg + 6.25 * cm - 5 * age + 5`
//! - otherwise: `10 * kg + 6.25 * cm - 5 * age - 161`
//!
//! The daily target is BMR times the activity multiplier plus the sum of the
//! user's fitness goal adjustments. Both values are `None` unless height,
//! weight, age and gender are all known. Rounding is half to even, so a BMR
//! of exactly 1326.5 is stored as 1326.

use chrono::{Datelike, NaiveDate};

use crate::model::{ActivityLevel, FitnessGoal, Gender, UserAccount};

/// Derived calorie figures stored on the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalorieTargets {
    pub bmr: Option<i64>,
    pub daily_calorie_target: Option<i64>,
}

/// Whole years elapsed between `date_of_birth` and `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Mifflin-St Jeor basal metabolic rate in kcal/day, unrounded.
pub fn basal_metabolic_rate(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    match gender {
        Gender::M => base + 5.0,
        Gender::F | Gender::O | Gender::P => base - 161.0,
    }
}

/// Compute BMR and daily calorie target for an account.
pub fn calorie_targets(
    account: &UserAccount,
    activity: ActivityLevel,
    goals: &[FitnessGoal],
    today: NaiveDate,
) -> CalorieTargets {
    let age = account.date_of_birth.and_then(|dob| age_on(dob, today));

    let (Some(weight), Some(height), Some(age), Some(gender)) =
        (account.weight, account.height, age, account.gender)
    else {
        return CalorieTargets::default();
    };

    let bmr = basal_metabolic_rate(weight, height, age, gender).round_ties_even();
    let adjustment: i64 = goals.iter().map(|g| g.target_calories_adjustment).sum();
    let daily = bmr * activity.multiplier() + adjustment as f64;

    CalorieTargets {
        bmr: Some(bmr as i64),
        daily_calorie_target: Some(daily.round_ties_even() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CookingLevel;
    use chrono::Utc;

    fn account(gender: Option<Gender>) -> UserAccount {
        UserAccount {
            id: 1,
            username: "amara".to_string(),
            email: "amara@example.com".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1994, 6, 15),
            gender,
            height: Some(180.0),
            weight: Some(80.0),
            country: String::new(),
            city: String::new(),
            location: String::new(),
            cooking_level: CookingLevel::Beginner,
            family_size: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn goal(adjustment: i64) -> FitnessGoal {
        FitnessGoal {
            id: 1,
            name: "Weight loss".to_string(),
            description: String::new(),
            target_calories_adjustment: adjustment,
        }
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let dob = NaiveDate::from_ymd_opt(1994, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), Some(29));
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), Some(30));
    }

    #[test]
    fn test_bmr_male_and_female() {
        // base: 800 + 1125 - 150 = 1775
        assert_eq!(basal_metabolic_rate(80.0, 180.0, 30, Gender::M), 1780.0);
        assert_eq!(basal_metabolic_rate(80.0, 180.0, 30, Gender::F), 1614.0);
    }

    #[test]
    fn test_daily_target_with_goals() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let targets = calorie_targets(
            &account(Some(Gender::M)),
            ActivityLevel::Sedentary,
            &[goal(-500)],
            today,
        );

        assert_eq!(targets.bmr, Some(1780));
        // 1780 * 1.2 - 500
        assert_eq!(targets.daily_calorie_target, Some(1636));
    }

    #[test]
    fn test_half_calories_round_to_even() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut light = account(Some(Gender::F));
        light.weight = Some(60.0);
        light.height = Some(166.0);

        // 600 + 1037.5 - 150 - 161 = 1326.5
        let targets = calorie_targets(&light, ActivityLevel::Sedentary, &[], today);
        assert_eq!(targets.bmr, Some(1326));
        // 1326 * 1.2 = 1591.2
        assert_eq!(targets.daily_calorie_target, Some(1591));

        // 600 + 1037.5 - 150 + 5 = 1492.5
        light.gender = Some(Gender::M);
        let targets = calorie_targets(&light, ActivityLevel::Sedentary, &[], today);
        assert_eq!(targets.bmr, Some(1492));
    }

    #[test]
    fn test_targets_require_all_measurements() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let no_gender = calorie_targets(&account(None), ActivityLevel::Moderate, &[], today);
        assert_eq!(no_gender, CalorieTargets::default());

        let mut no_weight = account(Some(Gender::F));
        no_weight.weight = None;
        let targets = calorie_targets(&no_weight, ActivityLevel::Moderate, &[], today);
        assert!(targets.bmr.is_none());
        assert!(targets.daily_calorie_target.is_none());
    }
}
