//! Database models for the cache tables and the sync-action log.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use kolayfit_core::errors::Result;
use kolayfit_core::models::{Food, MealLog, Profile};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::meal_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MealLogDB {
    pub id: String,
    pub user_id: String,
    pub meal_type: String,
    pub date: String,
    pub food_items: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub synced: i32,
    pub sync_error: i32,
}

impl MealLogDB {
    pub fn from_domain(log: &MealLog, synced: bool) -> Result<Self> {
        Ok(Self {
            id: log.id.clone(),
            user_id: log.user_id.clone(),
            meal_type: log.meal_type.clone(),
            date: log.date.clone(),
            food_items: serde_json::to_string(&log.food_items)?,
            total_calories: log.total_calories,
            total_protein: log.total_protein,
            total_carbs: log.total_carbs,
            total_fat: log.total_fat,
            photo_url: log.photo_url.clone(),
            notes: log.notes.clone(),
            created_at: log.created_at.clone(),
            synced: i32::from(synced),
            sync_error: 0,
        })
    }

    pub fn into_domain(self) -> Result<MealLog> {
        Ok(MealLog {
            id: self.id,
            user_id: self.user_id,
            meal_type: self.meal_type,
            date: self.date,
            food_items: serde_json::from_str(&self.food_items)?,
            total_calories: self.total_calories,
            total_protein: self.total_protein,
            total_carbs: self.total_carbs,
            total_fat: self.total_fat,
            photo_url: self.photo_url,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::foods)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FoodDB {
    pub id: String,
    pub name: String,
    pub name_en: Option<String>,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    pub category: Option<String>,
    pub synced: i32,
    pub sync_error: i32,
}

impl FoodDB {
    pub fn from_domain(food: &Food, synced: bool) -> Self {
        Self {
            id: food.id.clone(),
            name: food.name.clone(),
            name_en: food.name_en.clone(),
            calories_per_100g: food.calories_per_100g,
            protein_per_100g: food.protein_per_100g,
            carbs_per_100g: food.carbs_per_100g,
            fat_per_100g: food.fat_per_100g,
            category: food.category.clone(),
            synced: i32::from(synced),
            sync_error: 0,
        }
    }
}

impl From<FoodDB> for Food {
    fn from(row: FoodDB) -> Self {
        Food {
            id: row.id,
            name: row.name,
            name_en: row.name_en,
            calories_per_100g: row.calories_per_100g,
            protein_per_100g: row.protein_per_100g,
            carbs_per_100g: row.carbs_per_100g,
            fat_per_100g: row.fat_per_100g,
            category: row.category,
        }
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProfileDB {
    pub id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
    pub daily_calorie_goal: Option<f64>,
    pub daily_protein_goal: Option<f64>,
    pub daily_carbs_goal: Option<f64>,
    pub daily_fat_goal: Option<f64>,
    pub onboarding_completed: i32,
    pub synced: i32,
    pub sync_error: i32,
}

impl ProfileDB {
    pub fn from_domain(profile: &Profile, synced: bool) -> Self {
        Self {
            id: profile.id.clone(),
            user_id: profile.user_id.clone(),
            name: profile.name.clone(),
            age: profile.age,
            weight: profile.weight,
            height: profile.height,
            gender: profile.gender.clone(),
            activity_level: profile.activity_level.clone(),
            daily_calorie_goal: profile.daily_calorie_goal,
            daily_protein_goal: profile.daily_protein_goal,
            daily_carbs_goal: profile.daily_carbs_goal,
            daily_fat_goal: profile.daily_fat_goal,
            onboarding_completed: i32::from(profile.onboarding_completed),
            synced: i32::from(synced),
            sync_error: 0,
        }
    }
}

impl From<ProfileDB> for Profile {
    fn from(row: ProfileDB) -> Self {
        Profile {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            age: row.age,
            weight: row.weight,
            height: row.height,
            gender: row.gender,
            activity_level: row.activity_level,
            daily_calorie_goal: row.daily_calorie_goal,
            daily_protein_goal: row.daily_protein_goal,
            daily_carbs_goal: row.daily_carbs_goal,
            daily_fat_goal: row.daily_fat_goal,
            onboarding_completed: row.onboarding_completed != 0,
        }
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(sequence_id))]
#[diesel(table_name = crate::schema::sync_actions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncActionDB {
    pub sequence_id: i64,
    pub table_name: String,
    pub action_type: String,
    pub payload: String,
    pub created_at: String,
}
