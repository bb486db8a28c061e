//! Domain models for the mirrored tables and the tagged payload union.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Canonical list of local tables that participate in offline sync.
pub const SYNC_TABLES: [&str; 3] = ["meal_logs", "foods", "profiles"];

/// Meal types accepted at the cache store's write boundary.
pub const MEAL_TYPES: [&str; 4] = ["breakfast", "lunch", "dinner", "snack"];

/// Mirrored table names used by cache records and sync actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    MealLogs,
    Foods,
    Profiles,
}

impl SyncTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTable::MealLogs => "meal_logs",
            SyncTable::Foods => "foods",
            SyncTable::Profiles => "profiles",
        }
    }

    pub fn from_table_name(name: &str) -> Result<Self> {
        match name {
            "meal_logs" => Ok(SyncTable::MealLogs),
            "foods" => Ok(SyncTable::Foods),
            "profiles" => Ok(SyncTable::Profiles),
            other => Err(Error::UnsupportedTable(other.to_string())),
        }
    }
}

/// Fresh id for a locally-created record.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One logged meal with aggregated nutrient totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLog {
    pub id: String,
    pub user_id: String,
    pub meal_type: String,
    pub date: String,
    #[serde(default = "default_food_items")]
    pub food_items: serde_json::Value,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: String,
}

fn default_food_items() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

/// Reference-data food entry (per-100g nutrient values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    #[serde(default)]
    pub category: Option<String>,
}

/// Per-user profile with daily nutrient goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub daily_calorie_goal: Option<f64>,
    #[serde(default)]
    pub daily_protein_goal: Option<f64>,
    #[serde(default)]
    pub daily_carbs_goal: Option<f64>,
    #[serde(default)]
    pub daily_fat_goal: Option<f64>,
    #[serde(default)]
    pub onboarding_completed: bool,
}

/// Tagged payload union: one variant per mirrored table. Schema validation
/// happens at the cache store's write boundary, not at each call site.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    MealLog(MealLog),
    Food(Food),
    Profile(Profile),
}

impl RecordPayload {
    pub fn table(&self) -> SyncTable {
        match self {
            RecordPayload::MealLog(_) => SyncTable::MealLogs,
            RecordPayload::Food(_) => SyncTable::Foods,
            RecordPayload::Profile(_) => SyncTable::Profiles,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecordPayload::MealLog(log) => &log.id,
            RecordPayload::Food(food) => &food.id,
            RecordPayload::Profile(profile) => &profile.id,
        }
    }

    /// Serialize the inner record to the JSON shape the remote store accepts.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            RecordPayload::MealLog(log) => serde_json::to_value(log)?,
            RecordPayload::Food(food) => serde_json::to_value(food)?,
            RecordPayload::Profile(profile) => serde_json::to_value(profile)?,
        };
        Ok(value)
    }

    /// Reconstruct a payload from a table discriminant plus raw JSON.
    pub fn from_table_json(table: SyncTable, value: serde_json::Value) -> Result<Self> {
        Ok(match table {
            SyncTable::MealLogs => RecordPayload::MealLog(serde_json::from_value(value)?),
            SyncTable::Foods => RecordPayload::Food(serde_json::from_value(value)?),
            SyncTable::Profiles => RecordPayload::Profile(serde_json::from_value(value)?),
        })
    }

    /// Enforced before any cache write or enqueue.
    pub fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(Error::validation("record id must not be empty"));
        }
        match self {
            RecordPayload::MealLog(log) => {
                if log.user_id.trim().is_empty() {
                    return Err(Error::validation("meal log user_id must not be empty"));
                }
                if !MEAL_TYPES.contains(&log.meal_type.as_str()) {
                    return Err(Error::validation(format!(
                        "unknown meal_type '{}'",
                        log.meal_type
                    )));
                }
                if !log.food_items.is_array() {
                    return Err(Error::validation("food_items must be a JSON array"));
                }
                for (field, value) in [
                    ("total_calories", log.total_calories),
                    ("total_protein", log.total_protein),
                    ("total_carbs", log.total_carbs),
                    ("total_fat", log.total_fat),
                ] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(Error::validation(format!(
                            "{} must be a non-negative number",
                            field
                        )));
                    }
                }
            }
            RecordPayload::Food(food) => {
                if food.name.trim().is_empty() {
                    return Err(Error::validation("food name must not be empty"));
                }
                for (field, value) in [
                    ("calories_per_100g", food.calories_per_100g),
                    ("protein_per_100g", food.protein_per_100g),
                    ("carbs_per_100g", food.carbs_per_100g),
                    ("fat_per_100g", food.fat_per_100g),
                ] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(Error::validation(format!(
                            "{} must be a non-negative number",
                            field
                        )));
                    }
                }
            }
            RecordPayload::Profile(profile) => {
                if profile.user_id.trim().is_empty() {
                    return Err(Error::validation("profile user_id must not be empty"));
                }
                if let Some(age) = profile.age {
                    if !(0..=150).contains(&age) {
                        return Err(Error::validation("age out of range"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Filters understood by the cache store's `query` operation. These cover the
/// read paths the application actually uses; everything else goes through
/// `get`.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheFilter {
    /// All rows of one table, up to the table's default limit.
    All(SyncTable),
    /// Case-insensitive substring search over food name and English name.
    FoodSearch { term: String },
    /// Meal logs for one user, optionally narrowed to a single date.
    MealLogsFor {
        user_id: String,
        date: Option<String>,
    },
    /// The (unique) profile belonging to one user.
    ProfileFor { user_id: String },
}

impl CacheFilter {
    pub fn table(&self) -> SyncTable {
        match self {
            CacheFilter::All(table) => *table,
            CacheFilter::FoodSearch { .. } => SyncTable::Foods,
            CacheFilter::MealLogsFor { .. } => SyncTable::MealLogs,
            CacheFilter::ProfileFor { .. } => SyncTable::Profiles,
        }
    }
}
