pub mod model;
pub mod repository;

pub use model::{FoodDB, MealLogDB, ProfileDB, SyncActionDB};
pub use repository::{RecordSyncState, SqliteOfflineStore};
