// Database module
// SQLite for user accounts, LanceDB for the corpus vectors

pub mod lancedb;
pub mod sqlite;

pub use sqlite::models::{NewUser, User};
pub use sqlite::{Database, DbPool};
