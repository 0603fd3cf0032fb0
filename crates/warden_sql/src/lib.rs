//! Read-only SQL validation and the SQLite database handle used by the SQL
//! tools.

mod database;
pub mod error;
pub mod guard;

pub use database::{Database, QueryOutput};
pub use error::Error;
pub use guard::{DEFAULT_LIMIT, RejectedStatement, sanitize, sanitize_with_limit};
