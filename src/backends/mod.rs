//! Driver adapters
//!
//! One adapter per vendor, each implementing the capability traits in
//! [`crate::core::driver`]. Adapters are selected with Cargo features.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(any(feature = "postgres", feature = "mysql"))]
mod placeholders;

#[cfg(feature = "sqlite")]
pub use self::sqlite::{SqliteConnection, SqliteDriver};

#[cfg(feature = "postgres")]
pub use self::postgres::{PgValue, PostgresConnection, PostgresDriver};

#[cfg(feature = "mysql")]
pub use self::mysql::{MySqlConnection, MySqlDriver};
