//! Database type definitions
//!
//! This module defines the database vendors an adapter can target.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    /// SQLite database
    Sqlite,
    /// PostgreSQL database
    Postgres,
    /// MySQL/MariaDB database
    Mysql,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Mysql => "mysql",
        }
    }

    /// Named-parameter prefixes the vendor's SQL dialect accepts
    pub fn parameter_prefixes(&self) -> &'static [char] {
        match self {
            DatabaseType::Sqlite => &['@', ':', '$'],
            DatabaseType::Postgres | DatabaseType::Mysql => &['@'],
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "npgsql" => Ok(DatabaseType::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            "mysql" | "mariadb" => Ok(DatabaseType::Mysql),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}
