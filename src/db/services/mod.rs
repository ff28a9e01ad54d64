//! Database access for the voting tables.
//!
//! Route handlers go through these services; nothing else touches sea-orm
//! queries directly.

use sea_orm::{DbErr, SqlErr};

pub mod influenceur_service;
pub mod vote_service;

pub use influenceur_service::*;
pub use vote_service::*;

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
