//! Data-access collaborators used by the auth and chat layers
//!
//! These are thin adapters over Postgres. Routes and sessions only see the traits,
//! so tests can substitute in-memory implementations.

pub mod accounts;
pub mod comments;

pub use accounts::{Account, AccountDirectory, PgAccountDirectory};
pub use comments::{CommentStore, PgCommentStore};
