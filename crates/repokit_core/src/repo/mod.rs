//! Repository façade.
//!
//! # Responsibility
//! - Expose every operation family by table name and by [`crate::Entity`]
//!   type, blocking and async.
//! - Resolve the connection for each call and hand it to the delegated
//!   operation in [`crate::ops`].
//!
//! # Invariants
//! - One call resolves at most one connection.
//! - Settings travel explicitly with each call; there is no global state.

pub mod base_repository;
pub mod db_repository;
mod db_repository_async;
pub mod error;
pub mod settings;

pub use base_repository::BaseRepository;
pub use db_repository::DbRepository;
pub use error::{RepoError, RepoResult};
pub use settings::RepositorySettings;
