//! Storage interfaces for issuance state.
//!
//! - [`HandleStore`] - single-use authorization and refresh handles
//! - [`ApplicationStorage`] - resolves applications for persistent handle stores
//!
//! # Implementations
//!
//! - [`InMemoryHandleStore`] - process-local store backed by `DashMap`
//! - `authz-issuer-postgres` - PostgreSQL storage backend

pub mod application;
pub mod handle;
pub mod memory;

pub use application::{ApplicationStorage, StaticApplicationStorage};
pub use handle::{HandleStore, TakeOutcome};
pub use memory::InMemoryHandleStore;
