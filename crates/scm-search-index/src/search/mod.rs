//! Searching one type's index.
//!
//! A [`QueryBuilder`] takes a query string through three stages:
//!
//! 1. **Compilation**: the input is detected as best-guess or exact syntax and compiled
//!    against the type's field mapping, restricted to the type and to every scope filter.
//!    See [`QueryCompiler`].
//!
//! 2. **Collection**: a permission-aware collector checks each candidate's permission tag
//!    while scoring and keeps only the best `start + limit` permitted candidates. See
//!    [`PermissionCollector`].
//!
//! 3. **Loading**: stored documents are loaded for the returned window only, and
//!    highlighted fields are replaced by marked-up fragments.

mod builder;
mod collector;
mod compile;
mod result;

pub use builder::{DEFAULT_LIMIT, QueryBuilder};
pub use collector::{Candidate, CollectedHits, PermissionCollector};
pub use compile::{CompiledQuery, QueryCompiler};
pub use result::{CountMode, CountResult, Hit, HitField, QueryResult, QueryType};
