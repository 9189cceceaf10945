//! Shared error plumbing for the login crates.
//!
//! Nothing here but the `Result` alias over rootcause's `Report`. Domain
//! errors live in the crate that raises them; callers attach their own
//! context with `.context()` on the way up rather than wrapping in yet
//! another enum.

use rootcause::Report;

/// Result alias carrying a rootcause `Report` on the error side.
///
/// The context parameter defaults to `()`; crates substitute their own
/// error type, as in `Result<TierSet, ClusterApiError>`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
