/// Typed records for the rowgate tables
///
/// Each model is a plain struct with an explicit `from_row` mapping and thin
/// helpers that run its queries over any [`crate::db::store::StoreConnection`].
///
/// # Models
///
/// - `user`: users (list, find, create)
/// - `post`: posts (list, find)

pub mod post;
pub mod user;
