/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: List, fetch and create users
/// - `posts`: List and fetch posts

pub mod health;
pub mod posts;
pub mod users;
