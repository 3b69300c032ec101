/// Post endpoints
///
/// Read-only; posts are written by other tooling.
///
/// - `GET /posts` - List all posts (order is unspecified)
/// - `GET /posts/:id` - Fetch one post

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use rowgate_shared::db::store::ConnectionManager;
use rowgate_shared::models::post::Post;

/// List posts
pub async fn list_posts<M: ConnectionManager>(
    State(state): State<AppState<M>>,
) -> ApiResult<Json<Vec<Post>>> {
    let mut conn = state.pool.acquire().await?;
    let posts = Post::list(&mut conn).await?;

    Ok(Json(posts))
}

/// Fetch a single post
pub async fn get_post<M: ConnectionManager>(
    State(state): State<AppState<M>>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<Post>> {
    let Path(id) = id?;

    let mut conn = state.pool.acquire().await?;
    let post = Post::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Post {} not found", id)))?;

    Ok(Json(post))
}
