/// User endpoints
///
/// # Endpoints
///
/// - `GET /users` - List all users (order is unspecified)
/// - `GET /users/:id` - Fetch one user
/// - `POST /users` - Create a user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use rowgate_shared::db::store::ConnectionManager;
use rowgate_shared::models::user::{CreateUser, User};
use serde::Deserialize;
use validator::Validate;

/// Create user request
///
/// Fields are optional at the serde level so a missing field is reported as
/// a validation error rather than a deserialization failure.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Display name
    #[validate(
        required(message = "Name is required"),
        length(min = 1, message = "Name must not be empty")
    )]
    pub name: Option<String>,

    /// Email address, must be unique
    #[validate(
        required(message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: Option<String>,
}

impl CreateUserRequest {
    /// Validates the request and converts it into insert input
    ///
    /// Values are passed through unchanged; whitespace-only names are rejected.
    pub fn into_create_user(self) -> ApiResult<CreateUser> {
        self.validate()?;

        match (self.name, self.email) {
            (Some(name), Some(email)) => {
                if name.trim().is_empty() {
                    return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
                        field: "name".to_string(),
                        message: "Name must not be blank".to_string(),
                    }]));
                }
                Ok(CreateUser { name, email })
            }
            // `required` already rejected missing fields
            _ => Err(ApiError::BadRequest("name and email are required".to_string())),
        }
    }
}

/// List users
///
/// # Endpoint
///
/// ```text
/// GET /users
/// ```
///
/// # Response
///
/// ```json
/// [
///   { "id": 1, "name": "Ada", "email": "ada@example.com" }
/// ]
/// ```
///
/// # Errors
///
/// - `500 Internal Server Error`: Store fault
/// - `503 Service Unavailable`: No connection available
pub async fn list_users<M: ConnectionManager>(
    State(state): State<AppState<M>>,
) -> ApiResult<Json<Vec<User>>> {
    let mut conn = state.pool.acquire().await?;
    let users = User::list(&mut conn).await?;

    Ok(Json(users))
}

/// Fetch a single user
///
/// # Errors
///
/// - `400 Bad Request`: `id` is not an integer
/// - `404 Not Found`: No such user
pub async fn get_user<M: ConnectionManager>(
    State(state): State<AppState<M>>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<User>> {
    let Path(id) = id?;

    let mut conn = state.pool.acquire().await?;
    let user = User::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))?;

    Ok(Json(user))
}

/// Create a user
///
/// Validation happens before a connection is leased, so invalid input never
/// reaches the store.
///
/// # Endpoint
///
/// ```text
/// POST /users
/// Content-Type: application/json
///
/// {
///   "name": "Ada",
///   "email": "ada@example.com"
/// }
/// ```
///
/// # Response
///
/// ```json
/// { "id": 1, "name": "Ada", "email": "ada@example.com" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body or validation failed
/// - `409 Conflict`: Email already exists
/// - `500 Internal Server Error`: Store fault
/// - `503 Service Unavailable`: No connection available
pub async fn create_user<M: ConnectionManager>(
    State(state): State<AppState<M>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(req) = payload?;
    let new_user = req.into_create_user()?;

    let mut conn = state.pool.acquire().await?;
    let user = User::create(&mut conn, &new_user).await.map_err(|err| {
        if err.is_conflict() {
            tracing::info!("Rejected duplicate email");
        }
        ApiError::from(err)
    })?;

    tracing::info!(user_id = user.id, "Created user");
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, email: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn test_valid_request_passes_through_unchanged() {
        let user = request(Some(" Ada "), Some("ada@example.com"))
            .into_create_user()
            .unwrap();
        assert_eq!(user.name, " Ada ");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        assert!(matches!(
            request(None, Some("ada@example.com")).into_create_user(),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            request(Some("Ada"), None).into_create_user(),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_long_name_is_accepted() {
        let name = "a".repeat(1000);
        let user = request(Some(&name), Some("ok@example.com"))
            .into_create_user()
            .unwrap();
        assert_eq!(user.name, name);
    }

    #[test]
    fn test_empty_and_blank_values_are_rejected() {
        assert!(request(Some(""), Some("ada@example.com")).into_create_user().is_err());
        assert!(request(Some("   "), Some("ada@example.com")).into_create_user().is_err());
        assert!(request(Some("Ada"), Some("")).into_create_user().is_err());
        assert!(request(Some("Ada"), Some("not-an-email")).into_create_user().is_err());
    }
}
