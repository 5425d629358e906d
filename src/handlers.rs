use actix_web::{get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::error::{AuthError, ServiceError};
use crate::models::{
    ApiResponse, AuthState, Coordinates, CreateBusinessRequest, FavoriteToggle,
    RegisterUserRequest, UpdateProfileRequest,
};
use crate::state::AppState;

/// Identity forwarded by the authentication gateway
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Provider email forwarded alongside the identity
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

const MAX_IDENTITY_LEN: usize = 128;

/// Detail-page miss; tells the user to go back to the listing
pub const BUSINESS_NOT_FOUND: &str = "Бизнес не найден, вернитесь назад";

fn extract_identity(req: &HttpRequest) -> Result<Option<String>, AuthError> {
    let Some(raw) = req.headers().get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let identity = raw
        .to_str()
        .map_err(|_| AuthError::InvalidIdentity)?
        .trim();
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LEN {
        return Err(AuthError::InvalidIdentity);
    }

    Ok(Some(identity.to_string()))
}

fn extract_provider_email(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_EMAIL_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

async fn session_for(req: &HttpRequest, state: &AppState) -> Result<AuthState, ServiceError> {
    let identity = extract_identity(req)?;
    state.profiles.resolve_session(identity.as_deref()).await
}

/// Maps a service error to its response. `context` is the generic message for internal failures.
fn error_response(err: ServiceError, context: &str) -> HttpResponse {
    match err {
        ServiceError::Validation(message) => HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(message).with_code("validation")),
        ServiceError::Auth(auth) => {
            let body = ApiResponse::<()>::error(auth.user_message().into()).with_code(auth.code());
            match auth {
                AuthError::MissingIdentity
                | AuthError::InvalidIdentity
                | AuthError::ProfileNotFound => HttpResponse::Unauthorized().json(body),
                AuthError::ProfileAlreadyExists | AuthError::EmailInUse => {
                    HttpResponse::Conflict().json(body)
                }
                AuthError::InvalidEmail => HttpResponse::BadRequest().json(body),
            }
        }
        ServiceError::Forbidden(message) => HttpResponse::Forbidden()
            .json(ApiResponse::<()>::error(message).with_code("forbidden")),
        ServiceError::NotFound(entity) => HttpResponse::NotFound()
            .json(ApiResponse::<()>::error(format!("{entity} not found")).with_code("not_found")),
        ServiceError::Conflict(message) => HttpResponse::Conflict()
            .json(ApiResponse::<()>::error(message).with_code("conflict")),
        ServiceError::Storage(err) => {
            log::error!("{context}: {err:?}");
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("Не удалось загрузить фото".into())
                    .with_code("photo_upload_failed"),
            )
        }
        ServiceError::Store(err) => {
            log::error!("{context}: {err:?}");
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error(context.into()))
        }
    }
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "city-directory-service",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// SESSION & LOCATION
// ============================================================================

#[get("/session")]
pub async fn get_session(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    match session_for(&req, &state).await {
        Ok(session) => HttpResponse::Ok().json(ApiResponse::success(session)),
        Err(err) => error_response(err, "Failed to resolve session"),
    }
}

#[post("/location/resolve")]
pub async fn resolve_location(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<Coordinates>,
) -> impl Responder {
    // The resolver never fails; a broken session only means the city is not remembered.
    let session = session_for(&req, &state).await.unwrap_or_else(|err| {
        log::warn!("Resolving location without session: {err}");
        AuthState::Unauthenticated
    });

    let resolved = state
        .locations
        .resolve_for(state.store.as_ref(), &session, payload.into_inner())
        .await;
    HttpResponse::Ok().json(ApiResponse::success(resolved))
}

// ============================================================================
// DIRECTORY
// ============================================================================

#[derive(Deserialize)]
pub struct DirectoryQuery {
    pub city: Option<String>,
    pub limit: Option<i64>,
}

#[get("/cities")]
pub async fn list_cities(state: web::Data<AppState>) -> impl Responder {
    match state.directory.cities().await {
        Ok(cities) => HttpResponse::Ok().json(ApiResponse::success(cities)),
        Err(err) => error_response(err, "Failed to list cities"),
    }
}

#[get("/businesses")]
pub async fn list_businesses(
    state: web::Data<AppState>,
    query: web::Query<DirectoryQuery>,
) -> impl Responder {
    let city = query.city.as_deref().unwrap_or_default();
    match state.directory.businesses_in_city(city, query.limit).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => error_response(err, "Failed to list businesses"),
    }
}

#[get("/businesses/mine")]
pub async fn get_my_business(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state.businesses.for_owner(&session).await {
        Ok(Some(business)) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Ok(None) => error_response(ServiceError::NotFound("Business"), ""),
        Err(err) => error_response(err, "Failed to get business"),
    }
}

#[get("/businesses/{business_id}")]
pub async fn get_business(
    req: HttpRequest,
    state: web::Data<AppState>,
    business_id: web::Path<String>,
) -> impl Responder {
    let session = session_for(&req, &state).await.unwrap_or_else(|err| {
        log::warn!("Fetching business without session: {err}");
        AuthState::Unauthenticated
    });

    match state.directory.business_detail(&business_id, &session).await {
        Ok(Some(business)) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Ok(None) => HttpResponse::NotFound().json(
            ApiResponse::<()>::error(BUSINESS_NOT_FOUND.into()).with_code("not_found"),
        ),
        Err(err) => error_response(err, "Failed to get business"),
    }
}

#[post("/businesses")]
pub async fn create_business(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<CreateBusinessRequest>,
) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state.businesses.create(&session, payload.into_inner()).await {
        Ok(business) => HttpResponse::Created().json(ApiResponse::success(business)),
        Err(err) => error_response(err, "Failed to create business"),
    }
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    req: HttpRequest,
    state: web::Data<AppState>,
    business_id: web::Path<String>,
    payload: web::Json<CreateBusinessRequest>,
) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state
        .businesses
        .update(&session, &business_id, payload.into_inner())
        .await
    {
        Ok(business) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Err(err) => error_response(err, "Failed to update business"),
    }
}

// ============================================================================
// FAVORITES
// ============================================================================

#[get("/favorites")]
pub async fn list_favorites(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state.favorites.favorite_businesses(&session).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => error_response(err, "Failed to list favorites"),
    }
}

#[post("/favorites/{business_id}/toggle")]
pub async fn toggle_favorite(
    req: HttpRequest,
    state: web::Data<AppState>,
    business_id: web::Path<String>,
) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state.favorites.toggle(&session, &business_id).await {
        Ok(FavoriteToggle::Unauthenticated) => {
            error_response(AuthError::MissingIdentity.into(), "")
        }
        Ok(toggle) => HttpResponse::Ok().json(ApiResponse::success(toggle)),
        Err(err) => error_response(err, "Failed to update favorites"),
    }
}

// ============================================================================
// USERS
// ============================================================================

#[post("/users")]
pub async fn register_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<RegisterUserRequest>,
) -> impl Responder {
    let identity = match extract_identity(&req) {
        Ok(identity) => identity,
        Err(err) => return error_response(err.into(), ""),
    };
    let provider_email = extract_provider_email(&req);

    match state
        .profiles
        .register(identity.as_deref(), provider_email.as_deref(), payload.into_inner())
        .await
    {
        Ok(profile) => HttpResponse::Created().json(ApiResponse::success(profile)),
        Err(err) => error_response(err, "Failed to register user"),
    }
}

#[get("/users/me")]
pub async fn get_profile(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    match session_for(&req, &state).await {
        Ok(AuthState::Authenticated { profile }) => {
            HttpResponse::Ok().json(ApiResponse::success(profile))
        }
        Ok(AuthState::Unauthenticated) => error_response(AuthError::MissingIdentity.into(), ""),
        Err(err) => error_response(err, "Failed to resolve session"),
    }
}

#[put("/users/me")]
pub async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state.profiles.update(&session, payload.into_inner()).await {
        Ok(profile) => HttpResponse::Ok().json(ApiResponse::success(profile)),
        Err(err) => error_response(err, "Failed to update profile"),
    }
}

#[get("/users/me/recent")]
pub async fn list_recently_visited(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let session = match session_for(&req, &state).await {
        Ok(session) => session,
        Err(err) => return error_response(err, "Failed to resolve session"),
    };

    match state.directory.recently_visited(&session).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => error_response(err, "Failed to list recently visited businesses"),
    }
}
