use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, is_valid_username, verify_password, MIN_PASSWORD_LEN},
        repo_types::User,
    },
    nutrition::accumulator::DailySummary,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn issue_tokens(
    state: &AppState,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<(String, String), (StatusCode, String)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user_id, session_id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let refresh_token = keys.sign_refresh(user_id, session_id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok((access_token, refresh_token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();

    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err((StatusCode::BAD_REQUEST, "Invalid username".into()));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    if payload.password != payload.confirm_password {
        warn!(username = %payload.username, "password confirmation mismatch");
        return Err((StatusCode::BAD_REQUEST, "Passwords do not match".into()));
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let user = match User::create(&state.db, &payload.username, &hash).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(username = %payload.username, "username already exists");
            return Err((StatusCode::CONFLICT, "Username already exists".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user.id,
            username: user.username,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();

    let user = match User::find_by_username(&state.db, &payload.username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(username = %payload.username, "login unknown username");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    if !ok {
        warn!(username = %payload.username, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    // Every login is a new session with its own calorie total.
    let session_id = Uuid::new_v4();
    let (access_token, refresh_token) = issue_tokens(&state, user.id, session_id)?;
    let daily = state.sessions.open(session_id).await;

    info!(user_id = %user.id, %session_id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
        },
        daily,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, format!("{}", e)))?;

    // A logged-out session cannot be refreshed back to life.
    let daily = state.sessions.summary(claims.sid).await.map_err(|e| {
        warn!(error = %e, "refresh for a closed session");
        (StatusCode::UNAUTHORIZED, "Session has ended".to_string())
    })?;

    let user = match User::find_by_id(&state.db, claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => {
            error!(error = %e, "find_by_id failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    let (access_token, refresh_token) = issue_tokens(&state, user.id, claims.sid)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
        },
        daily,
    }))
}

/// Ends the session; its running calorie total is discarded.
#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Json<Option<DailySummary>> {
    let last = state.sessions.close(auth.session_id).await;
    info!(session_id = %auth.session_id, "user logged out");
    Json(last)
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, "find_by_id failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[test]
    fn public_user_serialization() {
        let response = PublicUser {
            id: Uuid::new_v4(),
            username: "priya".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("priya"));
        assert!(json.contains("id"));
    }

    async fn post_json(app: axum::Router, uri: &str, body: &str) -> StatusCode {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_database() {
        let app = build_app(AppState::fake());
        let status = post_json(
            app.clone(),
            "/api/v1/auth/register",
            r#"{"username":"priya","password":"longenough","confirm_password":"different1"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = post_json(
            app,
            "/api/v1/auth/register",
            r#"{"username":"a b","password":"longenough","confirm_password":"longenough"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let (user_id, session_id) = (Uuid::new_v4(), Uuid::new_v4());
        state.sessions.open(session_id).await;
        state.sessions.set_limit(session_id, 1500).await.unwrap();

        let token = keys.sign_access(user_id, session_id).unwrap();
        let req = Request::post("/api/v1/auth/logout")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        assert!(state.sessions.summary(session_id).await.is_err());
    }

    #[tokio::test]
    async fn refresh_token_of_closed_session_is_rejected() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let session_id = Uuid::new_v4();
        state.sessions.open(session_id).await;
        state.sessions.close(session_id).await;

        let token = keys.sign_refresh(Uuid::new_v4(), session_id).unwrap();
        let status = post_json(
            build_app(state),
            "/api/v1/auth/refresh",
            &format!(r#"{{"refresh_token":"{token}"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
