use std::collections::HashMap;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Cursor, Session};
use crate::platform::Platform;
use crate::views::category::CategoryPage;
use crate::views::profile::ProfilePage;
use crate::views::sign_in::SignInForm;
use crate::views::sign_up::SignUpForm;
use crate::views::{CategoryView, Notice, Notices, ProfileView, Route, SignInView, SignUpView};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub platform: Platform,
}

async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Missing or malformed Authorization header".to_string()))?;

    let session = state.platform.identity.current_session(&token).await?;
    log::debug!("Authenticated user: {}", session.uid);
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Route>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryParams {
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    #[serde(flatten)]
    pub page: CategoryPage,
    pub notices: Vec<Notice>,
}

async fn category(
    State(state): State<AppState>,
    Path(category_name): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Result<(StatusCode, Json<CategoryResponse>), AppError> {
    let notices = Notices::default();
    let store = state.platform.listings.as_ref();

    let view = match params.cursor {
        Some(token) => {
            let mut view = CategoryView::resume(category_name, Cursor::decode(&token)?)
                .with_page_size(state.config.page_size);
            view.load_more(store, &notices).await;
            view
        }
        None => {
            let mut view = CategoryView::new(category_name).with_page_size(state.config.page_size);
            view.fetch(store, &notices).await;
            view
        }
    };

    let status = if notices.has_errors() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(CategoryResponse {
            page: view.render(),
            notices: notices.take(),
        }),
    ))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(form): Json<SignInForm>,
) -> (StatusCode, Json<ViewResponse>) {
    let notices = Notices::default();
    let mut view = SignInView::with_form(form);
    let session = view.submit(state.platform.identity.as_ref(), &notices).await;

    let status = if session.is_some() {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (
        status,
        Json(ViewResponse {
            token: session.map(|s| s.token),
            redirect: view.redirect().cloned(),
            notices: notices.take(),
        }),
    )
}

async fn sign_up(
    State(state): State<AppState>,
    Json(form): Json<SignUpForm>,
) -> (StatusCode, Json<ViewResponse>) {
    let notices = Notices::default();
    let mut view = SignUpView::with_form(form);
    let session = view.submit(&state.platform, &notices).await;

    let status = if session.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Json(ViewResponse {
            token: session.map(|s| s.token),
            redirect: view.redirect().cloned(),
            notices: notices.take(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: ProfilePage,
    pub notices: Vec<Notice>,
}

async fn profile(Extension(session): Extension<Session>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        profile: ProfileView::new(session).render(),
        notices: Vec::new(),
    })
}

/// Applies the edits the way the page does: "Change", type, "Done".
async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(edits): Json<HashMap<String, String>>,
) -> Result<(StatusCode, Json<ProfileResponse>), AppError> {
    let notices = Notices::default();
    let mut view = ProfileView::new(session);

    view.toggle_edit(&state.platform, &notices).await;
    for (key, value) in edits {
        view.on_change(&key, value)?;
    }
    let invalid = view.validation_error().is_some();
    view.toggle_edit(&state.platform, &notices).await;

    let status = if invalid {
        StatusCode::BAD_REQUEST
    } else if notices.has_errors() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ProfileResponse {
            profile: view.render(),
            notices: notices.take(),
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Json<ViewResponse> {
    let mut view = ProfileView::new(session);
    view.logout(&state.platform).await;
    Json(ViewResponse {
        token: None,
        redirect: view.redirect().cloned(),
        notices: Vec::new(),
    })
}

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/logout", post(logout))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/", get(|| async { "Hello, House Marketplace!" }))
        .route("/category/:category_name", get(category))
        .route("/sign-in", post(sign_in))
        .route("/sign-up", post(sign_up))
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing;
    use crate::platform::test_platform;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Method};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Platform) {
        let platform = test_platform();
        let config = AppConfig {
            port: 0,
            jwt_secret: "test-secret".to_string(),
            session_ttl_hours: 24,
            page_size: 10,
            database_url: None,
            seed_file: None,
            password_memory_kib: 64,
            password_iterations: 1,
        };
        let state = AppState {
            config,
            platform: platform.clone(),
        };
        (router(state), platform)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(app: &Router) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/sign-up",
            None,
            Some(json!({"name": "Jane", "email": "jane@example.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["redirect"], "/");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn profile_lifecycle() {
        let (app, _) = app();
        let token = register(&app).await;

        let (status, body) = send(&app, Method::GET, "/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Jane");
        assert_eq!(body["email"], "jane@example.com");
        assert_eq!(body["action"], "Change");
        assert_eq!(body["create_listing"], "/create-listing");

        let edit = json!({"name": "Janet"});
        let (status, body) = send(&app, Method::PUT, "/profile", Some(&token), Some(edit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Janet");

        let (_, body) = send(&app, Method::GET, "/profile", Some(&token), None).await;
        assert_eq!(body["name"], "Janet");

        let typo = json!({"nmae": "Jan"});
        let (status, _) = send(&app, Method::PUT, "/profile", Some(&token), Some(typo)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::POST, "/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirect"], "/");

        let (status, _) = send(&app, Method::GET, "/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_edits_distinguish_client_mistakes() {
        let (app, platform) = app();
        let token = register(&app).await;

        let blank = json!({"name": "  "});
        let (status, body) = send(&app, Method::PUT, "/profile", Some(&token), Some(blank)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["notices"][0]["message"], "Name cannot be empty!");

        let session = platform
            .identity
            .create_account("anon@example.com", "secret1")
            .await
            .unwrap();
        let (status, body) =
            send(&app, Method::PUT, "/profile", Some(&session.token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "");
        assert!(body["notices"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_in_reports_bad_credentials() {
        let (app, _) = app();
        register(&app).await;

        let wrong = json!({"email": "jane@example.com", "password": "wrong!!"});
        let (status, body) = send(&app, Method::POST, "/sign-in", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("token").is_none());
        assert!(body.get("redirect").is_none());
        assert_eq!(body["notices"][0]["message"], "Incorrect user credentials entered!");

        let right = json!({"email": "jane@example.com", "password": "secret1"});
        let (status, body) = send(&app, Method::POST, "/sign-in", None, Some(right)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn unknown_body_fields_are_rejected() {
        let (app, _) = app();
        let body = json!({"email": "jane@example.com", "password": "secret1", "admin": true});
        let (status, _) = send(&app, Method::POST, "/sign-in", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (app, _) = app();
        let (status, _) = send(&app, Method::GET, "/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, Method::GET, "/profile", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn category_pages_through_listings() {
        let (app, platform) = app();
        for i in 0..12 {
            platform
                .listings
                .insert(listing(&format!("r{:02}", i), "rent", 100 + i))
                .await
                .unwrap();
        }

        let (status, body) = send(&app, Method::GET, "/category/rent", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Places for Rent");
        assert_eq!(body["state"], "listings");
        assert_eq!(body["listings"].as_array().unwrap().len(), 10);
        assert_eq!(body["listings"][0]["id"], "r11");
        let cursor = body["next_cursor"].as_str().unwrap().to_string();

        let uri = format!("/category/rent?cursor={}", cursor);
        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = body["listings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["r01", "r00"]);
        assert!(body.get("next_cursor").is_none());

        let (_, body) = send(&app, Method::GET, "/category/sale", None, None).await;
        assert_eq!(body["state"], "empty");
        assert_eq!(body["title"], "Places for Sale");
        assert_eq!(body["message"], "No listings for sale");

        let (status, _) = send(&app, Method::GET, "/category/rent?cursor=%21%21", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn full_last_page_is_followed_by_end_of_results() {
        let (app, platform) = app();
        for i in 0..10 {
            platform
                .listings
                .insert(listing(&format!("r{:02}", i), "rent", 100 + i))
                .await
                .unwrap();
        }

        let (_, body) = send(&app, Method::GET, "/category/rent", None, None).await;
        assert_eq!(body["listings"].as_array().unwrap().len(), 10);
        let cursor = body["next_cursor"].as_str().unwrap().to_string();

        let uri = format!("/category/rent?cursor={}", cursor);
        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "listings");
        assert!(body["listings"].as_array().unwrap().is_empty());
        assert!(body.get("next_cursor").is_none());
        assert!(body.get("message").is_none());
    }
}
