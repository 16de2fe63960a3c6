// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        admin_handlers, api_handlers, auth_handlers, challenge_handlers, leaderboard_handlers, mw_auth, mw_role,
        ngo_handlers, profile_handlers, student_handlers, teacher_handlers,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

// Room for the other multipart fields next to the file itself
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(app_state: AppState) -> Router {
    // --- Public routes ---
    let public_routes = Router::new()
        .route("/", get(auth_handlers::home))
        .route("/login", get(auth_handlers::show_login_form).post(auth_handlers::handle_login))
        .route("/register", get(auth_handlers::show_register_form).post(auth_handlers::handle_register))
        .route("/logout", get(auth_handlers::handle_logout))
        .route("/leaderboard", get(leaderboard_handlers::show_leaderboard));

    // --- Student routes ---
    let student_routes = Router::new()
        .route("/", get(student_handlers::dashboard))
        .route("/lessons", get(student_handlers::list_lessons))
        .route("/lessons/{id}", get(student_handlers::show_lesson))
        .route("/lessons/{id}/complete", post(student_handlers::complete_lesson))
        .route("/quizzes/{id}", get(student_handlers::show_quiz).post(student_handlers::submit_quiz))
        .route("/challenges", get(challenge_handlers::list_challenges))
        .route("/challenges/{id}", get(challenge_handlers::show_challenge))
        .route("/challenges/{id}/submit", post(challenge_handlers::submit_proof))
        .route("/badges", get(student_handlers::show_badges))
        .route("/points", get(student_handlers::show_points))
        .route_layer(middleware::from_fn(mw_role::require_student));

    // --- NGO routes (NGOs and admins) ---
    let ngo_routes = Router::new()
        .route("/challenges", get(ngo_handlers::list_challenges).post(ngo_handlers::create_challenge))
        .route(
            "/challenges/{id}/edit",
            get(ngo_handlers::show_edit_challenge).post(ngo_handlers::update_challenge),
        )
        .route("/submissions", get(ngo_handlers::list_submissions))
        .route("/submissions/{id}/verify", post(ngo_handlers::verify_submission))
        .route("/submissions/{id}/reject", post(ngo_handlers::reject_submission))
        .route_layer(middleware::from_fn(mw_role::require_ngo));

    // --- Teacher routes (teachers and admins) ---
    let teacher_routes = Router::new()
        .route("/lessons", get(teacher_handlers::list_lessons).post(teacher_handlers::create_lesson))
        .route(
            "/lessons/{id}/edit",
            get(teacher_handlers::show_edit_lesson).post(teacher_handlers::update_lesson),
        )
        .route("/lessons/{id}/delete", post(teacher_handlers::delete_lesson))
        .route(
            "/lessons/{id}/quiz",
            get(teacher_handlers::show_quiz_builder).post(teacher_handlers::create_quiz),
        )
        .route_layer(middleware::from_fn(mw_role::require_teacher));

    // --- Admin routes ---
    let admin_routes = Router::new()
        .route("/", get(admin_handlers::dashboard))
        .route("/challenges/{id}/toggle", post(admin_handlers::toggle_challenge))
        .route("/users", get(admin_handlers::show_users))
        .route("/users/create", post(admin_handlers::create_user))
        .route("/users/{id}/edit", get(admin_handlers::show_edit_user).post(admin_handlers::update_user))
        .route("/users/{id}/password", post(admin_handlers::change_password))
        .route("/users/{id}/toggle", post(admin_handlers::toggle_user))
        .route("/badges", get(admin_handlers::show_badges))
        .route("/badges/create", post(admin_handlers::create_badge))
        .route("/badges/{id}/edit", get(admin_handlers::show_edit_badge).post(admin_handlers::update_badge))
        .route("/badges/{id}/delete", post(admin_handlers::delete_badge))
        .route("/badges/award", post(admin_handlers::award_badge))
        .route("/badges/revoke", post(admin_handlers::revoke_badge))
        .route("/schools", get(admin_handlers::show_schools))
        .route("/schools/create", post(admin_handlers::create_school))
        .route("/schools/{id}/edit", get(admin_handlers::show_edit_school).post(admin_handlers::update_school))
        .route("/points", get(admin_handlers::show_points).post(admin_handlers::award_points))
        .route_layer(middleware::from_fn(mw_role::require_admin));

    // --- Authenticated routes ---
    // require_auth runs first and puts CurrentUser in the extensions for the role guards
    let authenticated_routes = Router::new()
        .route("/profile", get(profile_handlers::show_profile).post(profile_handlers::update_profile))
        .nest("/student", student_routes)
        .nest("/ngo", ngo_routes)
        .nest("/teacher", teacher_routes)
        .nest("/admin", admin_routes)
        .route_layer(middleware::from_fn_with_state(app_state.clone(), mw_auth::require_auth));

    // --- JSON API ---
    let public_api_routes = Router::new().route("/captcha/refresh", get(api_handlers::refresh_captcha));

    let api_routes = Router::new()
        .route("/content/{kind}/{id}", get(api_handlers::get_content))
        .route("/users/{id}", get(api_handlers::get_user))
        .route("/me/points", get(api_handlers::my_points))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), mw_auth::require_api_auth))
        .merge(public_api_routes);

    let max_upload = app_state.config.max_proof_bytes.max(app_state.config.max_avatar_bytes);

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&app_state.config.upload_dir))
        .layer(DefaultBodyLimit::max(max_upload + FORM_OVERHEAD_BYTES))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Config, DEFAULT_MAX_AVATAR_BYTES, DEFAULT_MAX_PROOF_BYTES},
        db::test_support::test_pool,
        models::user::{NewUser, Role},
        services::auth_service,
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::{net::SocketAddr, sync::Arc};
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    async fn test_app() -> (Router, sqlx::SqlitePool) {
        test_app_with(false).await
    }

    async fn test_app_with(captcha_enabled: bool) -> (Router, sqlx::SqlitePool) {
        let pool = test_pool().await;
        let config = Config {
            database_url: "sqlite::memory:".into(),
            session_secret: "x".repeat(64),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            upload_dir: std::env::temp_dir().join("greenquest-router-tests"),
            max_proof_bytes: DEFAULT_MAX_PROOF_BYTES,
            max_avatar_bytes: DEFAULT_MAX_AVATAR_BYTES,
            secure_cookies: false,
            captcha_enabled,
            bootstrap_admin: None,
        };
        let state = AppState { db_pool: pool.clone(), config: Arc::new(config) };
        let app = create_router(state).layer(SessionManagerLayer::new(MemoryStore::default()));
        (app, pool)
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    /// Registers an account directly and logs in through the form; returns the session cookie.
    async fn login_as(app: &Router, pool: &sqlx::SqlitePool, email: &str, role: Role) -> String {
        auth_service::register(
            pool,
            NewUser {
                name: "Test User".into(),
                email: email.into(),
                password: "correct horse".into(),
                role,
                school_id: None,
            },
        )
        .await
        .unwrap();

        let body = format!("email={}&password=correct+horse", urlencoding::encode(email));
        let response = send(
            app,
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn anonymous_pages_redirect_to_login_with_next() {
        let (app, _) = test_app().await;
        let response = send(&app, get("/student/challenges", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?next=%2Fstudent%2Fchallenges");

        let login = send(&app, get("/login", None)).await;
        assert_eq!(login.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_api_calls_get_a_failure_envelope() {
        let (app, _) = test_app().await;
        let response = send(&app, get("/api/me/points", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn role_guards_follow_the_logged_in_role() {
        let (app, pool) = test_app().await;
        let cookie = login_as(&app, &pool, "ana@example.org", Role::Student).await;

        let dashboard = send(&app, get("/student", Some(&cookie))).await;
        assert_eq!(dashboard.status(), StatusCode::OK);

        let ngo = send(&app, get("/ngo/challenges", Some(&cookie))).await;
        assert_eq!(ngo.status(), StatusCode::FORBIDDEN);

        let admin = send(&app, get("/admin", Some(&cookie))).await;
        assert_eq!(admin.status(), StatusCode::FORBIDDEN);

        let points = send(&app, get("/api/me/points", Some(&cookie))).await;
        assert_eq!(points.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(points.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["total_points"], 0);
    }

    #[tokio::test]
    async fn teachers_cannot_open_student_pages() {
        let (app, pool) = test_app().await;
        let cookie = login_as(&app, &pool, "teacher@example.org", Role::Teacher).await;

        assert_eq!(send(&app, get("/teacher/lessons", Some(&cookie))).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get("/student", Some(&cookie))).await.status(), StatusCode::FORBIDDEN);
        assert_eq!(send(&app, get("/profile", Some(&cookie))).await.status(), StatusCode::OK);
    }

    fn proof_upload(challenge_id: i64, cookie: &str) -> Request<Body> {
        let boundary = "greenquest-proof";
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"description\"\r\n\r\n\
             Picked up litter along the river\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"proof\"; filename=\"river.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             not-really-a-png\r\n\
             --{b}--\r\n",
            b = boundary
        );
        Request::builder()
            .method("POST")
            .uri(format!("/student/challenges/{}/submit", challenge_id))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn proof_for_an_expired_challenge_redirects_back_with_the_reason() {
        let (app, pool) = test_app().await;
        let cookie = login_as(&app, &pool, "leo@example.org", Role::Student).await;
        let challenge_id = sqlx::query(
            "INSERT INTO challenges (title, points, start_date, end_date) VALUES ('River cleanup', 50, '2020-01-01', '2020-01-31')",
        )
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

        let response = send(&app, proof_upload(challenge_id, &cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert!(target.starts_with(&format!("/student/challenges/{}?error=", challenge_id)));
        assert!(target.contains("expired"));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_challenges")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn solve(question: &str) -> i64 {
        let sum = question.trim_start_matches("What is ").trim_end_matches('?');
        sum.split(" + ").map(|n| n.parse::<i64>().unwrap()).sum()
    }

    fn login_post(cookie: &str, answer: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookie)
            .body(Body::from(format!("email=gaia%40example.org&password=correct+horse&captcha={}", answer)))
            .unwrap()
    }

    #[tokio::test]
    async fn login_requires_the_current_captcha_answer() {
        let (app, pool) = test_app_with(true).await;
        auth_service::register(
            &pool,
            NewUser {
                name: "Gaia".into(),
                email: "gaia@example.org".into(),
                password: "correct horse".into(),
                role: Role::Student,
                school_id: None,
            },
        )
        .await
        .unwrap();

        let refreshed = send(&app, get("/api/captcha/refresh", None)).await;
        assert_eq!(refreshed.status(), StatusCode::OK);
        let cookie = session_cookie(&refreshed);
        let json = json_body(refreshed).await;
        assert_eq!(json["success"], true);
        let answer = solve(json["data"]["question"].as_str().unwrap());

        // a wrong answer re-renders the form with a new question
        let refused = send(&app, login_post(&cookie, &(answer + 1).to_string())).await;
        assert_eq!(refused.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(refused.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        let marker = "id=\"captcha-question\">";
        let start = html.find(marker).unwrap() + marker.len();
        let question = &html[start..start + html[start..].find('<').unwrap()];
        let answer = solve(question);

        let accepted = send(&app, login_post(&cookie, &answer.to_string())).await;
        assert_eq!(accepted.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&accepted), "/student");
    }

    #[tokio::test]
    async fn captcha_refresh_is_unavailable_when_switched_off() {
        let (app, _) = test_app().await;
        let response = send(&app, get("/api/captcha/refresh", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["success"], false);
    }
}
