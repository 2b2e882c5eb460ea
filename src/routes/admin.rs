//! Admin area. Everything here sits behind the access gate; handlers that
//! read or change content additionally require a [`CurrentUser`].

use crate::auth::{CurrentUser, SessionCookies};
use crate::config::Config;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::RequestId;
use crate::middleware::rate_limit::AuthRateLimit;
use crate::models::article::{ArticleCard, ArticleRequest, ArticleResponse, ArticleStats};
use crate::models::category::Category;
use crate::models::pages::{DashboardPage, LoginPage, UploadResponse};
use crate::models::site_settings::SiteSettings;
use crate::service::AppServices;
use chrono::Utc;
use rocket::data::{ByteUnit, Data};
use rocket::form::{Form, FromForm};
use rocket::http::{ContentType, CookieJar, Status};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put, routes};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const UPLOAD_FOLDERS: [&str; 2] = ["thumbnails", "images"];

#[derive(FromForm)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[get("/login")]
pub async fn login_page(config: &State<Config>, current_user: Option<CurrentUser>) -> Json<LoginPage> {
    Json(LoginPage {
        authenticated: current_user.is_some(),
        action: config.auth.login_path.clone(),
    })
}

/// Password sign-in. Accounts without the admin role are signed out again.
#[post("/login", data = "<form>")]
pub async fn login(
    services: &State<AppServices>,
    config: &State<Config>,
    session_cookies: &State<SessionCookies>,
    cookies: &CookieJar<'_>,
    request_id: RequestId,
    _rate_limit: AuthRateLimit,
    form: Form<LoginForm>,
) -> Result<Redirect, AppError> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }

    let sign_in = services.identity.sign_in_with_password(email, &form.password).await?;
    let role = services.repository.get_user_role(&sign_in.user.id).await?;

    if !role.is_some_and(|role| role.can_administer()) {
        warn!(request_id = %request_id.0, user_id = %sign_in.user.id, role = ?role, "sign-in rejected: not an admin");
        if let Err(e) = services.identity.sign_out(&sign_in.session.access_token).await {
            warn!(request_id = %request_id.0, error = %e, "failed to revoke non-admin session");
        }
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    session_cookies.write(cookies, &sign_in.session)?;
    info!(request_id = %request_id.0, user_id = %sign_in.user.id, "admin signed in");

    Ok(Redirect::to(config.auth.home_path.clone()))
}

#[post("/logout")]
pub async fn logout(
    services: &State<AppServices>,
    config: &State<Config>,
    session_cookies: &State<SessionCookies>,
    cookies: &CookieJar<'_>,
    current_user: Option<CurrentUser>,
) -> Redirect {
    if let Some(user) = current_user {
        if let Err(e) = services.identity.sign_out(&user.access_token).await {
            warn!(user_id = %user.id, error = %e, "identity provider sign-out failed; clearing cookie anyway");
        }
        info!(user_id = %user.id, "admin signed out");
    }

    session_cookies.clear(cookies);
    Redirect::to(config.auth.login_path.clone())
}

#[get("/dashboard")]
pub async fn dashboard(services: &State<AppServices>, current_user: CurrentUser) -> Result<Json<DashboardPage>, AppError> {
    let articles = services.repository.list_all_articles().await?;

    Ok(Json(DashboardPage {
        email: current_user.email,
        stats: ArticleStats::from_articles(&articles),
        articles: articles.iter().map(ArticleCard::from).collect(),
    }))
}

#[get("/articles/<id>")]
pub async fn get_article(services: &State<AppServices>, _current_user: CurrentUser, id: &str) -> Result<Json<ArticleResponse>, AppError> {
    let article_id = parse_article_id(id)?;
    match services.repository.get_article(&article_id).await? {
        Some(article) => Ok(Json(ArticleResponse::from(&article))),
        None => Err(AppError::NotFound("Article not found".to_string())),
    }
}

/// Creates an article, or replaces it when the payload carries an id.
#[post("/articles", data = "<payload>")]
pub async fn save_article(
    services: &State<AppServices>,
    current_user: CurrentUser,
    payload: JsonBody<ArticleRequest>,
) -> Result<(Status, Json<ArticleResponse>), AppError> {
    payload.validate()?;

    let request = payload.into_inner();
    let status = if request.id.is_some() { Status::Ok } else { Status::Created };
    let article = services.repository.upsert_article(&request, &current_user.id).await?;

    info!(user_id = %current_user.id, article_id = %article.id, status = ?article.status, "article saved");
    Ok((status, Json(ArticleResponse::from(&article))))
}

#[delete("/articles/<id>")]
pub async fn delete_article(services: &State<AppServices>, current_user: CurrentUser, id: &str) -> Result<Status, AppError> {
    let article_id = parse_article_id(id)?;
    services.repository.delete_article(&article_id).await?;

    info!(user_id = %current_user.id, article_id = %article_id, "article deleted");
    Ok(Status::NoContent)
}

#[get("/categories")]
pub async fn list_categories(services: &State<AppServices>, _current_user: CurrentUser) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(services.repository.list_categories().await?))
}

#[get("/about")]
pub async fn get_about(services: &State<AppServices>, _current_user: CurrentUser) -> Result<Json<SiteSettings>, AppError> {
    let settings = services.repository.get_site_settings().await?.map(|record| record.settings).unwrap_or_default();
    Ok(Json(settings))
}

#[put("/about", data = "<payload>")]
pub async fn put_about(services: &State<AppServices>, current_user: CurrentUser, payload: JsonBody<SiteSettings>) -> Result<Json<SiteSettings>, AppError> {
    payload.validate()?;

    let record = services.repository.upsert_site_settings(&payload).await?;
    info!(user_id = %current_user.id, "site settings updated");
    Ok(Json(record.settings))
}

/// Stores the raw request body as `<folder>/<unix millis>.<ext>` and returns its public URL.
#[post("/uploads/<folder>?<ext>", data = "<body>")]
pub async fn upload_image(
    services: &State<AppServices>,
    config: &State<Config>,
    current_user: CurrentUser,
    content_type: Option<&ContentType>,
    folder: &str,
    ext: &str,
    body: Data<'_>,
) -> Result<(Status, Json<UploadResponse>), AppError> {
    if !UPLOAD_FOLDERS.contains(&folder) {
        return Err(AppError::BadRequest(format!("Unknown upload folder: {}", folder)));
    }
    let ext = ext.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest("Invalid file extension".to_string()));
    }

    let limit = ByteUnit::Mebibyte(config.storage.max_upload_mib);
    let bytes = body
        .open(limit)
        .into_bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
    if !bytes.is_complete() {
        return Err(AppError::PayloadTooLarge);
    }
    let bytes = bytes.into_inner();
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Upload is empty".to_string()));
    }

    let content_type = content_type.map(ToString::to_string).unwrap_or_else(|| "application/octet-stream".to_string());
    let path = format!("{}/{}.{}", folder, Utc::now().timestamp_millis(), ext);
    let public_url = services.storage.upload(&path, bytes, &content_type, &current_user.access_token).await?;

    info!(user_id = %current_user.id, path = %path, "image uploaded");
    Ok((Status::Created, Json(UploadResponse { public_url })))
}

fn parse_article_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::BadRequest("Invalid article id".to_string()))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        login_page,
        login,
        logout,
        dashboard,
        get_article,
        save_article,
        delete_article,
        list_categories,
        get_about,
        put_about,
        upload_image
    ]
}

#[cfg(test)]
mod tests {
    use crate::build_rocket_with;
    use crate::config::Config;
    use crate::models::article::ArticleStatus;
    use crate::models::session::StoredSession;
    use crate::models::user_role::UserRole;
    use crate::service::AppServices;
    use crate::test_utils::{MemoryStorage, MockRepository, StubIdentity, StubValidator, test_config, test_services_with};
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct Harness {
        client: Client,
        repo: Arc<MockRepository>,
        identity: Arc<StubIdentity>,
        storage: Arc<MemoryStorage>,
        config: Config,
    }

    async fn harness() -> Harness {
        let config = test_config();
        let repo = Arc::new(MockRepository::default());
        let identity = Arc::new(StubIdentity::default());
        let storage = Arc::new(MemoryStorage::default());

        let mut services: AppServices = test_services_with(repo.clone());
        services.session_validator = Arc::new(StubValidator::accepting());
        services.identity = identity.clone();
        services.storage = storage.clone();

        let rocket = build_rocket_with(config.clone(), services).expect("valid rocket");
        let client = Client::tracked(rocket).await.expect("valid rocket instance");
        Harness {
            client,
            repo,
            identity,
            storage,
            config,
        }
    }

    fn signed_in(h: &Harness) -> Cookie<'static> {
        let session = StubValidator::session("token-1");
        Cookie::new(h.config.session.cookie_name.clone(), session.to_cookie_value().expect("serializable session"))
    }

    #[rocket::async_test]
    async fn admin_login_sets_session_and_redirects_home() {
        let h = harness().await;
        h.repo.set_role(StubIdentity::user_id(), UserRole::Admin);

        let response = h
            .client
            .post("/admin/login")
            .header(ContentType::Form)
            .body("email=admin%40example.com&password=secret")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/admin/dashboard"));
        let cookie = response.cookies().get_private(&h.config.session.cookie_name).expect("session cookie");
        let session = StoredSession::from_cookie_value(cookie.value()).expect("session value");
        assert_eq!(session.access_token, "signed-in-token");
    }

    #[rocket::async_test]
    async fn non_admin_login_is_forbidden_and_signed_out() {
        let h = harness().await;
        h.repo.set_role(StubIdentity::user_id(), UserRole::Editor);

        let response = h
            .client
            .post("/admin/login")
            .header(ContentType::Form)
            .body("email=editor%40example.com&password=secret")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Forbidden);
        assert!(response.cookies().get_private(&h.config.session.cookie_name).is_none());
        assert_eq!(h.identity.signed_out(), vec!["signed-in-token".to_string()]);
    }

    #[rocket::async_test]
    async fn wrong_password_is_unauthorized() {
        let h = harness().await;

        let response = h
            .client
            .post("/admin/login")
            .header(ContentType::Form)
            .body("email=admin%40example.com&password=wrong")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn dashboard_counts_articles() {
        let h = harness().await;
        h.repo.add_article("one", None, ArticleStatus::Published);
        h.repo.add_article("two", None, ArticleStatus::Draft);
        h.repo.add_article("three", None, ArticleStatus::Draft);

        let response = h.client.get("/admin/dashboard").private_cookie(signed_in(&h)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("dashboard json");
        assert_eq!(body["stats"], json!({"total": 3, "published": 1, "draft": 2}));
        assert_eq!(body["email"], "admin@example.com");
    }

    #[rocket::async_test]
    async fn article_create_update_delete() {
        let h = harness().await;
        let cookie = signed_in(&h);

        let response = h
            .client
            .post("/admin/articles")
            .header(ContentType::JSON)
            .private_cookie(cookie.clone())
            .body(r##"{"title":"初配信","content":"# Hello **world**","status":"published","category":"","thumbnail":null}"##)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let created: Value = response.into_json().await.expect("article json");
        assert_eq!(created["excerpt"], " Hello world...");
        assert_eq!(created["category"], Value::Null);
        let id = created["id"].as_str().expect("article id").to_string();

        let response = h
            .client
            .post("/admin/articles")
            .header(ContentType::JSON)
            .private_cookie(cookie.clone())
            .body(json!({"id": id, "title": "初配信 (編集)", "content": "body", "status": "draft"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let updated: Value = response.into_json().await.expect("article json");
        assert_eq!(updated["status"], "draft");
        assert_eq!(h.repo.article_count(), 1);

        let response = h.client.delete(format!("/admin/articles/{}", id)).private_cookie(cookie.clone()).dispatch().await;
        assert_eq!(response.status(), Status::NoContent);
        assert_eq!(h.repo.article_count(), 0);

        let response = h.client.delete(format!("/admin/articles/{}", id)).private_cookie(cookie).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn invalid_article_payload_is_rejected() {
        let h = harness().await;

        let response = h
            .client
            .post("/admin/articles")
            .header(ContentType::JSON)
            .private_cookie(signed_in(&h))
            .body(r#"{"title":"","content":"x"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = h
            .client
            .post("/admin/articles")
            .header(ContentType::JSON)
            .private_cookie(signed_in(&h))
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn about_settings_round_trip_through_admin() {
        let h = harness().await;
        let cookie = signed_in(&h);
        let settings = json!({
            "profile": {"name": "げんのすけ", "bio": "ゲーム配信", "avatar_url": null},
            "schedule": [{"day": "土", "title": "定期配信", "start": "21:00", "end": "24:00"}],
            "favorite_games": []
        });

        let response = h
            .client
            .put("/admin/about")
            .header(ContentType::JSON)
            .private_cookie(cookie.clone())
            .body(settings.to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = h.client.get("/about").dispatch().await.into_json().await.expect("about json");
        assert_eq!(body["settings"]["profile"]["name"], "げんのすけ");
        assert_eq!(body["settings"]["schedule"][0]["day"], "土");
    }

    #[rocket::async_test]
    async fn upload_stores_object_under_folder() {
        let h = harness().await;

        let response = h
            .client
            .post("/admin/uploads/thumbnails?ext=PNG")
            .header(ContentType::PNG)
            .private_cookie(signed_in(&h))
            .body(vec![0x89, b'P', b'N', b'G'])
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let uploads = h.storage.uploads();
        assert_eq!(uploads.len(), 1);
        let (path, content_type, size) = &uploads[0];
        assert!(path.starts_with("thumbnails/") && path.ends_with(".png"));
        assert_eq!(content_type, "image/png");
        assert_eq!(*size, 4);

        let body: Value = response.into_json().await.expect("upload json");
        assert!(body["public_url"].as_str().is_some_and(|url| url.ends_with(path.as_str())));
    }

    #[rocket::async_test]
    async fn upload_rejects_unknown_folder_and_extension() {
        let h = harness().await;

        let response = h.client.post("/admin/uploads/secrets?ext=png").private_cookie(signed_in(&h)).body("x").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = h.client.post("/admin/uploads/images?ext=p.ng").private_cookie(signed_in(&h)).body("x").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
        assert!(h.storage.uploads().is_empty());
    }

    #[rocket::async_test]
    async fn logout_clears_cookie_and_revokes_session() {
        let h = harness().await;

        let response = h.client.post("/admin/logout").private_cookie(signed_in(&h)).dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/admin/login"));
        assert_eq!(h.identity.signed_out(), vec!["token-1".to_string()]);
    }
}
