use crate::config::SessionConfig;
use crate::error::app_error::AppError;
use crate::middleware::access_gate::{ResolvedSession, SessionResolution, gate_outcome, resolve_session};
use crate::models::session::StoredSession;
use crate::service::AppServices;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket::time::Duration;
use uuid::Uuid;

/// The signed-in user of an admin request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Forwarded to the storage API, which authorizes uploads per user.
    pub access_token: String,
}

impl From<ResolvedSession> for CurrentUser {
    fn from(resolved: ResolvedSession) -> Self {
        Self {
            id: resolved.user.id,
            email: resolved.user.email,
            access_token: resolved.session.access_token,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        // The gate already asked the identity provider for this request.
        let resolution = match gate_outcome(req) {
            Some(outcome) => outcome.resolution.clone(),
            None => {
                let (Some(services), Some(cookies)) = (req.rocket().state::<AppServices>(), req.rocket().state::<SessionCookies>()) else {
                    return Outcome::Error((Status::InternalServerError, AppError::Configuration("session services are not managed".to_string())));
                };
                resolve_session(req, services.session_validator.as_ref(), cookies).await
            }
        };

        match resolution {
            SessionResolution::Authenticated(resolved) => Outcome::Success(CurrentUser::from(resolved)),
            SessionResolution::Anonymous => Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
            SessionResolution::ProviderFailed => Outcome::Error((Status::ServiceUnavailable, AppError::SessionUnavailable)),
        }
    }
}

/// Reads and writes the encrypted session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    secure: bool,
    max_age_days: i64,
}

impl SessionCookies {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.cookie_secure,
            max_age_days: config.max_age_days.max(1),
        }
    }

    pub fn read(&self, jar: &CookieJar<'_>) -> Option<StoredSession> {
        let cookie = jar.get_private(&self.name)?;
        StoredSession::from_cookie_value(cookie.value())
    }

    pub fn write(&self, jar: &CookieJar<'_>, session: &StoredSession) -> Result<(), serde_json::Error> {
        let value = session.to_cookie_value()?;
        jar.add_private(
            Cookie::build((self.name.clone(), value))
                .path("/")
                .http_only(true)
                .secure(self.secure)
                .same_site(SameSite::Lax)
                .max_age(Duration::days(self.max_age_days))
                .build(),
        );
        Ok(())
    }

    pub fn clear(&self, jar: &CookieJar<'_>) {
        jar.remove_private(Cookie::build((self.name.clone(), "")).path("/").build());
    }
}
