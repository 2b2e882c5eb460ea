//! Session gate for the admin area.
//!
//! Runs on every request outside the excluded prefixes: resolves the caller's
//! session from the private session cookie, writes back refreshed tokens, and
//! sends anonymous callers of protected paths to the login page. Handlers that
//! need the user still go through [`crate::auth::CurrentUser`]; the gate only
//! decides between forwarding and redirecting.

use crate::auth::SessionCookies;
use crate::config::{AuthConfig, ProviderErrorPolicy};
use crate::models::session::{SessionCheck, SessionUser, StoredSession};
use crate::service::AppServices;
use crate::service::identity::SessionValidator;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::{Data, Request, get, uri};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    protected_prefix: String,
    login_path: String,
    excluded_prefixes: Vec<String>,
    on_provider_error: ProviderErrorPolicy,
}

impl GatePolicy {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            protected_prefix: trim_trailing_slash(&config.protected_prefix),
            login_path: trim_trailing_slash(&config.login_path),
            excluded_prefixes: config
                .excluded_prefixes
                .iter()
                .map(|prefix| prefix.trim_matches('/').to_string())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
            on_provider_error: config.on_provider_error,
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Excluded prefixes are matched against the path without its leading slash.
    pub fn is_excluded(&self, path: &str) -> bool {
        let relative = path.trim_start_matches('/');
        self.excluded_prefixes.iter().any(|prefix| relative.starts_with(prefix.as_str()))
    }

    pub fn is_protected(&self, path: &str) -> bool {
        path.starts_with(&self.protected_prefix)
    }

    pub fn is_login_path(&self, path: &str) -> bool {
        path == self.login_path || path.strip_prefix(&self.login_path).is_some_and(|rest| rest.starts_with('/'))
    }
}

fn trim_trailing_slash(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// What the gate knows about the caller's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Present,
    Absent,
    /// The identity provider could not be asked.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The path is excluded; the gate did not look at it.
    Skip,
    Forward,
    Redirect(String),
}

pub fn decide(policy: &GatePolicy, path: &str, state: SessionState) -> AccessDecision {
    if policy.is_excluded(path) {
        return AccessDecision::Skip;
    }

    let session_present = match state {
        SessionState::Present => true,
        SessionState::Absent => false,
        SessionState::Unknown => match policy.on_provider_error {
            ProviderErrorPolicy::Anonymous => false,
            ProviderErrorPolicy::Forward => return AccessDecision::Forward,
        },
    };

    if !session_present && policy.is_protected(path) && !policy.is_login_path(path) {
        AccessDecision::Redirect(policy.login_path.clone())
    } else {
        AccessDecision::Forward
    }
}

/// Decoded request path with empty segments dropped, so `//admin` and
/// `/%61dmin` are judged as `/admin`.
pub fn normalized_path(request: &Request<'_>) -> String {
    let segments: Vec<&str> = request.uri().path().segments().collect();
    format!("/{}", segments.join("/"))
}

#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub user: SessionUser,
    pub session: StoredSession,
}

#[derive(Debug, Clone)]
pub enum SessionResolution {
    Anonymous,
    Authenticated(ResolvedSession),
    ProviderFailed,
}

impl SessionResolution {
    pub fn state(&self) -> SessionState {
        match self {
            SessionResolution::Anonymous => SessionState::Absent,
            SessionResolution::Authenticated(_) => SessionState::Present,
            SessionResolution::ProviderFailed => SessionState::Unknown,
        }
    }
}

/// Validates the session cookie of `request`, if any.
///
/// A refreshed session replaces the cookie; a rejected one removes it. A
/// request without a session cookie never reaches the identity provider.
pub async fn resolve_session(request: &Request<'_>, validator: &dyn SessionValidator, cookies: &SessionCookies) -> SessionResolution {
    let jar = request.cookies();
    let Some(stored) = cookies.read(jar) else {
        return SessionResolution::Anonymous;
    };

    match validator.validate(&stored).await {
        Ok(SessionCheck { user: Some(user), refreshed }) => {
            let session = match refreshed {
                Some(fresh) => {
                    if let Err(e) = cookies.write(jar, &fresh) {
                        warn!(error = %e, "failed to write refreshed session cookie");
                    }
                    debug!(user_id = %user.id, "session refreshed");
                    fresh
                }
                None => stored,
            };
            SessionResolution::Authenticated(ResolvedSession { user, session })
        }
        Ok(SessionCheck { user: None, .. }) => {
            debug!("session rejected by identity provider; clearing cookie");
            cookies.clear(jar);
            SessionResolution::Anonymous
        }
        Err(e) => {
            warn!(error = %e, "identity provider unavailable while resolving session");
            SessionResolution::ProviderFailed
        }
    }
}

/// Cached per request by the gate.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub resolution: SessionResolution,
    pub decision: AccessDecision,
    /// Method the client sent, before a redirect rewrite.
    pub method: Method,
}

pub fn gate_outcome<'a>(request: &'a Request<'_>) -> Option<&'a GateOutcome> {
    request.local_cache(|| None::<GateOutcome>).as_ref()
}

/// Id of the user the gate resolved for this request, for logging.
pub fn resolved_user_id(request: &Request<'_>) -> Option<String> {
    match &gate_outcome(request)?.resolution {
        SessionResolution::Authenticated(resolved) => Some(resolved.user.id.to_string()),
        _ => None,
    }
}

pub struct AccessGate {
    policy: GatePolicy,
    cookies: SessionCookies,
}

impl AccessGate {
    pub fn new(policy: GatePolicy, cookies: SessionCookies) -> Self {
        Self { policy, cookies }
    }
}

#[rocket::async_trait]
impl Fairing for AccessGate {
    fn info(&self) -> Info {
        Info {
            name: "Access Gate",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        if request.method() == Method::Options {
            return;
        }

        let path = normalized_path(request);
        if self.policy.is_excluded(&path) {
            return;
        }

        let Some(validator) = request.rocket().state::<AppServices>().map(|services| services.session_validator.clone()) else {
            warn!("access gate has no session validator; forwarding");
            return;
        };

        let resolution = resolve_session(request, validator.as_ref(), &self.cookies).await;
        let decision = decide(&self.policy, &path, resolution.state());

        if resolution.state() == SessionState::Unknown && decision == AccessDecision::Forward {
            warn!(path = %path, "forwarding request without a verified session");
        }

        let redirect = matches!(decision, AccessDecision::Redirect(_));
        let method = request.method();
        request.local_cache(|| Some(GateOutcome { resolution, decision, method }));

        if redirect {
            debug!(path = %path, method = %method, login = %self.policy.login_path(), "redirecting anonymous request to login");
            request.set_method(Method::Get);
            request.set_uri(uri!("/_gate/login"));
        }
    }
}

/// Login redirect the gate chose for the current request.
pub struct PendingRedirect {
    target: String,
    method: Method,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PendingRedirect {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match gate_outcome(request) {
            Some(GateOutcome {
                decision: AccessDecision::Redirect(target),
                method,
                ..
            }) => Outcome::Success(PendingRedirect {
                target: target.clone(),
                method: *method,
            }),
            _ => Outcome::Forward(Status::NotFound),
        }
    }
}

/// Internal target of rewritten requests; answers with the login redirect.
///
/// Page navigations keep `307`. Any other method gets `303` so the browser
/// follows up with a plain `GET` instead of replaying the body at the login page.
#[get("/_gate/login")]
pub fn gate_redirect(pending: PendingRedirect) -> Redirect {
    match pending.method {
        Method::Get | Method::Head => Redirect::temporary(pending.target),
        _ => Redirect::to(pending.target),
    }
}
