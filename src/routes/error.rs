use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::Header;
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, Responder, catch};

/// Body of every error response: `{"error": "..."}`.
#[derive(Serialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct ErrorBody {
    pub error: String,
}

fn error_body(message: &str) -> Json<ErrorBody> {
    Json(ErrorBody { error: message.to_string() })
}

#[catch(400)]
pub fn bad_request(_: &Request) -> Json<ErrorBody> {
    error_body("Bad request")
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Json<ErrorBody> {
    error_body("Unauthorized")
}

#[catch(403)]
pub fn forbidden(_: &Request) -> Json<ErrorBody> {
    error_body("Forbidden")
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<ErrorBody> {
    error_body("Not found")
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<ErrorBody> {
    error_body("Conflict")
}

#[catch(413)]
pub fn payload_too_large(_: &Request) -> Json<ErrorBody> {
    error_body("Payload too large")
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> Json<ErrorBody> {
    error_body("Unprocessable entity")
}

#[derive(Responder)]
#[response(status = 429, content_type = "json")]
pub struct TooManyRequests {
    body: Json<ErrorBody>,
    retry_after: Header<'static>,
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    let retry_after = req.local_cache(|| None::<RateLimitRetryAfter>).as_ref().map(|r| r.0).unwrap_or(1);

    TooManyRequests {
        body: error_body("Too many requests"),
        retry_after: Header::new("Retry-After", retry_after.to_string()),
    }
}

#[catch(500)]
pub fn internal_error(_: &Request) -> Json<ErrorBody> {
    error_body("Internal server error")
}

#[catch(503)]
pub fn service_unavailable(_: &Request) -> Json<ErrorBody> {
    error_body("Service unavailable")
}

pub fn catchers() -> Vec<rocket::Catcher> {
    rocket::catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        conflict,
        payload_too_large,
        unprocessable_entity,
        too_many_requests,
        internal_error,
        service_unavailable
    ]
}
