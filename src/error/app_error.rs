use crate::service::identity::IdentityError;
use crate::service::storage::StorageError;
use crate::service::twitch::TwitchError;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),
    #[error("Server configuration error")]
    Configuration(String),
    #[error("Identity provider unavailable")]
    IdentityUnavailable {
        #[source]
        source: IdentityError,
    },
    #[error("Identity provider unavailable")]
    SessionUnavailable,
    #[error("Internal server error")]
    Upstream {
        #[source]
        source: TwitchError,
    },
    #[error("Upload failed")]
    Storage {
        #[source]
        source: StorageError,
    },
    #[error("Internal server error")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Db { .. } => Status::InternalServerError,
            AppError::Unauthorized => Status::Unauthorized,
            AppError::InvalidCredentials => Status::Unauthorized,
            AppError::Forbidden(_) => Status::Forbidden,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::PayloadTooLarge => Status::PayloadTooLarge,
            AppError::ValidationError(_) => Status::BadRequest,
            AppError::Configuration(_) => Status::InternalServerError,
            AppError::IdentityUnavailable { .. } => Status::ServiceUnavailable,
            AppError::SessionUnavailable => Status::ServiceUnavailable,
            AppError::Upstream { .. } => Status::InternalServerError,
            AppError::Storage { .. } => Status::BadGateway,
            AppError::Serialization(_) => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        // Set by the access gate when it resolved a session for this request
        let user_id = crate::middleware::access_gate::resolved_user_id(req).unwrap_or_else(|| "anonymous".to_string());

        error!(
            error = ?self,
            request_id = %request_id,
            user_id = %user_id,
            method = %method,
            uri = %uri,
            "request failed"
        );

        let status = Status::from(&self);
        let body = serde_json::json!({ "error": self.to_string() }).to_string();

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Bad Request"),
            ("429", "Too Many Requests"),
            ("500", "Internal Server Error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::db("Database error", e),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidCredentials => AppError::InvalidCredentials,
            source => AppError::IdentityUnavailable { source },
        }
    }
}

impl From<TwitchError> for AppError {
    fn from(e: TwitchError) -> Self {
        match e {
            TwitchError::MissingCredentials => AppError::Configuration("Twitch client credentials are not configured".to_string()),
            source => AppError::Upstream { source },
        }
    }
}

impl From<StorageError> for AppError {
    fn from(source: StorageError) -> Self {
        AppError::Storage { source }
    }
}
