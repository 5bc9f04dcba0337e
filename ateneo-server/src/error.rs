/* Tassonomia degli errori del server.
    Ogni fallimento per-richiesta finisce qui e viene mappato una volta sola
    su status HTTP + corpo JSON; i due percorsi di ingestione condividono
    quindi la stessa classificazione (il percorso push la logga e basta).
*/
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Token mancante, sconosciuto o scaduto.
    #[error("{0}")]
    Unauthenticated(String),

    /// Identità valida ma non autorizzata (non membro, o non creatore).
    #[error("{0}")]
    Forbidden(String),

    /// Gruppo o messaggio inesistente.
    #[error("{0}")]
    NotFound(String),

    /// Nome già in uso.
    #[error("{0}")]
    Conflict(String),

    /// Input non valido (es. contenuto vuoto).
    #[error("{0}")]
    InvalidArgument(String),

    /// Storage non raggiungibile: nessun broadcast per il messaggio fallito.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "notFound",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidArgument(_) => "invalidArgument",
            ApiError::Unavailable(_) => "unavailable",
        }
    }

    /// Rappresentazione wire condivisa con il protocollo WS.
    pub fn to_wire(&self) -> ateneo_core::Error {
        ateneo_core::Error::new(self.code(), self.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_wire())).into_response()
    }
}
