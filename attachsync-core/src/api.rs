use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    NotFound,
    Conflict,
    RateLimit,
    Transient,
    Permanent,
}

pub(crate) fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::NOT_FOUND {
        ApiErrorClass::NotFound
    } else if status == StatusCode::CONFLICT {
        ApiErrorClass::Conflict
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY)
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}
