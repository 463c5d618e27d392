use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::StatusCode,
    HttpRequest, HttpResponse,
};
use log::debug;
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct ResponseDto<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ResponseDto<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            success: true,
            status: None,
            message: None,
            data,
        }
    }

    pub fn fail(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            status: Some(status.as_u16()),
            message: Some(msg.into()),
            data: None,
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ResponseDto::success(Some(data)))
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(ResponseDto::success(Some(data)))
}

pub fn ok_empty() -> HttpResponse {
    HttpResponse::Ok().json(ResponseDto::<()>::success(None))
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("rejected json payload: {}", err);
    let app_err = match err {
        JsonPayloadError::ContentType => AppError::param_error("Expected a JSON body"),
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            AppError::PayloadTooLarge("Request body too large".to_string())
        }
        _ => AppError::param_error("Invalid input"),
    };
    app_err.into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("rejected query string: {}", err);
    AppError::param_error("Invalid query parameters").into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    debug!("rejected path: {}", err);
    AppError::param_error("Invalid request").into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    let status = err.status();
    HttpResponse::build(status).json(ResponseDto::<()>::fail(status, err.msg()))
}
