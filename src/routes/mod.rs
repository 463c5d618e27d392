pub mod auth;
pub mod cors;
pub mod post;
pub mod social;

use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::web;
use futures_util::StreamExt;
use log::debug;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::profanity::ProfanityFilter;
use crate::response::{json_error_handler, path_error_handler, query_error_handler};
use crate::storage::ObjectStore;

const MAX_TEXT_FIELD_BYTES: usize = 16 * 1024;
/// Room for every non-file part of one multipart request.
const MAX_FORM_TEXT_BYTES: usize = 64 * 1024;

/// Shared state and every `/api` route. Cloned once per worker.
pub fn app(
    config: web::Data<AppConfig>,
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    filter: web::Data<ProfanityFilter>,
) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(config.clone())
            .app_data(db.clone())
            .app_data(store.clone())
            .app_data(filter.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .service(
                web::scope("/api")
                    .service(web::scope("/auth").configure(auth::config))
                    .service(
                        web::scope("/user")
                            .configure(post::config)
                            .configure(social::config),
                    ),
            );
    }
}

#[derive(Default)]
pub struct MultipartForm {
    texts: HashMap<String, String>,
    file: Option<Vec<u8>>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self) -> Option<Vec<u8>> {
        self.file.take().filter(|bytes| !bytes.is_empty())
    }
}

fn too_large() -> AppError {
    AppError::PayloadTooLarge("Request body too large".to_string())
}

/// Buffers a multipart body. Only the file part named `file_field` is kept;
/// other file parts are drained. A kept file over `max_file_bytes` fails with
/// 413, and so does a body whose parts together exceed
/// `max_file_bytes + MAX_FORM_TEXT_BYTES`.
pub async fn read_multipart(
    mut payload: Multipart,
    file_field: &str,
    max_file_bytes: usize,
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();
    let mut budget = max_file_bytes.saturating_add(MAX_FORM_TEXT_BYTES);
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            debug!("bad multipart body: {}", e);
            AppError::param_error("Invalid multipart body")
        })?;
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let is_file = field.content_disposition().get_filename().is_some();
        let keep = !is_file || name == file_field;
        let limit = if is_file {
            max_file_bytes
        } else {
            MAX_TEXT_FIELD_BYTES
        };

        let mut buf = Vec::new();
        let mut seen = 0;
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| {
                debug!("multipart field {} failed: {}", name, e);
                AppError::param_error("Invalid multipart body")
            })?;
            budget = budget.checked_sub(data.len()).ok_or_else(too_large)?;
            seen += data.len();
            if !keep {
                continue;
            }
            if seen > limit {
                return Err(if is_file {
                    AppError::PayloadTooLarge("File too large".to_string())
                } else {
                    AppError::param_error(format!("{} is too long", name))
                });
            }
            buf.extend_from_slice(&data);
        }

        if !keep {
            debug!("ignored multipart file field {} ({} bytes)", name, seen);
        } else if is_file {
            form.file = Some(buf);
        } else {
            let text = String::from_utf8(buf)
                .map_err(|_| AppError::param_error(format!("{} must be text", name)))?;
            form.texts.insert(name, text);
        }
    }
    Ok(form)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use actix_web::{cookie::Cookie, http::header};

    use super::*;
    use crate::account::RegisteredUser;
    use crate::auth::{issue_token, session_cookie};
    use crate::config::test_config;
    use crate::db::test_db;
    use crate::storage::fake::FakeStore;

    pub(crate) const BOUNDARY: &str = "----chirp-test-boundary";

    pub(crate) struct TestApp {
        pub(crate) db: DatabaseConnection,
        pub(crate) store: Arc<FakeStore>,
    }

    impl TestApp {
        pub(crate) async fn new() -> Self {
            Self {
                db: test_db().await,
                store: Arc::new(FakeStore::default()),
            }
        }

        pub(crate) fn routes(&self) -> impl Fn(&mut web::ServiceConfig) + Clone {
            let store: Arc<dyn ObjectStore> = self.store.clone();
            app(
                web::Data::new(test_config()),
                web::Data::new(self.db.clone()),
                web::Data::from(store),
                web::Data::new(ProfanityFilter::new(&[]).unwrap()),
            )
        }
    }

    pub(crate) fn cookie_for(user: &RegisteredUser) -> Cookie<'static> {
        let token = issue_token(&test_config().jwt_secret, &user.id, &user.username).unwrap();
        session_cookie(token)
    }

    pub(crate) enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    pub(crate) fn multipart_body(parts: &[Part<'_>]) -> (header::HeaderValue, Vec<u8>) {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
                Part::File(name, filename, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            name, filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        let content_type = header::HeaderValue::from_str(&format!(
            "multipart/form-data; boundary={}",
            BOUNDARY
        ))
        .unwrap();
        (content_type, body)
    }
}
