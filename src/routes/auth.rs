use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use log::info;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::account::{self, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::auth::{issue_token, removal_cookie, session_cookie, AuthUser};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::response::{created, ok, ResponseDto};
use crate::routes::read_multipart;
use crate::storage::ObjectStore;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register").route(web::post().to(register)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(web::resource("/me").route(web::get().to(me)))
        .service(web::resource("/user/{user_id}").route(web::get().to(get_user)))
        .service(web::resource("/update-profile").route(web::patch().to(update_profile)))
        .service(web::resource("/update-avatar").route(web::patch().to(update_avatar)));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvatarResponse {
    updated_avatar_file_name: String,
}

async fn register(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let user = account::register(db.get_ref(), config.bcrypt_cost, payload.into_inner()).await?;
    Ok(created(user))
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let user =
        account::authenticate(db.get_ref(), config.bcrypt_cost, payload.into_inner()).await?;
    let token = issue_token(&config.jwt_secret, &user.id, &user.username)?;
    info!("user {} logged in", user.username);
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token))
        .json(ResponseDto::success(Some(user))))
}

async fn logout(_auth: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok()
        .cookie(removal_cookie())
        .json(ResponseDto::<()>::success(None)))
}

async fn me(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let profile = account::get_profile(db.get_ref(), store.get_ref(), &auth.user_id).await?;
    Ok(ok(profile))
}

async fn get_user(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let profile = account::get_profile(db.get_ref(), store.get_ref(), &path).await?;
    Ok(ok(profile))
}

async fn update_profile(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    auth: AuthUser,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let profile = account::update_profile(
        db.get_ref(),
        store.get_ref(),
        &auth.user_id,
        payload.into_inner(),
    )
    .await?;
    Ok(ok(profile))
}

async fn update_avatar(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    config: web::Data<AppConfig>,
    auth: AuthUser,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut form = read_multipart(payload, "avatar", config.max_upload_bytes).await?;
    let image = form
        .take_file()
        .ok_or_else(|| AppError::param_error("Image not provided"))?;
    let file_name =
        account::update_avatar(db.get_ref(), store.get_ref(), &auth.user_id, image).await?;
    Ok(ok(AvatarResponse {
        updated_avatar_file_name: file_name,
    }))
}
