use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::feed::{self, PageQuery};
use crate::graph;
use crate::profanity::ProfanityFilter;
use crate::publish::{self, CommentRequest};
use crate::response::{created, ok, ok_empty};
use crate::routes::read_multipart;
use crate::storage::ObjectStore;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/post").route(web::post().to(create_post)))
        .service(web::resource("/posts").route(web::get().to(list_feed)))
        .service(
            web::resource("/post/{post_id}")
                .route(web::get().to(get_post))
                .route(web::delete().to(delete_post)),
        )
        .service(web::resource("/posts/{user_id}").route(web::get().to(list_user_posts)))
        .service(web::resource("/comment/{post_id}").route(web::post().to(create_comment)))
        .service(web::resource("/comments/{post_id}").route(web::get().to(list_comments)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewerQuery {
    user_id: Option<String>,
}

/// Session identity wins over the `userId` query parameter.
fn viewer(auth: OptionalAuthUser, fallback: Option<String>) -> Option<String> {
    auth.0
        .map(|a| a.user_id)
        .or(fallback.filter(|id| !id.trim().is_empty()))
}

async fn create_post(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    filter: web::Data<ProfanityFilter>,
    config: web::Data<AppConfig>,
    auth: AuthUser,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut form = read_multipart(payload, "post-image", config.max_upload_bytes).await?;
    let image = form.take_file();
    let content = form
        .text("content")
        .ok_or_else(|| AppError::param_error("Content cannot be empty"))?;
    let post = publish::create_post(
        db.get_ref(),
        store.get_ref(),
        filter.get_ref(),
        &auth.user_id,
        content,
        image,
    )
    .await?;
    Ok(created(post))
}

async fn list_feed(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    auth: OptionalAuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = query.page()?;
    let viewer = viewer(auth, query.user_id);
    let posts = feed::list_feed(db.get_ref(), store.get_ref(), page, viewer.as_deref()).await?;
    Ok(ok(posts))
}

async fn get_post(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
    query: web::Query<ViewerQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer = viewer(auth, query.into_inner().user_id);
    let post = feed::get_post(db.get_ref(), store.get_ref(), &path, viewer.as_deref()).await?;
    Ok(ok(post))
}

async fn list_user_posts(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = query.page()?;
    let viewer = viewer(auth, query.user_id);
    let posts = feed::list_user_posts(
        db.get_ref(),
        store.get_ref(),
        &path,
        page,
        viewer.as_deref(),
    )
    .await?;
    Ok(ok(posts))
}

async fn delete_post(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    graph::delete_post(db.get_ref(), &auth.user_id, &path).await?;
    Ok(ok_empty())
}

async fn create_comment(
    db: web::Data<DatabaseConnection>,
    filter: web::Data<ProfanityFilter>,
    auth: AuthUser,
    path: web::Path<String>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let comment = publish::create_comment(
        db.get_ref(),
        filter.get_ref(),
        &auth.user_id,
        &path,
        payload.into_inner(),
    )
    .await?;
    Ok(created(comment))
}

async fn list_comments(
    db: web::Data<DatabaseConnection>,
    store: web::Data<dyn ObjectStore>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page()?;
    let comments = feed::list_comments(db.get_ref(), store.get_ref(), &path, page).await?;
    Ok(ok(comments))
}
