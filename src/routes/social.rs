use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::graph;
use crate::response::{created, ok, ok_empty};

pub fn config(cfg: &mut web::ServiceConfig) {
    // POST takes a post id, DELETE takes the edge id.
    cfg.service(
        web::resource("/post/like/{id}")
            .route(web::post().to(like))
            .route(web::delete().to(unlike)),
    )
    .service(
        web::resource("/post/retweet/{id}")
            .route(web::post().to(retweet))
            .route(web::delete().to(unretweet)),
    )
    .service(
        web::resource("/follow/{user_id}")
            .route(web::post().to(follow))
            .route(web::delete().to(unfollow)),
    )
    .service(web::resource("/followers/{user_id}").route(web::get().to(followers)))
    .service(web::resource("/following/{user_id}").route(web::get().to(following)));
}

async fn like(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let edge = graph::like_post(db.get_ref(), &auth.user_id, &path).await?;
    Ok(created(edge))
}

async fn unlike(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    graph::unlike_post(db.get_ref(), &auth.user_id, &path).await?;
    Ok(ok_empty())
}

async fn retweet(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let edge = graph::retweet_post(db.get_ref(), &auth.user_id, &path).await?;
    Ok(created(edge))
}

async fn unretweet(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    graph::unretweet_post(db.get_ref(), &auth.user_id, &path).await?;
    Ok(ok_empty())
}

async fn follow(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let edge = graph::follow(db.get_ref(), &auth.user_id, &path).await?;
    Ok(created(edge))
}

async fn unfollow(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    graph::unfollow(db.get_ref(), &auth.user_id, &path).await?;
    Ok(ok_empty())
}

async fn followers(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(ok(graph::followers(db.get_ref(), &path).await?))
}

async fn following(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(ok(graph::following(db.get_ref(), &path).await?))
}
