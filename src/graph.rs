//! Social-graph edges: likes, retweets, follows, and post deletion.
//!
//! Every removal is a single `DELETE ... WHERE id = ? AND owner = ?`. The
//! affected-row count alone decides success, so "missing" and "someone
//! else's" are the same error and two racing deletes cannot both succeed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{follow, like, post, retweet, user};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDto {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<like::Model> for EdgeDto {
    fn from(m: like::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            post_id: m.post_id,
            created_at: m.created_at,
        }
    }
}

impl From<retweet::Model> for EdgeDto {
    fn from(m: retweet::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            post_id: m.post_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowDto {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUserDto {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub followed_at: DateTime<Utc>,
}

fn edge_insert_error(err: DbErr, conflict: &str, missing: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict(conflict),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::not_found(missing),
        _ => err.into(),
    }
}

async fn delete_owned<E>(
    db: &DatabaseConnection,
    filter: Condition,
    what: &str,
) -> Result<(), AppError>
where
    E: EntityTrait,
{
    let res = E::delete_many().filter(filter).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_owned(format!(
            "{} did not exist or did not belong to the user",
            what
        )));
    }
    debug!("deleted {} {} row(s)", res.rows_affected, what);
    Ok(())
}

pub async fn like_post(
    db: &DatabaseConnection,
    actor: &str,
    post_id: &str,
) -> Result<EdgeDto, AppError> {
    like::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(actor.to_string()),
        post_id: Set(post_id.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map(EdgeDto::from)
    .map_err(|e| edge_insert_error(e, "Post already liked", "Post does not exist"))
}

pub async fn unlike_post(
    db: &DatabaseConnection,
    actor: &str,
    like_id: &str,
) -> Result<(), AppError> {
    delete_owned::<like::Entity>(
        db,
        Condition::all()
            .add(like::Column::Id.eq(like_id))
            .add(like::Column::UserId.eq(actor)),
        "Like",
    )
    .await
}

pub async fn retweet_post(
    db: &DatabaseConnection,
    actor: &str,
    post_id: &str,
) -> Result<EdgeDto, AppError> {
    retweet::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(actor.to_string()),
        post_id: Set(post_id.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map(EdgeDto::from)
    .map_err(|e| edge_insert_error(e, "Post already retweeted", "Post does not exist"))
}

pub async fn unretweet_post(
    db: &DatabaseConnection,
    actor: &str,
    retweet_id: &str,
) -> Result<(), AppError> {
    delete_owned::<retweet::Entity>(
        db,
        Condition::all()
            .add(retweet::Column::Id.eq(retweet_id))
            .add(retweet::Column::UserId.eq(actor)),
        "Retweet",
    )
    .await
}

/// Comments, likes and retweets of the post go with it (FK cascade).
pub async fn delete_post(
    db: &DatabaseConnection,
    actor: &str,
    post_id: &str,
) -> Result<(), AppError> {
    delete_owned::<post::Entity>(
        db,
        Condition::all()
            .add(post::Column::Id.eq(post_id))
            .add(post::Column::AuthorId.eq(actor)),
        "Post",
    )
    .await
}

pub async fn follow(
    db: &DatabaseConnection,
    follower: &str,
    following: &str,
) -> Result<FollowDto, AppError> {
    if follower == following {
        return Err(AppError::param_error("You cannot follow yourself"));
    }
    let m = follow::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        follower_id: Set(follower.to_string()),
        following_id: Set(following.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| edge_insert_error(e, "Already following", "User does not exist"))?;
    Ok(FollowDto {
        id: m.id,
        follower_id: m.follower_id,
        following_id: m.following_id,
        created_at: m.created_at,
    })
}

/// Addressed by its endpoints; the caller can only remove their own edge.
pub async fn unfollow(
    db: &DatabaseConnection,
    follower: &str,
    following: &str,
) -> Result<(), AppError> {
    delete_owned::<follow::Entity>(
        db,
        Condition::all()
            .add(follow::Column::FollowerId.eq(follower))
            .add(follow::Column::FollowingId.eq(following)),
        "Follow",
    )
    .await
}

#[derive(Clone, Copy)]
enum Side {
    Followers,
    Following,
}

async fn follow_list(
    db: &DatabaseConnection,
    user_id: &str,
    side: Side,
) -> Result<Vec<FollowUserDto>, AppError> {
    if user::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("User does not exist"));
    }

    let anchor = match side {
        Side::Followers => follow::Column::FollowingId,
        Side::Following => follow::Column::FollowerId,
    };
    let edges = follow::Entity::find()
        .filter(anchor.eq(user_id))
        .order_by_desc(follow::Column::CreatedAt)
        .all(db)
        .await?;
    let ids: Vec<String> = edges
        .iter()
        .map(|e| match side {
            Side::Followers => e.follower_id.clone(),
            Side::Following => e.following_id.clone(),
        })
        .collect();
    let users: HashMap<String, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    Ok(edges
        .into_iter()
        .zip(ids)
        .filter_map(|(edge, id)| {
            users.get(&id).map(|u| FollowUserDto {
                id: u.id.clone(),
                username: u.username.clone(),
                first_name: u.first_name.clone(),
                last_name: u.last_name.clone(),
                followed_at: edge.created_at,
            })
        })
        .collect())
}

pub async fn followers(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<FollowUserDto>, AppError> {
    follow_list(db, user_id, Side::Followers).await
}

pub async fn following(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<FollowUserDto>, AppError> {
    follow_list(db, user_id, Side::Following).await
}
