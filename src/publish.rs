use chrono::{DateTime, Utc};
use log::{info, warn};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{comment, post};
use crate::error::AppError;
use crate::profanity::ProfanityFilter;
use crate::storage::{ImageKind, ObjectStore, StagedImage};
use crate::validate::{self, CONTENT_LEN};

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPost {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub img_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedComment {
    pub id: String,
    pub author_id: String,
    pub post_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

fn check_content(filter: &ProfanityFilter, content: &str) -> Result<String, AppError> {
    validate::length("Content", content, CONTENT_LEN)?;
    filter.check(content)?;
    Ok(content.trim().to_string())
}

/// Nothing is uploaded or stored unless the text passes every check. The row
/// is inserted before the image is uploaded; a failed upload deletes the row.
pub async fn create_post(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    filter: &ProfanityFilter,
    author_id: &str,
    content: &str,
    image: Option<Vec<u8>>,
) -> Result<CreatedPost, AppError> {
    let content = check_content(filter, content)?;
    let staged = image.map(StagedImage::new).transpose()?;
    let now = Utc::now();
    let m = post::ActiveModel {
        cursor_id: NotSet,
        id: Set(Uuid::new_v4().to_string()),
        author_id: Set(author_id.to_string()),
        content: Set(content),
        img_file_name: Set(staged.as_ref().map(|s| s.file_name.clone())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    if let Some(staged) = staged {
        if let Err(e) = staged.store(store, ImageKind::Content).await {
            let removed = post::Entity::delete_many()
                .filter(post::Column::Id.eq(m.id.as_str()))
                .exec(db)
                .await;
            if let Err(db_err) = removed {
                warn!("post {} kept without its image: {}", m.id, db_err);
            }
            return Err(e);
        }
    }

    info!("user {} created post {}", m.author_id, m.id);
    Ok(CreatedPost {
        id: m.id,
        author_id: m.author_id,
        content: m.content,
        img_file_name: m.img_file_name,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

pub async fn create_comment(
    db: &DatabaseConnection,
    filter: &ProfanityFilter,
    author_id: &str,
    post_id: &str,
    req: CommentRequest,
) -> Result<CreatedComment, AppError> {
    let content = check_content(filter, &req.content)?;
    let m = comment::ActiveModel {
        cursor_id: NotSet,
        id: Set(Uuid::new_v4().to_string()),
        author_id: Set(author_id.to_string()),
        post_id: Set(post_id.to_string()),
        content: Set(content),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            AppError::not_found("Post does not exist")
        }
        _ => e.into(),
    })?;
    Ok(CreatedComment {
        id: m.id,
        author_id: m.author_id,
        post_id: m.post_id,
        content: m.content,
        created_at: m.created_at,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) async fn seed_post(
        db: &DatabaseConnection,
        author_id: &str,
        content: &str,
    ) -> post::Model {
        let now = Utc::now();
        post::ActiveModel {
            cursor_id: NotSet,
            id: Set(Uuid::new_v4().to_string()),
            author_id: Set(author_id.to_string()),
            content: Set(content.to_string()),
            img_file_name: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap()
    }
}
