//! Read side: feed, single post, per-user posts and comments.
//!
//! Pages come from `PageRequest::apply`; image URLs are signed concurrently
//! after the page is fetched, with `try_join_all` keeping row order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use log::error;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entity::{comment, like, post, retweet, user};
use crate::error::AppError;
use crate::pagination::{Direction, Page, PageRequest};
use crate::storage::{self, ImageKind, ObjectStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub take: Option<u64>,
    pub cursor: Option<String>,
    pub user_id: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> Result<PageRequest, AppError> {
        PageRequest::parse(self.take, self.cursor.as_deref())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDto {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: String,
    pub content: String,
    pub author: AuthorDto,
    pub post_image_url: Option<String>,
    pub like_count: i64,
    pub retweet_count: i64,
    /// The viewer's own like on this post, if any.
    pub like_id: Option<String>,
    pub retweet_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub author: AuthorDto,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Reactions {
    likes: HashMap<String, i64>,
    retweets: HashMap<String, i64>,
    viewer_likes: HashMap<String, String>,
    viewer_retweets: HashMap<String, String>,
}

async fn count_by_post<E>(
    db: &DatabaseConnection,
    post_col: E::Column,
    post_ids: &[String],
) -> Result<HashMap<String, i64>, AppError>
where
    E: EntityTrait,
{
    let rows: Vec<(String, i64)> = E::find()
        .select_only()
        .column(post_col)
        .column_as(Expr::col(post_col).count(), "count")
        .filter(post_col.is_in(post_ids.to_vec()))
        .group_by(post_col)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

/// post id -> the viewer's edge id on that post.
async fn viewer_edges<E>(
    db: &DatabaseConnection,
    (id_col, user_col, post_col): (E::Column, E::Column, E::Column),
    viewer: &str,
    post_ids: &[String],
) -> Result<HashMap<String, String>, AppError>
where
    E: EntityTrait,
{
    let rows: Vec<(String, String)> = E::find()
        .select_only()
        .column(post_col)
        .column(id_col)
        .filter(user_col.eq(viewer))
        .filter(post_col.is_in(post_ids.to_vec()))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn load_reactions(
    db: &DatabaseConnection,
    post_ids: &[String],
    viewer: Option<&str>,
) -> Result<Reactions, AppError> {
    if post_ids.is_empty() {
        return Ok(Reactions::default());
    }
    let mut reactions = Reactions {
        likes: count_by_post::<like::Entity>(db, like::Column::PostId, post_ids).await?,
        retweets: count_by_post::<retweet::Entity>(db, retweet::Column::PostId, post_ids).await?,
        ..Default::default()
    };
    if let Some(viewer) = viewer {
        reactions.viewer_likes = viewer_edges::<like::Entity>(
            db,
            (like::Column::Id, like::Column::UserId, like::Column::PostId),
            viewer,
            post_ids,
        )
        .await?;
        reactions.viewer_retweets = viewer_edges::<retweet::Entity>(
            db,
            (
                retweet::Column::Id,
                retweet::Column::UserId,
                retweet::Column::PostId,
            ),
            viewer,
            post_ids,
        )
        .await?;
    }
    Ok(reactions)
}

fn require_author(author: Option<user::Model>, row_id: &str) -> Result<user::Model, AppError> {
    author.ok_or_else(|| {
        error!("row {} has no author", row_id);
        AppError::system_exception()
    })
}

async fn author_dto(store: &dyn ObjectStore, author: user::Model) -> Result<AuthorDto, AppError> {
    let avatar_url =
        storage::signed_url(store, ImageKind::Avatar, author.avatar_file_name.as_deref()).await?;
    Ok(AuthorDto {
        id: author.id,
        username: author.username,
        avatar_url,
    })
}

async fn post_dto(
    store: &dyn ObjectStore,
    reactions: &Reactions,
    p: post::Model,
    author: Option<user::Model>,
) -> Result<PostDto, AppError> {
    let author = require_author(author, &p.id)?;
    let author = author_dto(store, author).await?;
    let post_image_url =
        storage::signed_url(store, ImageKind::Content, p.img_file_name.as_deref()).await?;
    Ok(PostDto {
        like_count: reactions.likes.get(&p.id).copied().unwrap_or(0),
        retweet_count: reactions.retweets.get(&p.id).copied().unwrap_or(0),
        like_id: reactions.viewer_likes.get(&p.id).cloned(),
        retweet_id: reactions.viewer_retweets.get(&p.id).cloned(),
        id: p.id,
        content: p.content,
        author,
        post_image_url,
        created_at: p.created_at,
        updated_at: p.updated_at,
    })
}

async fn post_page(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    rows: Vec<(post::Model, Option<user::Model>)>,
    take: u64,
    viewer: Option<&str>,
) -> Result<Page<PostDto>, AppError> {
    let page = Page::from_rows(rows, take, |(p, _)| p.cursor_id);
    let ids: Vec<String> = page.items.iter().map(|(p, _)| p.id.clone()).collect();
    let reactions = load_reactions(db, &ids, viewer).await?;
    let reactions = &reactions;

    let Page { items, next_cursor } = page;
    let items = try_join_all(
        items
            .into_iter()
            .map(|(p, author)| post_dto(store, reactions, p, author)),
    )
    .await?;
    Ok(Page { items, next_cursor })
}

/// Global feed, newest first.
pub async fn list_feed(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    page: PageRequest,
    viewer: Option<&str>,
) -> Result<Page<PostDto>, AppError> {
    let rows = page
        .apply(
            post::Entity::find().find_also_related(user::Entity),
            post::Column::CursorId,
            Direction::Descending,
        )
        .all(db)
        .await?;
    post_page(db, store, rows, page.take, viewer).await
}

pub async fn get_post(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    post_id: &str,
    viewer: Option<&str>,
) -> Result<PostDto, AppError> {
    let (p, author) = post::Entity::find()
        .filter(post::Column::Id.eq(post_id))
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Post does not exist"))?;
    let reactions = load_reactions(db, &[p.id.clone()], viewer).await?;
    post_dto(store, &reactions, p, author).await
}

/// Oldest first. A user without posts gets an empty page; an unknown user
/// is `NotFound`.
pub async fn list_user_posts(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    user_id: &str,
    page: PageRequest,
    viewer: Option<&str>,
) -> Result<Page<PostDto>, AppError> {
    if user::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("User does not exist"));
    }
    let rows = page
        .apply(
            post::Entity::find()
                .filter(post::Column::AuthorId.eq(user_id))
                .find_also_related(user::Entity),
            post::Column::CursorId,
            Direction::Ascending,
        )
        .all(db)
        .await?;
    post_page(db, store, rows, page.take, viewer).await
}

pub async fn list_comments(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    post_id: &str,
    page: PageRequest,
) -> Result<Page<CommentDto>, AppError> {
    let exists = post::Entity::find()
        .filter(post::Column::Id.eq(post_id))
        .one(db)
        .await?
        .is_some();
    if !exists {
        return Err(AppError::not_found("Post does not exist"));
    }
    let rows = page
        .apply(
            comment::Entity::find()
                .filter(comment::Column::PostId.eq(post_id))
                .find_also_related(user::Entity),
            comment::Column::CursorId,
            Direction::Ascending,
        )
        .all(db)
        .await?;
    let Page { items, next_cursor } = Page::from_rows(rows, page.take, |(c, _)| c.cursor_id);
    let items = try_join_all(items.into_iter().map(|(c, author)| async move {
        let author = require_author(author, &c.id)?;
        Ok::<_, AppError>(CommentDto {
            author: author_dto(store, author).await?,
            id: c.id,
            post_id: c.post_id,
            content: c.content,
            created_at: c.created_at,
        })
    }))
    .await?;
    Ok(Page { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::account::testing::seed_user;
    use crate::cursor;
    use crate::db::test_db;
    use crate::graph;
    use crate::publish::testing::seed_post;
    use crate::publish::{create_comment, CommentRequest};
    use crate::profanity::ProfanityFilter;
    use crate::storage::fake::FakeStore;

    fn req(take: u64, cursor: Option<&str>) -> PageRequest {
        PageRequest::parse(Some(take), cursor).unwrap()
    }

    fn contents(page: &Page<PostDto>) -> Vec<&str> {
        page.items.iter().map(|p| p.content.as_str()).collect()
    }

    #[actix_web::test]
    async fn user_posts_paginate_in_sequence_order() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        let p1 = seed_post(&db, &alice.id, "P1").await;
        let p2 = seed_post(&db, &alice.id, "P2").await;
        seed_post(&db, &alice.id, "P3").await;
        assert!(p1.cursor_id < p2.cursor_id);

        let first = list_user_posts(&db, &store, &alice.id, req(2, None), None)
            .await
            .unwrap();
        assert_eq!(contents(&first), vec!["P1", "P2"]);
        assert_eq!(first.next_cursor, Some(cursor::encode(p2.cursor_id)));

        let second = list_user_posts(
            &db,
            &store,
            &alice.id,
            req(2, first.next_cursor.as_deref()),
            None,
        )
        .await
        .unwrap();
        assert_eq!(contents(&second), vec!["P3"]);
        assert_eq!(second.next_cursor, None);
    }

    #[actix_web::test]
    async fn feed_walk_is_complete_and_newest_first() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bobby").await;
        for i in 0..7 {
            let author = if i % 2 == 0 { &alice.id } else { &bob.id };
            seed_post(&db, author, &format!("post {}", i)).await;
        }

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = list_feed(&db, &store, req(3, token.as_deref()), None)
                .await
                .unwrap();
            assert!(page.items.len() <= 3);
            seen.extend(page.items.into_iter().map(|p| p.content));
            match page.next_cursor {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        let expected: Vec<String> = (0..7).rev().map(|i| format!("post {}", i)).collect();
        assert_eq!(seen, expected);
    }

    #[actix_web::test]
    async fn exact_page_multiple_ends_without_cursor() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        for i in 0..4 {
            seed_post(&db, &alice.id, &format!("post {}", i)).await;
        }
        let first = list_feed(&db, &store, req(2, None), None).await.unwrap();
        let second = list_feed(&db, &store, req(2, first.next_cursor.as_deref()), None)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.next_cursor, None);
    }

    #[actix_web::test]
    async fn viewer_sees_own_reactions_only() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bobby").await;
        let p = seed_post(&db, &alice.id, "hello").await;
        let bob_like = graph::like_post(&db, &bob.id, &p.id).await.unwrap();
        graph::like_post(&db, &alice.id, &p.id).await.unwrap();
        let bob_rt = graph::retweet_post(&db, &bob.id, &p.id).await.unwrap();

        let as_bob = get_post(&db, &store, &p.id, Some(&bob.id)).await.unwrap();
        assert_eq!(as_bob.like_count, 2);
        assert_eq!(as_bob.retweet_count, 1);
        assert_eq!(as_bob.like_id, Some(bob_like.id));
        assert_eq!(as_bob.retweet_id, Some(bob_rt.id));

        let anonymous = get_post(&db, &store, &p.id, None).await.unwrap();
        assert_eq!(anonymous.like_count, 2);
        assert_eq!(anonymous.like_id, None);
        assert_eq!(anonymous.retweet_id, None);
    }

    #[actix_web::test]
    async fn missing_post_and_user_are_not_found() {
        let db = test_db().await;
        let store = FakeStore::default();
        assert!(matches!(
            get_post(&db, &store, "nope", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            list_user_posts(&db, &store, "ghost", req(10, None), None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            list_comments(&db, &store, "nope", req(10, None)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn user_without_posts_gets_empty_page() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        let page = list_user_posts(&db, &store, &alice.id, req(10, None), None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[actix_web::test]
    async fn comments_list_oldest_first() {
        let db = test_db().await;
        let store = FakeStore::default();
        let filter = ProfanityFilter::new(&[]).unwrap();
        let alice = seed_user(&db, "alice").await;
        let p = seed_post(&db, &alice.id, "hello").await;
        for text in ["first!", "second", "third"] {
            create_comment(
                &db,
                &filter,
                &alice.id,
                &p.id,
                CommentRequest {
                    content: text.to_string(),
                },
            )
            .await
            .unwrap();
        }
        let page = list_comments(&db, &store, &p.id, req(2, None)).await.unwrap();
        let texts: Vec<&str> = page.items.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["first!", "second"]);
        assert_eq!(page.items[0].author.username, "alice");

        let rest = list_comments(&db, &store, &p.id, req(2, page.next_cursor.as_deref()))
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0].content, "third");
        assert_eq!(rest.next_cursor, None);
    }

    #[actix_web::test]
    async fn images_are_signed_per_row() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        let plain = seed_post(&db, &alice.id, "no image").await;
        let mut with_image: post::ActiveModel = seed_post(&db, &alice.id, "image").await.into();
        with_image.img_file_name = Set(Some("pic.png".to_string()));
        with_image.updated_at = Set(Utc::now());
        with_image.update(&db).await.unwrap();

        let page = list_feed(&db, &store, req(10, None), None).await.unwrap();
        assert_eq!(contents(&page), vec!["image", "no image"]);
        assert_eq!(
            page.items[0].post_image_url.as_deref(),
            Some("https://signed.test/content-images/pic.png")
        );
        assert_eq!(page.items[1].id, plain.id);
        assert_eq!(page.items[1].post_image_url, None);
    }

    #[actix_web::test]
    async fn signing_failure_is_surfaced() {
        let db = test_db().await;
        let store = FakeStore::default();
        let alice = seed_user(&db, "alice").await;
        let mut broken: post::ActiveModel = seed_post(&db, &alice.id, "image").await.into();
        broken.img_file_name = Set(Some("broken.png".to_string()));
        broken.update(&db).await.unwrap();

        let err = list_feed(&db, &store, req(10, None), None).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[actix_web::test]
    async fn malformed_cursor_is_rejected() {
        let query = PageQuery {
            take: None,
            cursor: Some("!!".to_string()),
            user_id: None,
        };
        assert!(matches!(query.page(), Err(AppError::Validation(_))));
    }
}
