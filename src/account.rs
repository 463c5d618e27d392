use actix_web::web;
use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use log::{error, info};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::user;
use crate::error::AppError;
use crate::storage::{self, ImageKind, ObjectStore};
use crate::validate::{self, BIO_MAX, NAME_LEN, USERNAME_LEN};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate::length("First name", &self.first_name, NAME_LEN)?;
        validate::length("Last name", &self.last_name, NAME_LEN)?;
        validate::length("Username", &self.username, USERNAME_LEN)?;
        if self.username.trim() != self.username {
            return Err(AppError::param_error(
                "Username cannot start or end with whitespace",
            ));
        }
        validate::password(&self.password)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate::required("Username", &self.username)?;
        validate::required("Password", &self.password)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.first_name.is_none() && self.last_name.is_none() && self.bio.is_none() {
            return Err(AppError::param_error(
                "At least one of First Name, Last Name or Bio must be provided",
            ));
        }
        if let Some(v) = &self.first_name {
            validate::length("First name", v, NAME_LEN)?;
        }
        if let Some(v) = &self.last_name {
            validate::length("Last name", v, NAME_LEN)?;
        }
        if let Some(v) = &self.bio {
            validate::length("Bio", v, (0, BIO_MAX))?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInUser {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    web::block(move || hash(password, cost))
        .await
        .map_err(|e| {
            error!("password hashing task failed: {}", e);
            AppError::system_exception()
        })?
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            AppError::system_exception()
        })
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    web::block(move || verify(password, &password_hash))
        .await
        .map_err(|e| {
            error!("password verify task failed: {}", e);
            AppError::system_exception()
        })?
        .map_err(|e| {
            error!("stored password hash unreadable: {}", e);
            AppError::system_exception()
        })
}

pub async fn register(
    db: &DatabaseConnection,
    bcrypt_cost: u32,
    req: RegisterRequest,
) -> Result<RegisteredUser, AppError> {
    req.validate()?;
    let password_hash = hash_password(req.password, bcrypt_cost).await?;
    let now = Utc::now();
    let model = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(req.username),
        first_name: Set(req.first_name.trim().to_string()),
        last_name: Set(req.last_name.trim().to_string()),
        password_hash: Set(password_hash),
        avatar_file_name: Set(None),
        bio: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| AppError::from_insert(e, "Username already taken"))?;

    info!("registered user {}", model.username);
    Ok(RegisteredUser {
        id: model.id,
        first_name: model.first_name,
        last_name: model.last_name,
        username: model.username,
        created_at: model.created_at,
    })
}

/// Unknown username and wrong password fail identically. An unknown username
/// still pays one bcrypt round at `bcrypt_cost`.
pub async fn authenticate(
    db: &DatabaseConnection,
    bcrypt_cost: u32,
    req: LoginRequest,
) -> Result<LoggedInUser, AppError> {
    req.validate()?;
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(req.username.as_str()))
        .one(db)
        .await?;
    let Some(found) = found else {
        hash_password(req.password, bcrypt_cost).await?;
        return Err(AppError::invalid_credentials());
    };
    if !verify_password(req.password, found.password_hash.clone()).await? {
        return Err(AppError::invalid_credentials());
    }
    Ok(LoggedInUser {
        id: found.id,
        username: found.username,
        first_name: found.first_name,
        last_name: found.last_name,
    })
}

pub async fn get_profile(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    user_id: &str,
) -> Result<ProfileDto, AppError> {
    let found = user::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))?;
    let avatar_url =
        storage::signed_url(store, ImageKind::Avatar, found.avatar_file_name.as_deref()).await?;
    Ok(ProfileDto {
        id: found.id,
        username: found.username,
        first_name: found.first_name,
        last_name: found.last_name,
        bio: found.bio,
        avatar_url,
        created_at: found.created_at,
    })
}

pub async fn update_profile(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    user_id: &str,
    req: UpdateProfileRequest,
) -> Result<ProfileDto, AppError> {
    req.validate()?;
    let mut active = user::ActiveModel {
        id: Set(user_id.to_string()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    if let Some(v) = req.first_name {
        active.first_name = Set(v.trim().to_string());
    }
    if let Some(v) = req.last_name {
        active.last_name = Set(v.trim().to_string());
    }
    if let Some(v) = req.bio {
        let v = v.trim().to_string();
        active.bio = Set(if v.is_empty() { None } else { Some(v) });
    }
    active.update(db).await.map_err(|e| match AppError::from(e) {
        AppError::NotFound(_) => AppError::not_found("User does not exist"),
        other => other,
    })?;
    get_profile(db, store, user_id).await
}

/// Returns the new avatar file name.
pub async fn update_avatar(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    user_id: &str,
    image: Vec<u8>,
) -> Result<String, AppError> {
    let exists = user::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .is_some();
    if !exists {
        return Err(AppError::not_found("User does not exist"));
    }
    let file_name = storage::upload_image(store, ImageKind::Avatar, image).await?;
    user::ActiveModel {
        id: Set(user_id.to_string()),
        avatar_file_name: Set(Some(file_name.clone())),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .update(db)
    .await?;
    Ok(file_name)
}
