//! Accounts, profiles and the "can create events" permission.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::info;

use crate::auth::user::hash_password;
use crate::config::SuperuserSeed;
use crate::entities::{category, user, user_profile};
use crate::forms::{AccountInput, CategoryInput, ProfileInput, RegisterInput};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,

    #[error("a user with that username already exists")]
    UsernameTaken,

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error("failed to hash password: {0}")]
    PasswordHash(argon2::password_hash::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

async fn username_taken(
    db: &DatabaseConnection,
    username: &str,
    except: Option<i32>,
) -> Result<bool, DbErr> {
    let mut query = user::Entity::find().filter(user::Column::Username.eq(username));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

async fn insert_user(
    db: &DatabaseConnection,
    account: AccountInput,
    password: String,
    is_superuser: bool,
) -> Result<user::Model, UserError> {
    if username_taken(db, &account.username, None).await? {
        return Err(UserError::UsernameTaken);
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await?
        .map_err(UserError::PasswordHash)?;

    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;
    let user = user::ActiveModel {
        username: Set(account.username),
        first_name: Set(account.first_name),
        last_name: Set(account.last_name),
        email: Set(account.email),
        password_hash: Set(password_hash),
        is_superuser: Set(is_superuser),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    user_profile::ActiveModel {
        user_id: Set(user.id),
        can_create_events: Set(is_superuser),
        bio: Set(String::new()),
        phone: Set(String::new()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Creates a regular account together with its empty profile.
pub async fn register(db: &DatabaseConnection, input: RegisterInput) -> Result<user::Model, UserError> {
    insert_user(db, input.account, input.password, false).await
}

/// Creates the configured superuser unless an account with that name exists.
pub async fn ensure_superuser(db: &DatabaseConnection, seed: &SuperuserSeed) -> Result<(), UserError> {
    if username_taken(db, &seed.username, None).await? {
        return Ok(());
    }
    let account = AccountInput {
        username: seed.username.clone(),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
    };
    insert_user(db, account, seed.password.clone(), true).await?;
    Ok(())
}

/// Loads the profile, creating an empty one for accounts that predate it.
pub async fn profile_for(db: &DatabaseConnection, user_id: i32) -> Result<user_profile::Model, DbErr> {
    let existing = user_profile::Entity::find()
        .filter(user_profile::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    match existing {
        Some(profile) => Ok(profile),
        None => {
            user_profile::ActiveModel {
                user_id: Set(user_id),
                can_create_events: Set(false),
                bio: Set(String::new()),
                phone: Set(String::new()),
                ..Default::default()
            }
            .insert(db)
            .await
        }
    }
}

pub async fn update_profile(
    db: &DatabaseConnection,
    user: &user::Model,
    input: ProfileInput,
) -> Result<user::Model, UserError> {
    if username_taken(db, &input.account.username, Some(user.id)).await? {
        return Err(UserError::UsernameTaken);
    }
    let profile = profile_for(db, user.id).await?;

    let txn = db.begin().await?;
    let mut active = user.clone().into_active_model();
    active.username = Set(input.account.username);
    active.first_name = Set(input.account.first_name);
    active.last_name = Set(input.account.last_name);
    active.email = Set(input.account.email);
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&txn).await?;

    let mut profile = profile.into_active_model();
    profile.bio = Set(input.bio);
    profile.phone = Set(input.phone);
    profile.update(&txn).await?;
    txn.commit().await?;

    Ok(updated)
}

pub async fn find_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model, UserError> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(UserError::NotFound)
}

#[derive(Debug, Serialize)]
pub struct ManagedUser {
    #[serde(flatten)]
    pub user: user::Model,
    pub can_create_events: bool,
}

/// Every account, newest first, with its stored permission flag. Superusers
/// are marked by `is_superuser` on the flattened user, not folded into the flag.
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<ManagedUser>, DbErr> {
    let users = user::Entity::find()
        .find_also_related(user_profile::Entity)
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .all(db)
        .await?;
    Ok(users
        .into_iter()
        .map(|(user, profile)| ManagedUser {
            can_create_events: profile.is_some_and(|p| p.can_create_events),
            user,
        })
        .collect())
}

pub async fn set_event_permission(
    db: &DatabaseConnection,
    user_id: i32,
    allowed: bool,
) -> Result<user_profile::Model, UserError> {
    find_user(db, user_id).await?;
    let mut profile = profile_for(db, user_id).await?.into_active_model();
    profile.can_create_events = Set(allowed);
    let profile = profile.update(db).await?;
    info!(user_id, allowed, "event permission changed");
    Ok(profile)
}

/// Flips the flag and returns the user with the new value.
pub async fn toggle_event_permission(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<(user::Model, bool), UserError> {
    let user = find_user(db, user_id).await?;
    let current = profile_for(db, user_id).await?.can_create_events;
    let profile = set_event_permission(db, user_id, !current).await?;
    Ok((user, profile.can_create_events))
}

pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<category::Model>, DbErr> {
    category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
}

pub async fn create_category(db: &DatabaseConnection, input: CategoryInput) -> Result<category::Model, DbErr> {
    category::ActiveModel {
        name: Set(input.name),
        color: Set(input.color),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Events of a deleted category keep existing without one.
pub async fn delete_category(db: &DatabaseConnection, category_id: i32) -> Result<bool, DbErr> {
    let result = category::Entity::delete_by_id(category_id).exec(db).await?;
    Ok(result.rows_affected > 0)
}
