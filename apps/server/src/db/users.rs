//! Database operations for users and their shop membership.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::user;
use crate::error::AppResult;
use crate::models::User;

/// Find a user by (normalized) email.
pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<Option<User>> {
    let result = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?;

    Ok(result.map(model_to_user))
}

/// Find a user by identity provider id.
pub async fn find_by_clerk_id<C: ConnectionTrait>(
    db: &C,
    clerk_id: &str,
) -> AppResult<Option<User>> {
    let result = user::Entity::find()
        .filter(user::Column::ClerkId.eq(clerk_id))
        .one(db)
        .await?;

    Ok(result.map(model_to_user))
}

/// Insert a new user without shop membership.
pub async fn insert<C: ConnectionTrait>(
    db: &C,
    clerk_id: &str,
    email: &str,
    name: Option<&str>,
) -> AppResult<User> {
    let now = Utc::now();

    let model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        clerk_id: Set(clerk_id.to_string()),
        email: Set(email.to_string()),
        name: Set(name.map(|s| s.to_string())),
        shop_id: Set(None),
        role: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = model.insert(db).await?;
    Ok(model_to_user(inserted))
}

/// Overwrite identity and profile fields of an existing user.
pub async fn update_profile<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    clerk_id: &str,
    email: &str,
    name: Option<&str>,
) -> AppResult<User> {
    let active = user::ActiveModel {
        id: Unchanged(id),
        clerk_id: Set(clerk_id.to_string()),
        email: Set(email.to_string()),
        name: Set(name.map(|s| s.to_string())),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    let updated = active.update(db).await?;
    Ok(model_to_user(updated))
}

/// Set or clear the shop membership of a user.
pub async fn set_membership<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    shop_id: Option<&str>,
    role: Option<&str>,
) -> AppResult<User> {
    let active = user::ActiveModel {
        id: Unchanged(id),
        shop_id: Set(shop_id.map(|s| s.to_string())),
        role: Set(role.map(|s| s.to_string())),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    let updated = active.update(db).await?;
    Ok(model_to_user(updated))
}

/// Delete a user by identity provider id. Returns the number of rows removed.
pub async fn delete_by_clerk_id<C: ConnectionTrait>(db: &C, clerk_id: &str) -> AppResult<u64> {
    let result = user::Entity::delete_many()
        .filter(user::Column::ClerkId.eq(clerk_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Clear shop and role on every user pointing at a shop.
pub async fn clear_shop_memberships<C: ConnectionTrait>(db: &C, shop_id: &str) -> AppResult<u64> {
    let result = user::Entity::update_many()
        .col_expr(user::Column::ShopId, Expr::value(Option::<String>::None))
        .col_expr(user::Column::Role, Expr::value(Option::<String>::None))
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// List all users.
pub async fn list_all<C: ConnectionTrait>(db: &C) -> AppResult<Vec<User>> {
    let results = user::Entity::find()
        .order_by_asc(user::Column::Email)
        .all(db)
        .await?;

    Ok(results.into_iter().map(model_to_user).collect())
}

fn model_to_user(m: user::Model) -> User {
    User {
        id: m.id,
        clerk_id: m.clerk_id,
        email: m.email,
        name: m.name,
        shop_id: m.shop_id,
        role: m.role,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}
