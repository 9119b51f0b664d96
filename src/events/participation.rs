use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, Set, SqlErr,
};
use tracing::debug;

use crate::entities::participation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Joined,
    Left,
}

impl Toggle {
    pub fn message(&self) -> &'static str {
        match self {
            Toggle::Joined => "You are registered for this event!",
            Toggle::Left => "You have left this event.",
        }
    }
}

pub async fn is_participating<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    event_id: i32,
) -> Result<bool, DbErr> {
    let count = participation::Entity::find()
        .filter(participation::Column::UserId.eq(user_id))
        .filter(participation::Column::EventId.eq(event_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn count_participants<C: ConnectionTrait>(db: &C, event_id: i32) -> Result<u64, DbErr> {
    participation::Entity::find()
        .filter(participation::Column::EventId.eq(event_id))
        .count(db)
        .await
}

/// Registers the user when they are not yet participating, otherwise removes
/// the registration.
pub async fn toggle<C: ConnectionTrait>(db: &C, user_id: i32, event_id: i32) -> Result<Toggle, DbErr> {
    let existing = participation::Entity::find()
        .filter(participation::Column::UserId.eq(user_id))
        .filter(participation::Column::EventId.eq(event_id))
        .one(db)
        .await?;

    if let Some(existing) = existing {
        existing.delete(db).await?;
        debug!(user_id, event_id, "participation removed");
        return Ok(Toggle::Left);
    }

    join(db, user_id, event_id).await
}

/// Registers the user. A registration that already exists, for instance one
/// inserted by a concurrent request, still counts as joined.
pub async fn join<C: ConnectionTrait>(db: &C, user_id: i32, event_id: i32) -> Result<Toggle, DbErr> {
    let joined = participation::ActiveModel {
        user_id: Set(user_id),
        event_id: Set(event_id),
        registered_at: Set(Utc::now().naive_utc()),
        notes: Set(String::new()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match joined {
        Ok(_) => {
            debug!(user_id, event_id, "participation created");
            Ok(Toggle::Joined)
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            debug!(user_id, event_id, "participation already present");
            Ok(Toggle::Joined)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{EventSeed, create_event, create_user, setup_test_db};

    #[tokio::test]
    async fn toggling_twice_unregisters() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let event = create_event(&db, &alice, EventSeed::default()).await;

        assert!(!is_participating(&db, bob.id, event.id).await.unwrap());

        assert_eq!(toggle(&db, bob.id, event.id).await.unwrap(), Toggle::Joined);
        assert!(is_participating(&db, bob.id, event.id).await.unwrap());
        assert_eq!(count_participants(&db, event.id).await.unwrap(), 1);

        assert_eq!(toggle(&db, bob.id, event.id).await.unwrap(), Toggle::Left);
        assert!(!is_participating(&db, bob.id, event.id).await.unwrap());
        assert_eq!(count_participants(&db, event.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn registrations_are_per_user() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let event = create_event(&db, &alice, EventSeed::default()).await;

        toggle(&db, alice.id, event.id).await.unwrap();
        toggle(&db, bob.id, event.id).await.unwrap();
        toggle(&db, alice.id, event.id).await.unwrap();

        assert!(!is_participating(&db, alice.id, event.id).await.unwrap());
        assert!(is_participating(&db, bob.id, event.id).await.unwrap());
        assert_eq!(count_participants(&db, event.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn joining_twice_keeps_one_registration() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let event = create_event(&db, &alice, EventSeed::default()).await;

        assert_eq!(join(&db, bob.id, event.id).await.unwrap(), Toggle::Joined);
        assert_eq!(join(&db, bob.id, event.id).await.unwrap(), Toggle::Joined);

        assert_eq!(count_participants(&db, event.id).await.unwrap(), 1);
        assert!(is_participating(&db, bob.id, event.id).await.unwrap());
    }

    #[tokio::test]
    async fn store_rejects_duplicate_pairs() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let event = create_event(&db, &alice, EventSeed::default()).await;
        toggle(&db, alice.id, event.id).await.unwrap();

        let duplicate = participation::ActiveModel {
            user_id: Set(alice.id),
            event_id: Set(event.id),
            registered_at: Set(Utc::now().naive_utc()),
            notes: Set(String::new()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();
        assert!(matches!(
            duplicate.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        ));
    }
}
