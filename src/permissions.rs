use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};

use crate::entities::{event, user, user_profile};

/// Only the organizer may change an event or its attachments.
pub fn is_organizer(user: &user::Model, event: &event::Model) -> bool {
    user.id == event.organizer_id
}

pub fn is_superuser(user: Option<&user::Model>) -> bool {
    user.is_some_and(|u| u.is_superuser)
}

/// Superusers always may create events, everyone else needs the profile flag.
pub async fn can_create_events<C: ConnectionTrait>(db: &C, user: &user::Model) -> Result<bool, DbErr> {
    if user.is_superuser {
        return Ok(true);
    }
    let profile = user_profile::Entity::find()
        .filter(user_profile::Column::UserId.eq(user.id))
        .one(db)
        .await?;
    Ok(profile.is_some_and(|p| p.can_create_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{EventSeed, create_event, create_user, setup_test_db};
    use crate::users::set_event_permission;

    #[tokio::test]
    async fn organizer_check_uses_owner_id() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let event = create_event(&db, &alice, EventSeed::default()).await;

        assert!(is_organizer(&alice, &event));
        assert!(!is_organizer(&bob, &event));
    }

    #[tokio::test]
    async fn create_permission_follows_profile_flag() {
        let db = setup_test_db().await;
        let root = create_user(&db, "root", true).await;
        let bob = create_user(&db, "bob", false).await;

        assert!(can_create_events(&db, &root).await.unwrap());
        assert!(!can_create_events(&db, &bob).await.unwrap());

        set_event_permission(&db, bob.id, true).await.unwrap();
        assert!(can_create_events(&db, &bob).await.unwrap());

        assert!(is_superuser(Some(&root)));
        assert!(!is_superuser(Some(&bob)));
        assert!(!is_superuser(None));
    }
}
