use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    JoinType, ModelTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Serialize;
use tracing::info;

use super::{participation, storage::AttachmentStore};
use crate::entities::{
    category, comment, event, event::AvailableSpots, event_attachment, participation as part,
    user,
};
use crate::forms::EventInput;
use crate::permissions;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event not found")]
    NotFound,

    #[error("attachment not found")]
    AttachmentNotFound,

    #[error("only the organizer may change event {event_id}")]
    NotOrganizer { event_id: i32 },

    #[error("user may not create events")]
    CannotCreate,

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Storage(#[from] std::io::Error),
}

pub async fn find_event(db: &DatabaseConnection, event_id: i32) -> Result<event::Model, EventError> {
    event::Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or(EventError::NotFound)
}

async fn find_owned_event(
    db: &DatabaseConnection,
    actor: &user::Model,
    event_id: i32,
) -> Result<event::Model, EventError> {
    let event = find_event(db, event_id).await?;
    if !permissions::is_organizer(actor, &event) {
        return Err(EventError::NotOrganizer { event_id });
    }
    Ok(event)
}

pub async fn category_ids(db: &DatabaseConnection) -> Result<Vec<i32>, DbErr> {
    category::Entity::find()
        .select_only()
        .column(category::Column::Id)
        .into_tuple()
        .all(db)
        .await
}

pub async fn create_event(
    db: &DatabaseConnection,
    actor: &user::Model,
    input: EventInput,
) -> Result<event::Model, EventError> {
    if !permissions::can_create_events(db, actor).await? {
        return Err(EventError::CannotCreate);
    }

    let now = Utc::now().naive_utc();
    let event = event::ActiveModel {
        title: Set(input.title),
        short_description: Set(input.short_description),
        description: Set(input.description),
        location: Set(input.location),
        start_date: Set(input.start_date),
        end_date: Set(input.end_date),
        category_id: Set(input.category_id),
        organizer_id: Set(actor.id),
        max_participants: Set(input.max_participants),
        status: Set(input.status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(event_id = event.id, organizer_id = actor.id, "event created");
    Ok(event)
}

/// Applies the form fields. The organizer never changes.
pub async fn update_event(
    db: &DatabaseConnection,
    actor: &user::Model,
    event_id: i32,
    input: EventInput,
) -> Result<event::Model, EventError> {
    let event = find_owned_event(db, actor, event_id).await?;

    let mut active = event.into_active_model();
    active.title = Set(input.title);
    active.short_description = Set(input.short_description);
    active.description = Set(input.description);
    active.location = Set(input.location);
    active.start_date = Set(input.start_date);
    active.end_date = Set(input.end_date);
    active.category_id = Set(input.category_id);
    active.max_participants = Set(input.max_participants);
    active.status = Set(input.status);
    active.updated_at = Set(Utc::now().naive_utc());
    let event = active.update(db).await?;

    info!(event_id, "event updated");
    Ok(event)
}

/// Deletes the event; participations, comments and attachment rows cascade,
/// and the attachment files are removed from storage afterwards.
pub async fn delete_event(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    actor: &user::Model,
    event_id: i32,
) -> Result<event::Model, EventError> {
    let event = find_owned_event(db, actor, event_id).await?;
    let attachments = event
        .find_related(event_attachment::Entity)
        .all(db)
        .await?;

    event.clone().delete(db).await?;
    for attachment in attachments {
        store.delete(&attachment.file).await;
    }

    info!(event_id, "event deleted");
    Ok(event)
}

pub async fn add_attachment(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    actor: &user::Model,
    event_id: i32,
    name: &str,
    file_name: &str,
    contents: &[u8],
) -> Result<event_attachment::Model, EventError> {
    let event = find_owned_event(db, actor, event_id).await?;

    let now = Utc::now().naive_utc();
    let stored = store.save(file_name, contents, now.date()).await?;
    let attachment = event_attachment::ActiveModel {
        event_id: Set(event.id),
        file: Set(stored.clone()),
        name: Set(name.trim().to_string()),
        uploaded_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match attachment {
        Ok(attachment) => {
            info!(event_id, attachment_id = attachment.id, "attachment added");
            Ok(attachment)
        }
        Err(err) => {
            // No record points at the file, so it must not outlive the failure.
            store.delete(&stored).await;
            Err(err.into())
        }
    }
}

/// Removes the record and then its file. Returns the owning event id.
pub async fn delete_attachment(
    db: &DatabaseConnection,
    store: &AttachmentStore,
    actor: &user::Model,
    attachment_id: i32,
) -> Result<i32, EventError> {
    let attachment = event_attachment::Entity::find_by_id(attachment_id)
        .one(db)
        .await?
        .ok_or(EventError::AttachmentNotFound)?;
    let event_id = attachment.event_id;
    find_owned_event(db, actor, event_id).await?;

    let file = attachment.file.clone();
    attachment.delete(db).await?;
    store.delete(&file).await;

    info!(event_id, attachment_id, "attachment deleted");
    Ok(event_id)
}

pub async fn add_comment(
    db: &DatabaseConnection,
    author: &user::Model,
    event_id: i32,
    content: String,
) -> Result<comment::Model, EventError> {
    let event = find_event(db, event_id).await?;
    let now = Utc::now().naive_utc();
    let comment = comment::ActiveModel {
        event_id: Set(event.id),
        author_id: Set(author.id),
        content: Set(content),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(comment)
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub author: Option<user::Model>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub event: event::Model,
    pub category: Option<category::Model>,
    pub organizer: Option<user::Model>,
    /// Full name, or the username when no name was given.
    pub organizer_name: Option<String>,
    pub participants_count: u64,
    pub available_spots: AvailableSpots,
    pub is_upcoming: bool,
    pub is_participating: bool,
    pub is_organizer: bool,
    pub attachments: Vec<event_attachment::Model>,
    pub comments: Vec<CommentView>,
}

pub async fn event_detail(
    db: &DatabaseConnection,
    event_id: i32,
    viewer: Option<&user::Model>,
) -> Result<EventDetail, EventError> {
    let (event, organizer) = event::Entity::find_by_id(event_id)
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or(EventError::NotFound)?;

    let category = match event.category_id {
        Some(id) => category::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let participants_count = participation::count_participants(db, event.id).await?;
    let is_participating = match viewer {
        Some(user) => participation::is_participating(db, user.id, event.id).await?,
        None => false,
    };
    let attachments = event
        .find_related(event_attachment::Entity)
        .order_by_desc(event_attachment::Column::UploadedAt)
        .all(db)
        .await?;
    let comments = event
        .find_related(comment::Entity)
        .find_also_related(user::Entity)
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_desc(comment::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|(comment, author)| CommentView { comment, author })
        .collect();

    let organizer_name = organizer.as_ref().map(|o| match o.full_name() {
        name if name.is_empty() => o.username.clone(),
        name => name,
    });

    Ok(EventDetail {
        organizer_name,
        available_spots: event.available_spots(participants_count),
        is_upcoming: event.is_upcoming(),
        is_organizer: viewer.is_some_and(|u| permissions::is_organizer(u, &event)),
        event,
        category,
        organizer,
        participants_count,
        is_participating,
        attachments,
        comments,
    })
}

#[derive(Debug, Serialize)]
pub struct MyEvents {
    pub organized_events: Vec<event::Model>,
    pub participating_events: Vec<event::Model>,
}

pub async fn my_events(db: &DatabaseConnection, user: &user::Model) -> Result<MyEvents, DbErr> {
    let organized_events = event::Entity::find()
        .filter(event::Column::OrganizerId.eq(user.id))
        .order_by_desc(event::Column::StartDate)
        .all(db)
        .await?;
    let participating_events = event::Entity::find()
        .join(JoinType::InnerJoin, event::Relation::Participation.def())
        .filter(part::Column::UserId.eq(user.id))
        .order_by_desc(event::Column::StartDate)
        .all(db)
        .await?;

    Ok(MyEvents {
        organized_events,
        participating_events,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::database::testing::{
        EventSeed, create_event as seed_event, create_user, days_from_now, setup_test_db,
    };
    use crate::entities::event::EventStatus;
    use crate::users::set_event_permission;

    fn input(title: &str) -> EventInput {
        let start = days_from_now(3);
        EventInput {
            title: title.into(),
            short_description: "short".into(),
            description: "long".into(),
            location: "Hall".into(),
            start_date: start,
            end_date: start + TimeDelta::hours(1),
            category_id: None,
            max_participants: 0,
            status: EventStatus::Published,
        }
    }

    #[tokio::test]
    async fn create_requires_permission() {
        let db = setup_test_db().await;
        let bob = create_user(&db, "bob", false).await;

        let denied = create_event(&db, &bob, input("Nope")).await;
        assert!(matches!(denied, Err(EventError::CannotCreate)));

        set_event_permission(&db, bob.id, true).await.unwrap();
        let event = create_event(&db, &bob, input("Yes")).await.unwrap();
        assert_eq!(event.organizer_id, bob.id);
        assert_eq!(event.title, "Yes");
    }

    #[tokio::test]
    async fn non_organizer_cannot_update_or_delete() {
        let db = setup_test_db().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());
        let alice = create_user(&db, "alice", false).await;
        let mallory = create_user(&db, "mallory", true).await;
        let event = seed_event(
            &db,
            &alice,
            EventSeed {
                title: "Original",
                ..Default::default()
            },
        )
        .await;

        let update = update_event(&db, &mallory, event.id, input("Hijacked")).await;
        assert!(matches!(update, Err(EventError::NotOrganizer { event_id }) if event_id == event.id));

        let delete = delete_event(&db, &store, &mallory, event.id).await;
        assert!(matches!(delete, Err(EventError::NotOrganizer { .. })));

        let attach = add_attachment(&db, &store, &mallory, event.id, "x", "x.txt", b"x").await;
        assert!(matches!(attach, Err(EventError::NotOrganizer { .. })));

        let unchanged = find_event(&db, event.id).await.unwrap();
        assert_eq!(unchanged, event);
        assert!(!tmp.path().join("event_attachments").exists());
    }

    #[tokio::test]
    async fn organizer_updates_but_keeps_ownership() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let event = seed_event(&db, &alice, EventSeed::default()).await;

        let updated = update_event(&db, &alice, event.id, input("Renamed")).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.organizer_id, alice.id);
        assert_eq!(updated.created_at, event.created_at);
    }

    #[tokio::test]
    async fn attachment_lifecycle_cleans_up_files() {
        let db = setup_test_db().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let event = seed_event(&db, &alice, EventSeed::default()).await;

        let attachment = add_attachment(&db, &store, &alice, event.id, " Agenda ", "agenda.pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(attachment.name, "Agenda");
        let path = tmp.path().join(&attachment.file);
        assert!(path.is_file());

        let denied = delete_attachment(&db, &store, &bob, attachment.id).await;
        assert!(matches!(denied, Err(EventError::NotOrganizer { event_id }) if event_id == event.id));
        assert!(path.is_file());

        let owner = delete_attachment(&db, &store, &alice, attachment.id).await.unwrap();
        assert_eq!(owner, event.id);
        assert!(!path.exists());
        assert!(!tmp.path().join("event_attachments").exists());
        assert_eq!(event_attachment::Entity::find().count(&db).await.unwrap(), 0);

        let missing = delete_attachment(&db, &store, &alice, attachment.id).await;
        assert!(matches!(missing, Err(EventError::AttachmentNotFound)));
    }

    #[tokio::test]
    async fn deleting_event_removes_attachment_files() {
        let db = setup_test_db().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(tmp.path());
        let alice = create_user(&db, "alice", false).await;
        let event = seed_event(&db, &alice, EventSeed::default()).await;
        let attachment = add_attachment(&db, &store, &alice, event.id, "Map", "map.png", b"png")
            .await
            .unwrap();
        participation::toggle(&db, alice.id, event.id).await.unwrap();

        delete_event(&db, &store, &alice, event.id).await.unwrap();

        assert!(matches!(find_event(&db, event.id).await, Err(EventError::NotFound)));
        assert!(!tmp.path().join(&attachment.file).exists());
        assert_eq!(part::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn detail_lists_comments_newest_first() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let event = seed_event(
            &db,
            &alice,
            EventSeed {
                max_participants: 3,
                ..Default::default()
            },
        )
        .await;

        add_comment(&db, &alice, event.id, "first".into()).await.unwrap();
        add_comment(&db, &bob, event.id, "second".into()).await.unwrap();
        participation::toggle(&db, bob.id, event.id).await.unwrap();

        let detail = event_detail(&db, event.id, Some(&bob)).await.unwrap();
        let contents: Vec<&str> = detail
            .comments
            .iter()
            .map(|c| c.comment.content.as_str())
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert_eq!(detail.comments[0].author.as_ref().map(|a| a.id), Some(bob.id));
        assert_eq!(detail.organizer.map(|o| o.id), Some(alice.id));
        assert_eq!(detail.organizer_name.as_deref(), Some("Test alice"));
        assert!(detail.is_participating);
        assert!(!detail.is_organizer);
        assert_eq!(detail.participants_count, 1);
        assert_eq!(detail.available_spots, AvailableSpots::Remaining(2));

        let missing = event_detail(&db, event.id + 100, None).await;
        assert!(matches!(missing, Err(EventError::NotFound)));
    }

    #[tokio::test]
    async fn my_events_splits_organized_and_participating() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let own = seed_event(
            &db,
            &bob,
            EventSeed {
                title: "Bob's",
                ..Default::default()
            },
        )
        .await;
        let joined = seed_event(
            &db,
            &alice,
            EventSeed {
                title: "Alice's",
                status: EventStatus::Draft,
                ..Default::default()
            },
        )
        .await;
        participation::toggle(&db, bob.id, joined.id).await.unwrap();

        let mine = my_events(&db, &bob).await.unwrap();
        assert_eq!(mine.organized_events, vec![own]);
        assert_eq!(mine.participating_events, vec![joined]);
    }
}
