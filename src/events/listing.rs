use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use crate::entities::{
    category, event,
    event::{AvailableSpots, EventStatus},
    participation,
};

pub const PAGE_SIZE: u64 = 9;

const PARTICIPANTS_COUNT: &str = "participants_count";

/// Raw query string of the public event list.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    StartDate,
    EndDate,
    CreatedAt,
    ParticipantsCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::StartDate,
            descending: true,
        }
    }
}

impl Sort {
    /// Parses `field` or `-field`. Anything outside the allow-list falls back
    /// to newest start date first.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let descending = raw.starts_with('-');
        let field = match raw.trim_start_matches('-') {
            "title" => SortField::Title,
            "start_date" => SortField::StartDate,
            "end_date" => SortField::EndDate,
            "created_at" => SortField::CreatedAt,
            "participants_count" => SortField::ParticipantsCount,
            _ => return Self::default(),
        };
        Self { field, descending }
    }

    pub fn as_param(&self) -> String {
        let name = match self.field {
            SortField::Title => "title",
            SortField::StartDate => "start_date",
            SortField::EndDate => "end_date",
            SortField::CreatedAt => "created_at",
            SortField::ParticipantsCount => PARTICIPANTS_COUNT,
        };
        if self.descending {
            format!("-{name}")
        } else {
            name.to_string()
        }
    }

    fn order(&self) -> Order {
        if self.descending { Order::Desc } else { Order::Asc }
    }
}

/// Validated form of [`ListParams`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub category_id: Option<i32>,
    pub search: Option<String>,
    pub sort: Sort,
    pub page: u64,
}

impl From<&ListParams> for ListQuery {
    fn from(params: &ListParams) -> Self {
        let category_id = params
            .category
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok());
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let page = params
            .page
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(1)
            .max(1);

        Self {
            category_id,
            search,
            sort: Sort::parse(params.sort.as_deref()),
            page,
        }
    }
}

/// An event row annotated with its participant count and category label.
#[derive(Debug, Clone, FromQueryResult)]
pub struct EventRow {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub location: String,
    pub start_date: chrono::NaiveDateTime,
    pub end_date: chrono::NaiveDateTime,
    pub category_id: Option<i32>,
    pub organizer_id: i32,
    pub max_participants: i32,
    pub status: EventStatus,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub participants_count: i64,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventCard {
    #[serde(flatten)]
    pub event: event::Model,
    pub participants_count: i64,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub available_spots: AvailableSpots,
    pub is_upcoming: bool,
}

impl From<EventRow> for EventCard {
    fn from(row: EventRow) -> Self {
        let event = event::Model {
            id: row.id,
            title: row.title,
            description: row.description,
            short_description: row.short_description,
            location: row.location,
            start_date: row.start_date,
            end_date: row.end_date,
            category_id: row.category_id,
            organizer_id: row.organizer_id,
            max_participants: row.max_participants,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        let registered = row.participants_count.max(0) as u64;
        Self {
            available_spots: event.available_spots(registered),
            is_upcoming: event.is_upcoming(),
            event,
            participants_count: row.participants_count,
            category_name: row.category_name,
            category_color: row.category_color,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub events: Vec<EventCard>,
    pub page: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_pattern(search: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    LikeExpr::new(escaped).escape('\\')
}

fn icontains(column: event::Column, search: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col((event::Entity, column)))).like(like_pattern(search))
}

pub fn published_events(query: &ListQuery) -> sea_orm::Select<event::Entity> {
    let mut select = event::Entity::find()
        .filter(event::Column::Status.eq(EventStatus::Published))
        .column_as(
            SimpleExpr::from(Func::count_distinct(Expr::col((
                participation::Entity,
                participation::Column::UserId,
            )))),
            PARTICIPANTS_COUNT,
        )
        .column_as(category::Column::Name, "category_name")
        .column_as(category::Column::Color, "category_color")
        .join(JoinType::LeftJoin, event::Relation::Participation.def())
        .join(JoinType::LeftJoin, event::Relation::Category.def())
        .group_by(event::Column::Id)
        .group_by(category::Column::Id);

    if let Some(category_id) = query.category_id {
        select = select.filter(event::Column::CategoryId.eq(category_id));
    }

    if let Some(search) = &query.search {
        select = select.filter(
            Condition::any()
                .add(icontains(event::Column::Title, search))
                .add(icontains(event::Column::Description, search))
                .add(icontains(event::Column::Location, search)),
        );
    }

    let order = query.sort.order();
    select = match query.sort.field {
        SortField::Title => select.order_by(event::Column::Title, order),
        SortField::StartDate => select.order_by(event::Column::StartDate, order),
        SortField::EndDate => select.order_by(event::Column::EndDate, order),
        SortField::CreatedAt => select.order_by(event::Column::CreatedAt, order),
        SortField::ParticipantsCount => {
            select.order_by(SimpleExpr::from(Expr::col(Alias::new(PARTICIPANTS_COUNT))), order)
        }
    };

    // Stable pages when the sort key ties.
    select.order_by(event::Column::Id, Order::Asc)
}

pub async fn list_published(db: &DatabaseConnection, query: &ListQuery) -> Result<EventPage, DbErr> {
    let paginator = published_events(query)
        .into_model::<EventRow>()
        .paginate(db, PAGE_SIZE);

    let total = paginator.num_items().await?;
    let num_pages = total.div_ceil(PAGE_SIZE).max(1);
    let page = query.page.clamp(1, num_pages);
    let events = paginator
        .fetch_page(page - 1)
        .await?
        .into_iter()
        .map(EventCard::from)
        .collect();

    Ok(EventPage {
        events,
        page,
        num_pages,
        total,
        has_previous: page > 1,
        has_next: page < num_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::{
        EventSeed, create_category, create_event, create_user, setup_test_db,
    };
    use crate::events::participation::toggle;

    fn titles(page: &EventPage) -> Vec<&str> {
        page.events.iter().map(|c| c.event.title.as_str()).collect()
    }

    fn query(params: ListParams) -> ListQuery {
        ListQuery::from(&params)
    }

    #[test]
    fn unknown_sort_falls_back_to_newest_start() {
        assert_eq!(Sort::parse(Some("password")), Sort::default());
        assert_eq!(Sort::parse(Some("-organizer_id")), Sort::default());
        assert_eq!(Sort::parse(Some("")), Sort::default());
        assert_eq!(Sort::parse(None).as_param(), "-start_date");
    }

    #[test]
    fn sort_keeps_direction() {
        let sort = Sort::parse(Some("-participants_count"));
        assert_eq!(sort.field, SortField::ParticipantsCount);
        assert!(sort.descending);
        assert_eq!(sort.as_param(), "-participants_count");

        let sort = Sort::parse(Some("title"));
        assert_eq!(sort.field, SortField::Title);
        assert!(!sort.descending);
    }

    #[test]
    fn params_ignore_blank_and_garbage() {
        let q = query(ListParams {
            category: Some("abc".into()),
            search: Some("   ".into()),
            sort: None,
            page: Some("-3".into()),
        });
        assert_eq!(q.category_id, None);
        assert_eq!(q.search, None);
        assert_eq!(q.page, 1);
    }

    #[tokio::test]
    async fn only_published_events_are_listed() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        for (title, status) in [
            ("Open day", EventStatus::Published),
            ("Secret draft", EventStatus::Draft),
            ("Called off", EventStatus::Cancelled),
        ] {
            create_event(
                &db,
                &alice,
                EventSeed {
                    title,
                    description: "open to all",
                    status,
                    ..Default::default()
                },
            )
            .await;
        }

        let page = list_published(&db, &ListQuery::default()).await.unwrap();
        assert_eq!(titles(&page), vec!["Open day"]);

        // Searching for a draft's title does not surface it either.
        let page = list_published(
            &db,
            &query(ListParams {
                search: Some("secret".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert!(page.events.is_empty());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_across_fields() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Rust Meetup",
                ..Default::default()
            },
        )
        .await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Board games",
                description: "Bring your RUSTY dice",
                ..Default::default()
            },
        )
        .await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Picnic",
                location: "Rustic park",
                ..Default::default()
            },
        )
        .await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Choir",
                ..Default::default()
            },
        )
        .await;

        let q = query(ListParams {
            search: Some("rUsT".into()),
            sort: Some("title".into()),
            ..Default::default()
        });
        let page = list_published(&db, &q).await.unwrap();
        assert_eq!(titles(&page), vec!["Board games", "Picnic", "Rust Meetup"]);

        // Wildcards in the input are literal.
        let q = query(ListParams {
            search: Some("%".into()),
            ..Default::default()
        });
        assert!(list_published(&db, &q).await.unwrap().events.is_empty());
    }

    #[tokio::test]
    async fn filters_by_category() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let music = create_category(&db, "Music").await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Concert",
                category_id: Some(music.id),
                ..Default::default()
            },
        )
        .await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Lecture",
                ..Default::default()
            },
        )
        .await;

        let q = query(ListParams {
            category: Some(music.id.to_string()),
            ..Default::default()
        });
        let page = list_published(&db, &q).await.unwrap();
        assert_eq!(titles(&page), vec!["Concert"]);
        assert_eq!(page.events[0].category_name.as_deref(), Some("Music"));
    }

    #[tokio::test]
    async fn default_and_fallback_sort_by_newest_start() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        for (title, days) in [("Soon", 1), ("Later", 10), ("Middle", 5)] {
            create_event(
                &db,
                &alice,
                EventSeed {
                    title,
                    start_in_days: days,
                    ..Default::default()
                },
            )
            .await;
        }

        let page = list_published(&db, &ListQuery::default()).await.unwrap();
        assert_eq!(titles(&page), vec!["Later", "Middle", "Soon"]);

        let q = query(ListParams {
            sort: Some("-nonsense".into()),
            ..Default::default()
        });
        let page = list_published(&db, &q).await.unwrap();
        assert_eq!(titles(&page), vec!["Later", "Middle", "Soon"]);

        let q = query(ListParams {
            sort: Some("start_date".into()),
            ..Default::default()
        });
        let page = list_published(&db, &q).await.unwrap();
        assert_eq!(titles(&page), vec!["Soon", "Middle", "Later"]);
    }

    #[tokio::test]
    async fn annotates_and_sorts_by_participant_count() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        let bob = create_user(&db, "bob", false).await;
        let carol = create_user(&db, "carol", false).await;

        let quiet = create_event(
            &db,
            &alice,
            EventSeed {
                title: "Quiet",
                ..Default::default()
            },
        )
        .await;
        let busy = create_event(
            &db,
            &alice,
            EventSeed {
                title: "Busy",
                max_participants: 5,
                ..Default::default()
            },
        )
        .await;
        create_event(
            &db,
            &alice,
            EventSeed {
                title: "Empty",
                ..Default::default()
            },
        )
        .await;

        toggle(&db, bob.id, busy.id).await.unwrap();
        toggle(&db, carol.id, busy.id).await.unwrap();
        toggle(&db, bob.id, quiet.id).await.unwrap();

        let q = query(ListParams {
            sort: Some("-participants_count".into()),
            ..Default::default()
        });
        let page = list_published(&db, &q).await.unwrap();
        assert_eq!(titles(&page), vec!["Busy", "Quiet", "Empty"]);
        let counts: Vec<i64> = page.events.iter().map(|c| c.participants_count).collect();
        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(page.events[0].available_spots, AvailableSpots::Remaining(3));
        assert_eq!(page.events[1].available_spots, AvailableSpots::NoLimit);
    }

    #[tokio::test]
    async fn paginates_and_clamps_page() {
        let db = setup_test_db().await;
        let alice = create_user(&db, "alice", false).await;
        for day in 1..=(PAGE_SIZE as i64 + 2) {
            create_event(
                &db,
                &alice,
                EventSeed {
                    title: "Repeat",
                    start_in_days: day,
                    ..Default::default()
                },
            )
            .await;
        }

        let first = list_published(&db, &ListQuery::default()).await.unwrap();
        assert_eq!(first.events.len(), PAGE_SIZE as usize);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.total, PAGE_SIZE + 2);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let q = query(ListParams {
            page: Some("99".into()),
            ..Default::default()
        });
        let last = list_published(&db, &q).await.unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.events.len(), 2);
        assert!(last.has_previous);
    }
}
