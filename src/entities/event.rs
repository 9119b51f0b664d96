use chrono::{Local, NaiveDateTime};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub short_description: String,
    pub location: String,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub category_id: Option<i32>,
    pub organizer_id: i32,
    /// Zero means the event has no participant limit.
    pub max_participants: i32,
    pub status: EventStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl EventStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Published => "Published",
            Self::Cancelled => "Cancelled",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OrganizerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Organizer,
    #[sea_orm(has_many = "super::participation::Entity")]
    Participation,
    #[sea_orm(has_many = "super::event_attachment::Entity")]
    EventAttachment,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizer.def()
    }
}

impl Related<super::participation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participation.def()
    }
}

impl Related<super::event_attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventAttachment.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Remaining capacity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailableSpots {
    NoLimit,
    Remaining(i64),
}

impl std::fmt::Display for AvailableSpots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLimit => f.write_str("No limit"),
            Self::Remaining(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for AvailableSpots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NoLimit => serializer.serialize_str("No limit"),
            Self::Remaining(n) => serializer.serialize_i64(*n),
        }
    }
}

impl Model {
    /// Start and end dates are wall-clock times as typed into the form, so
    /// they are compared against the server's local clock.
    pub fn is_upcoming(&self) -> bool {
        self.starts_after(Local::now().naive_local())
    }

    pub fn starts_after(&self, now: NaiveDateTime) -> bool {
        self.start_date > now
    }

    /// Capacity left given the current number of registrants. The result
    /// goes negative when an event was over-subscribed before its limit was
    /// lowered.
    pub fn available_spots(&self, registered: u64) -> AvailableSpots {
        if self.max_participants == 0 {
            AvailableSpots::NoLimit
        } else {
            AvailableSpots::Remaining(i64::from(self.max_participants) - registered as i64)
        }
    }
}
