use sea_orm_migration::{prelude::*, schema::*};

use crate::iden::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create Category Table
        let table = Table::create()
            .table(Category::Table)
            .if_not_exists()
            .col(pk_auto(Category::Id))
            .col(string_len(Category::Name, 100))
            .col(string_len(Category::Color, 7).default("#007bff"))
            .to_owned();
        manager.create_table(table).await?;

        // Create Event Table
        let table = table_auto(Event::Table)
            .col(pk_auto(Event::Id))
            .col(string_len(Event::Title, 200))
            .col(text(Event::Description))
            .col(string_len(Event::ShortDescription, 500))
            .col(string_len(Event::Location, 200))
            .col(timestamp(Event::StartDate))
            .col(timestamp(Event::EndDate))
            .col(integer_null(Event::CategoryId))
            .col(integer(Event::OrganizerId))
            .col(integer(Event::MaxParticipants).default(0))
            .col(string_len(Event::Status, 20).default("draft"))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_event_category")
                    .from(Event::Table, Event::CategoryId)
                    .to(Category::Table, Category::Id)
                    .on_delete(ForeignKeyAction::SetNull),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_event_organizer")
                    .from(Event::Table, Event::OrganizerId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .check(Expr::col(Event::MaxParticipants).gte(0))
            .to_owned();
        manager.create_table(table).await?;

        // Create Participation Table
        let table = Table::create()
            .table(Participation::Table)
            .if_not_exists()
            .col(pk_auto(Participation::Id))
            .col(integer(Participation::UserId))
            .col(integer(Participation::EventId))
            .col(timestamp(Participation::RegisteredAt).default(Expr::current_timestamp()))
            .col(text(Participation::Notes).default(""))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_participation_user")
                    .from(Participation::Table, Participation::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_participation_event")
                    .from(Participation::Table, Participation::EventId)
                    .to(Event::Table, Event::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        // One registration per user and event
        manager
            .create_index(
                Index::create()
                    .name("idx_participation_user_event")
                    .table(Participation::Table)
                    .col(Participation::UserId)
                    .col(Participation::EventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_status_start")
                    .table(Event::Table)
                    .col(Event::Status)
                    .col(Event::StartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_event_organizer")
                    .table(Event::Table)
                    .col(Event::OrganizerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop all tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(Participation::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Event::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Category::Table).to_owned())
            .await?;

        Ok(())
    }
}
