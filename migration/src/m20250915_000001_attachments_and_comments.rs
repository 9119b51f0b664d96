use sea_orm_migration::{prelude::*, schema::*};

use crate::iden::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(EventAttachment::Table)
            .if_not_exists()
            .col(pk_auto(EventAttachment::Id))
            .col(integer(EventAttachment::EventId))
            .col(string(EventAttachment::File))
            .col(string_len(EventAttachment::Name, 200))
            .col(timestamp(EventAttachment::UploadedAt).default(Expr::current_timestamp()))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_attachment_event")
                    .from(EventAttachment::Table, EventAttachment::EventId)
                    .to(Event::Table, Event::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        let table = table_auto(Comment::Table)
            .col(pk_auto(Comment::Id))
            .col(integer(Comment::EventId))
            .col(integer(Comment::AuthorId))
            .col(text(Comment::Content))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_comment_event")
                    .from(Comment::Table, Comment::EventId)
                    .to(Event::Table, Event::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_comment_author")
                    .from(Comment::Table, Comment::AuthorId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_event")
                    .table(EventAttachment::Table)
                    .col(EventAttachment::EventId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comment_event")
                    .table(Comment::Table)
                    .col(Comment::EventId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comment::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EventAttachment::Table).to_owned())
            .await?;

        Ok(())
    }
}
