use sea_orm_migration::{prelude::*, schema::*};

use crate::iden::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // created_at doubles as the date joined
        let table = table_auto(User::Table)
            .col(pk_auto(User::Id))
            .col(string_len_uniq(User::Username, 150))
            .col(string_len(User::FirstName, 30))
            .col(string_len(User::LastName, 30))
            .col(string(User::Email))
            .col(string(User::PasswordHash))
            .col(boolean(User::IsSuperuser).default(false))
            .to_owned();
        manager.create_table(table).await?;

        let table = Table::create()
            .table(UserProfile::Table)
            .if_not_exists()
            .col(pk_auto(UserProfile::Id))
            .col(integer_uniq(UserProfile::UserId))
            .col(boolean(UserProfile::CanCreateEvents).default(false))
            .col(text(UserProfile::Bio).default(""))
            .col(string_len(UserProfile::Phone, 20).default(""))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_user_profile_user")
                    .from(UserProfile::Table, UserProfile::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserProfile::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        Ok(())
    }
}
