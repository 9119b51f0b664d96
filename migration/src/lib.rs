pub use sea_orm_migration::prelude::*;

mod iden;
mod m20250901_000001_user_tables;
mod m20250901_000002_event_tables;
mod m20250915_000001_attachments_and_comments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_user_tables::Migration),
            Box::new(m20250901_000002_event_tables::Migration),
            Box::new(m20250915_000001_attachments_and_comments::Migration),
        ]
    }
}
