use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Username,
    FirstName,
    LastName,
    Email,
    PasswordHash,
    IsSuperuser,
}

#[derive(DeriveIden)]
pub enum UserProfile {
    Table,
    Id,
    UserId,
    CanCreateEvents,
    Bio,
    Phone,
}

#[derive(DeriveIden)]
pub enum Category {
    Table,
    Id,
    Name,
    Color,
}

#[derive(DeriveIden)]
pub enum Event {
    Table,
    Id,
    Title,
    Description,
    ShortDescription,
    Location,
    StartDate,
    EndDate,
    CategoryId,
    OrganizerId,
    MaxParticipants,
    Status,
}

#[derive(DeriveIden)]
pub enum Participation {
    Table,
    Id,
    UserId,
    EventId,
    RegisteredAt,
    Notes,
}

#[derive(DeriveIden)]
pub enum EventAttachment {
    Table,
    Id,
    EventId,
    File,
    Name,
    UploadedAt,
}

#[derive(DeriveIden)]
pub enum Comment {
    Table,
    Id,
    EventId,
    AuthorId,
    Content,
}
