pub use super::category::Entity as Category;
pub use super::comment::Entity as Comment;
pub use super::event::Entity as Event;
pub use super::event_attachment::Entity as EventAttachment;
pub use super::participation::Entity as Participation;
pub use super::user::Entity as User;
pub use super::user_profile::Entity as UserProfile;
