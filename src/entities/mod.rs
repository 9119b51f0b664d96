pub mod prelude;

pub mod category;
pub mod comment;
pub mod event;
pub mod event_attachment;
pub mod participation;
pub mod user;
pub mod user_profile;
