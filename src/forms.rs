//! Submitted form bodies and their validation.
//!
//! Every form deserializes leniently (all fields are strings) so that invalid
//! input can be re-rendered with messages instead of being rejected by the
//! extractor.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::entities::event::EventStatus;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
pub const DATETIME_INPUT: &str = "%Y-%m-%dT%H:%M";

/// Field name to messages, in a stable order for rendering.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn required<'a>(errors: &mut FormErrors, field: &'static str, value: &'a str, max_len: Option<usize>) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(field, format!("Ensure this value has at most {max} characters."));
        }
    }
    value
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventForm {
    pub title: String,
    pub short_description: String,
    pub description: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub category: String,
    pub max_participants: String,
    pub status: String,
}

/// Validated event fields, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInput {
    pub title: String,
    pub short_description: String,
    pub description: String,
    pub location: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub category_id: Option<i32>,
    pub max_participants: i32,
    pub status: EventStatus,
}

impl EventForm {
    pub fn blank() -> Self {
        Self {
            max_participants: "0".into(),
            status: "draft".into(),
            ..Default::default()
        }
    }

    pub fn from_model(event: &crate::entities::event::Model) -> Self {
        Self {
            title: event.title.clone(),
            short_description: event.short_description.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_date: event.start_date.format(DATETIME_INPUT).to_string(),
            end_date: event.end_date.format(DATETIME_INPUT).to_string(),
            category: event.category_id.map(|id| id.to_string()).unwrap_or_default(),
            max_participants: event.max_participants.to_string(),
            status: event.status.as_str().to_string(),
        }
    }

    /// `category_ids` are the categories that currently exist; the field is
    /// ignored entirely when there are none.
    pub fn validate(&self, category_ids: &[i32]) -> Result<EventInput, FormErrors> {
        let mut errors = FormErrors::default();

        let title = required(&mut errors, "title", &self.title, Some(200)).to_string();
        let short_description =
            required(&mut errors, "short_description", &self.short_description, Some(500)).to_string();
        let description = required(&mut errors, "description", &self.description, None).to_string();
        let location = required(&mut errors, "location", &self.location, Some(200)).to_string();

        let start_date = parse_datetime(&self.start_date);
        if start_date.is_none() {
            errors.add("start_date", "Enter a valid date/time.");
        }
        let end_date = parse_datetime(&self.end_date);
        if end_date.is_none() {
            errors.add("end_date", "Enter a valid date/time.");
        }
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                errors.add("end_date", "The event cannot end before it starts.");
            }
        }

        let category_id = match self.category.trim() {
            "" => None,
            _ if category_ids.is_empty() => None,
            raw => match raw.parse::<i32>() {
                Ok(id) if category_ids.contains(&id) => Some(id),
                _ => {
                    errors.add("category", "Select a valid choice.");
                    None
                }
            },
        };

        let max_participants = match self.max_participants.trim() {
            "" => 0,
            raw => match raw.parse::<i32>() {
                Ok(n) if n >= 0 => n,
                _ => {
                    errors.add(
                        "max_participants",
                        "Enter a whole number, 0 for no limit.",
                    );
                    0
                }
            },
        };

        let status = EventStatus::parse(self.status.trim()).unwrap_or_else(|| {
            errors.add("status", "Select a valid choice.");
            EventStatus::Draft
        });

        match (start_date, end_date) {
            (Some(start_date), Some(end_date)) => errors.into_result(EventInput {
                title,
                short_description,
                description,
                location,
                start_date,
                end_date,
                category_id,
                max_participants,
                status,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub content: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let content = required(&mut errors, "content", &self.content, None).to_string();
        errors.into_result(content)
    }
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Account fields shared by registration and profile editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInput {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

fn validate_account(
    errors: &mut FormErrors,
    username: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
) -> AccountInput {
    let username = required(errors, "username", username, Some(150)).to_string();
    if !username.is_empty() && !valid_username(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    let first_name = required(errors, "first_name", first_name, Some(30)).to_string();
    let last_name = required(errors, "last_name", last_name, Some(30)).to_string();
    let email = required(errors, "email", email, Some(254)).to_string();
    if !email.is_empty() && !valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
    }
    AccountInput {
        username,
        first_name,
        last_name,
        email,
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInput {
    pub account: AccountInput,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<RegisterInput, FormErrors> {
        let mut errors = FormErrors::default();
        let account = validate_account(
            &mut errors,
            &self.username,
            &self.first_name,
            &self.last_name,
            &self.email,
        );

        if self.password1.is_empty() {
            errors.add("password1", "This field is required.");
        } else {
            if self.password1.chars().count() < 8 {
                errors.add(
                    "password1",
                    "This password is too short. It must contain at least 8 characters.",
                );
            }
            if self.password1.chars().all(|c| c.is_ascii_digit()) {
                errors.add("password1", "This password is entirely numeric.");
            }
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.into_result(RegisterInput {
            account,
            password: self.password1.clone(),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInput {
    pub account: AccountInput,
    pub bio: String,
    pub phone: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ProfileInput, FormErrors> {
        let mut errors = FormErrors::default();
        let account = validate_account(
            &mut errors,
            &self.username,
            &self.first_name,
            &self.last_name,
            &self.email,
        );
        let phone = self.phone.trim().to_string();
        if phone.chars().count() > 20 {
            errors.add("phone", "Ensure this value has at most 20 characters.");
        }
        errors.into_result(ProfileInput {
            account,
            bio: self.bio.trim().to_string(),
            phone,
        })
    }
}

/// HTML checkboxes are simply absent when unticked.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionsForm {
    pub can_create_events: Option<String>,
}

impl PermissionsForm {
    pub fn can_create_events(&self) -> bool {
        self.can_create_events
            .as_deref()
            .is_some_and(|v| matches!(v, "on" | "true" | "1"))
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
    pub color: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<CategoryInput, FormErrors> {
        let mut errors = FormErrors::default();
        let name = required(&mut errors, "name", &self.name, Some(100)).to_string();
        let color = match self.color.trim() {
            "" => crate::entities::category::DEFAULT_COLOR.to_string(),
            raw if raw.len() == 7
                && raw.starts_with('#')
                && raw[1..].chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                raw.to_lowercase()
            }
            _ => {
                errors.add("color", "Enter a colour like #1a2b3c.");
                String::new()
            }
        };
        errors.into_result(CategoryInput { name, color })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_form() -> EventForm {
        EventForm {
            title: "  Rust meetup ".into(),
            short_description: "Talks and pizza".into(),
            description: "Two talks about async.".into(),
            location: "Room 101".into(),
            start_date: "2030-06-01T18:00".into(),
            end_date: "2030-06-01T21:30".into(),
            category: String::new(),
            max_participants: "40".into(),
            status: "published".into(),
        }
    }

    #[test]
    fn valid_event_form() {
        let input = event_form().validate(&[]).unwrap();
        assert_eq!(input.title, "Rust meetup");
        assert_eq!(input.max_participants, 40);
        assert_eq!(input.status, EventStatus::Published);
        assert_eq!(input.category_id, None);
        assert_eq!(input.start_date.format(DATETIME_INPUT).to_string(), "2030-06-01T18:00");
    }

    #[test]
    fn event_form_reports_each_bad_field() {
        let form = EventForm {
            title: " ".into(),
            start_date: "tomorrow".into(),
            max_participants: "-1".into(),
            status: "archived".into(),
            category: "7".into(),
            ..event_form()
        };
        let errors = form.validate(&[1, 2]).unwrap_err();
        for field in ["title", "start_date", "max_participants", "status", "category"] {
            assert!(errors.has(field), "missing error for {field}");
        }
        assert!(!errors.has("location"));
    }

    #[test]
    fn event_cannot_end_before_start() {
        let form = EventForm {
            end_date: "2030-06-01T17:00".into(),
            ..event_form()
        };
        assert!(form.validate(&[]).unwrap_err().has("end_date"));
    }

    #[test]
    fn category_is_ignored_without_categories() {
        let form = EventForm {
            category: "3".into(),
            ..event_form()
        };
        assert_eq!(form.validate(&[]).unwrap().category_id, None);
        assert_eq!(form.validate(&[3]).unwrap().category_id, Some(3));
    }

    #[test]
    fn registration_password_rules() {
        let form = RegisterForm {
            username: "jan.kowalski".into(),
            first_name: "Jan".into(),
            last_name: "Kowalski".into(),
            email: "jan@example.com".into(),
            password1: "12345678".into(),
            password2: "12345679".into(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("password1"));
        assert!(errors.has("password2"));

        let form = RegisterForm {
            password1: "long enough pass".into(),
            password2: "long enough pass".into(),
            ..form
        };
        let input = form.validate().unwrap();
        assert_eq!(input.account.username, "jan.kowalski");
        assert_eq!(input.password, "long enough pass");
    }

    #[test]
    fn registration_rejects_bad_username_and_email() {
        let form = RegisterForm {
            username: "bad name!".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            email: "nope".into(),
            password1: "s3cret-pass".into(),
            password2: "s3cret-pass".into(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("email"));
    }

    #[test]
    fn permissions_checkbox() {
        assert!(!PermissionsForm::default().can_create_events());
        let ticked = PermissionsForm {
            can_create_events: Some("on".into()),
        };
        assert!(ticked.can_create_events());
    }

    #[test]
    fn category_colour_defaults_and_validates() {
        let ok = CategoryForm {
            name: "Music".into(),
            color: String::new(),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.color, "#007bff");

        let bad = CategoryForm {
            name: "Music".into(),
            color: "red".into(),
        };
        assert!(bad.validate().unwrap_err().has("color"));
    }
}
