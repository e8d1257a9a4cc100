use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::password,
    users::{dto::RegisterRequest, repo_types::Position},
};

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NOT_A_STRING: &str = "Not a valid string.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const USERNAME_TAKEN: &str = "user with this username already exists.";
pub const PASSWORD_MISMATCH: &str = "Password fields didn't match.";

pub const NAME_MAX_LEN: usize = 40;
pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

fn invalid_choice(value: &str) -> String {
    format!("\"{value}\" is not a valid choice.")
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Per-field error messages, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn username_taken() -> Self {
        Self::single("username", USERNAME_TAKEN)
    }
}

/// Registration fields after field-level checks. A field is `Some` only
/// when it passed every check for that field.
#[derive(Debug, Default)]
pub struct CheckedFields {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub position: Option<Position>,
    pub password: Option<String>,
    pub re_password: Option<String>,
}

/// Registration input that passed every check.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Position,
    pub password: String,
}

impl CheckedFields {
    /// Object-level check; only meaningful once every field passed.
    pub fn finish(self) -> Result<ValidRegistration, FieldErrors> {
        let (
            Some(username),
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(position),
            Some(password),
            Some(re_password),
        ) = (
            self.username,
            self.first_name,
            self.last_name,
            self.email,
            self.position,
            self.password,
            self.re_password,
        )
        else {
            return Err(FieldErrors::single("non_field_errors", "Invalid data."));
        };
        if password != re_password {
            return Err(FieldErrors::single("password", PASSWORD_MISMATCH));
        }
        Ok(ValidRegistration {
            username,
            first_name,
            last_name,
            email,
            position,
            password,
        })
    }
}

/// A raw JSON field seen as text.
enum Raw<'a> {
    Missing,
    Text(String),
    Invalid(&'a Value),
}

/// Strings pass through and numbers are stringified; other types are invalid.
fn coerce(value: Option<&Value>) -> Raw<'_> {
    match value {
        None | Some(Value::Null) => Raw::Missing,
        Some(Value::String(s)) => Raw::Text(s.clone()),
        Some(Value::Number(n)) => Raw::Text(n.to_string()),
        Some(other) => Raw::Invalid(other),
    }
}

fn text_or_empty(value: Option<&Value>) -> String {
    match coerce(value) {
        Raw::Text(s) => s,
        Raw::Missing | Raw::Invalid(_) => String::new(),
    }
}

/// Presence, type and blank checks; returns the (optionally trimmed) text.
fn text_field(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
    trim: bool,
) -> Option<String> {
    let raw = match coerce(value) {
        Raw::Missing => {
            errors.push(field, REQUIRED);
            return None;
        }
        Raw::Invalid(_) => {
            errors.push(field, NOT_A_STRING);
            return None;
        }
        Raw::Text(raw) => raw,
    };
    let value = if trim { raw.trim() } else { raw.as_str() };
    if value.is_empty() {
        errors.push(field, BLANK);
        return None;
    }
    Some(value.to_string())
}

fn max_len(errors: &mut FieldErrors, field: &str, value: String, max: usize) -> Option<String> {
    if value.chars().count() > max {
        errors.push(field, too_long(max));
        return None;
    }
    Some(value)
}

/// Field-level validation of a registration payload. Username uniqueness
/// needs the store and is checked by the caller.
pub fn check_fields(req: &RegisterRequest, errors: &mut FieldErrors) -> CheckedFields {
    let username = text_field(errors, "username", req.username.as_ref(), true)
        .and_then(|v| max_len(errors, "username", v, USERNAME_MAX_LEN))
        .and_then(|v| {
            if is_valid_username(&v) {
                Some(v)
            } else {
                errors.push("username", INVALID_USERNAME);
                None
            }
        });

    let first_name = text_field(errors, "first_name", req.first_name.as_ref(), true)
        .and_then(|v| max_len(errors, "first_name", v, NAME_MAX_LEN));
    let last_name = text_field(errors, "last_name", req.last_name.as_ref(), true)
        .and_then(|v| max_len(errors, "last_name", v, NAME_MAX_LEN));

    let email = text_field(errors, "email", req.email.as_ref(), true)
        .and_then(|v| max_len(errors, "email", v, EMAIL_MAX_LEN))
        .and_then(|v| {
            if is_valid_email(&v) {
                Some(v)
            } else {
                errors.push("email", INVALID_EMAIL);
                None
            }
        });

    let position = match coerce(req.position.as_ref()) {
        Raw::Missing => {
            errors.push("position", REQUIRED);
            None
        }
        Raw::Invalid(other) => {
            errors.push("position", invalid_choice(&other.to_string()));
            None
        }
        Raw::Text(raw) => match raw.parse::<Position>() {
            Ok(p) => Some(p),
            Err(_) => {
                errors.push("position", invalid_choice(&raw));
                None
            }
        },
    };

    let password = text_field(errors, "password", req.password.as_ref(), false).and_then(|v| {
        let username = text_or_empty(req.username.as_ref());
        let first_name = text_or_empty(req.first_name.as_ref());
        let last_name = text_or_empty(req.last_name.as_ref());
        let email = text_or_empty(req.email.as_ref());
        let attributes = [
            ("username", username.as_str()),
            ("first name", first_name.as_str()),
            ("last name", last_name.as_str()),
            ("email address", email.as_str()),
        ];
        let strength = password::strength_errors(&v, &attributes);
        if strength.is_empty() {
            Some(v)
        } else {
            for message in strength {
                errors.push("password", message);
            }
            None
        }
    });

    let re_password = text_field(errors, "re_password", req.re_password.as_ref(), false);

    CheckedFields {
        username,
        first_name,
        last_name,
        email,
        position,
        password,
        re_password,
    }
}

/// Lowercases the domain part, leaving the local part as given.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            username: Some("test_create_valid_user".into()),
            first_name: Some("Valid".into()),
            last_name: Some("User".into()),
            email: Some("test_create_valid_user@example.com".into()),
            position: Some("PROGRAMMER".into()),
            password: Some("VeryStrongPass123".into()),
            re_password: Some("VeryStrongPass123".into()),
        }
    }

    #[test]
    fn valid_payload_passes() {
        let mut errors = FieldErrors::default();
        let checked = check_fields(&valid_request(), &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
        let valid = checked.finish().expect("object-level checks pass");
        assert_eq!(valid.username, "test_create_valid_user");
        assert_eq!(valid.position, Position::Programmer);
    }

    #[test]
    fn empty_payload_requires_all_seven_fields() {
        let mut errors = FieldErrors::default();
        check_fields(&RegisterRequest::default(), &mut errors);
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(
            fields,
            vec![
                "email",
                "first_name",
                "last_name",
                "password",
                "position",
                "re_password",
                "username"
            ]
        );
        for field in fields {
            assert_eq!(errors.get(field).unwrap(), [REQUIRED.to_string()]);
        }
    }

    #[test]
    fn bad_fields_are_reported_together() {
        let req = RegisterRequest {
            username: Some("alexsmith".into()),
            first_name: Some("VerylongfirstnameVerylongfirstnameVerylongfirstname".into()),
            last_name: Some("VerylonglastnameVerylonglastnameVerylonglastname".into()),
            email: Some("test_create_valid_user".into()),
            position: Some("test".into()),
            password: Some("qwerty".into()),
            re_password: Some("not_simple".into()),
        };
        let mut errors = FieldErrors::default();
        let checked = check_fields(&req, &mut errors);

        let long = "Ensure this field has no more than 40 characters.".to_string();
        assert_eq!(errors.get("first_name").unwrap(), [long.clone()]);
        assert_eq!(errors.get("last_name").unwrap(), [long]);
        assert_eq!(errors.get("email").unwrap(), [INVALID_EMAIL.to_string()]);
        assert_eq!(
            errors.get("position").unwrap(),
            ["\"test\" is not a valid choice.".to_string()]
        );
        assert!(errors.get("password").is_some());
        // format is fine, uniqueness is the caller's job
        assert!(errors.get("username").is_none());
        assert_eq!(checked.username.as_deref(), Some("alexsmith"));
    }

    #[test]
    fn forty_characters_is_allowed() {
        let mut req = valid_request();
        req.first_name = Some("a".repeat(40).into());
        req.last_name = Some("ж".repeat(40).into());
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn blank_strings_are_not_missing() {
        let mut req = valid_request();
        req.username = Some("   ".into());
        req.password = Some("".into());
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert_eq!(errors.get("username").unwrap(), [BLANK.to_string()]);
        assert_eq!(errors.get("password").unwrap(), [BLANK.to_string()]);
    }

    #[test]
    fn username_charset_is_enforced() {
        let mut req = valid_request();
        req.username = Some("bad name!".into());
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert_eq!(errors.get("username").unwrap(), [INVALID_USERNAME.to_string()]);
    }

    #[test]
    fn mismatched_passwords_fail_object_level() {
        let mut req = valid_request();
        req.re_password = Some("VeryStrongPass124".into());
        let mut errors = FieldErrors::default();
        let checked = check_fields(&req, &mut errors);
        assert!(errors.is_empty());
        let err = checked.finish().unwrap_err();
        assert_eq!(err.get("password").unwrap(), [PASSWORD_MISMATCH.to_string()]);
    }

    #[test]
    fn length_limits_for_username_and_email() {
        let mut req = valid_request();
        req.username = Some("u".repeat(150).into());
        req.email = Some(format!("{}@example.com", "a".repeat(242)).into());
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");

        req.username = Some("u".repeat(151).into());
        req.email = Some(format!("{}@example.com", "a".repeat(243)).into());
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert_eq!(
            errors.get("username").unwrap(),
            ["Ensure this field has no more than 150 characters.".to_string()]
        );
        assert_eq!(
            errors.get("email").unwrap(),
            ["Ensure this field has no more than 254 characters.".to_string()]
        );
    }

    #[test]
    fn numbers_are_taken_as_text() {
        let mut req = valid_request();
        req.first_name = Some(Value::from(42));
        req.last_name = Some(Value::from(7.5));
        let mut errors = FieldErrors::default();
        let checked = check_fields(&req, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(checked.first_name.as_deref(), Some("42"));
        assert_eq!(checked.last_name.as_deref(), Some("7.5"));
    }

    #[test]
    fn other_json_types_are_not_strings() {
        let mut req = valid_request();
        req.username = Some(Value::Bool(true));
        req.first_name = Some(serde_json::json!([]));
        req.email = Some(serde_json::json!({"address": "x@example.com"}));
        req.position = Some(Value::Bool(false));
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        for field in ["username", "first_name", "email"] {
            assert_eq!(errors.get(field).unwrap(), [NOT_A_STRING.to_string()], "{field}");
        }
        assert_eq!(
            errors.get("position").unwrap(),
            ["\"false\" is not a valid choice.".to_string()]
        );
    }

    #[test]
    fn explicit_null_counts_as_missing() {
        let req = RegisterRequest::from_body(serde_json::json!({
            "username": null,
            "first_name": "Valid",
        }));
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert_eq!(errors.get("username").unwrap(), [REQUIRED.to_string()]);
        assert!(errors.get("first_name").is_none());

        let mut req = valid_request();
        req.password = Some(Value::Null);
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert_eq!(errors.get("password").unwrap(), [REQUIRED.to_string()]);
    }

    #[test]
    fn blank_position_is_an_invalid_choice() {
        let mut req = valid_request();
        req.position = Some("".into());
        let mut errors = FieldErrors::default();
        check_fields(&req, &mut errors);
        assert_eq!(
            errors.get("position").unwrap(),
            ["\"\" is not a valid choice.".to_string()]
        );
    }

    #[test]
    fn username_is_trimmed_before_use() {
        let mut req = valid_request();
        req.username = Some("  alexsmith  ".into());
        let mut errors = FieldErrors::default();
        let checked = check_fields(&req, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(checked.username.as_deref(), Some("alexsmith"));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("test_create_valid_user"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("John.Doe@Example.COM"), "John.Doe@example.com");
    }
}
