use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::dto::{NewUserInput, UserPayload, UserUpdateInput};
use super::repo_types::Role;

pub const MIN_PASSWORD_LEN: usize = 6;

/// One rejected field in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

impl FieldError {
    fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self { field, error: error.into() }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(raw: &str, errors: &mut Vec<FieldError>) -> String {
    let email = normalize_email(raw);
    if email.is_empty() {
        errors.push(FieldError::new("email", "This field is required"));
    } else if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "Invalid email format"));
    }
    email
}

fn check_password_len(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Should be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    }
}

fn check_name(raw: &str, errors: &mut Vec<FieldError>) -> String {
    let name = raw.trim().to_string();
    if name.is_empty() {
        errors.push(FieldError::new("name", "This field is required"));
    }
    name
}

fn check_role(raw: &str, errors: &mut Vec<FieldError>) -> Option<Role> {
    if raw.is_empty() {
        errors.push(FieldError::new("role", "This field is required"));
        return None;
    }
    match raw.parse::<Role>() {
        Ok(role) => Some(role),
        Err(_) => {
            let allowed: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
            errors.push(FieldError::new(
                "role",
                format!("Should be one of: {}", allowed.join(" ")),
            ));
            None
        }
    }
}

/// Checks a registration body, collecting every failing field.
pub fn validate_new_user(p: UserPayload) -> Result<NewUserInput, Vec<FieldError>> {
    let mut errors = Vec::new();
    let email = check_email(&p.email, &mut errors);
    if p.password.is_empty() {
        errors.push(FieldError::new("password", "This field is required"));
    } else {
        check_password_len(&p.password, &mut errors);
    }
    let name = check_name(&p.name, &mut errors);
    let role = check_role(&p.role, &mut errors);

    match role {
        Some(role) if errors.is_empty() => Ok(NewUserInput {
            email,
            password: p.password,
            name,
            role,
        }),
        _ => Err(errors),
    }
}

/// Like [`validate_new_user`] except an empty password means "keep the current one".
pub fn validate_user_update(p: UserPayload) -> Result<UserUpdateInput, Vec<FieldError>> {
    let mut errors = Vec::new();
    let email = check_email(&p.email, &mut errors);
    if !p.password.is_empty() {
        check_password_len(&p.password, &mut errors);
    }
    let name = check_name(&p.name, &mut errors);
    let role = check_role(&p.role, &mut errors);

    match role {
        Some(role) if errors.is_empty() => Ok(UserUpdateInput {
            email,
            password: (!p.password.is_empty()).then_some(p.password),
            name,
            role,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(email: &str, password: &str, name: &str, role: &str) -> UserPayload {
        UserPayload {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            role: role.into(),
        }
    }

    #[test]
    fn email_regex() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no at sign.com"));
        assert!(!is_valid_email("a@@x.com"));
    }

    #[test]
    fn valid_new_user_is_normalized() {
        let input = validate_new_user(payload("  A@X.com ", "secret1", " A ", "user")).unwrap();
        assert_eq!(input.email, "a@x.com");
        assert_eq!(input.name, "A");
        assert_eq!(input.role, Role::User);
    }

    #[test]
    fn new_user_reports_every_bad_field() {
        let errors = validate_new_user(payload("", "", "  ", "root")).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["email", "password", "name", "role"]);
        assert_eq!(errors[3].error, "Should be one of: admin user");
    }

    #[test]
    fn short_password_rejected() {
        let errors = validate_new_user(payload("a@x.com", "12345", "A", "user")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "password");
        assert_eq!(errors[0].error, "Should be at least 6 characters long");
    }

    #[test]
    fn update_allows_empty_password() {
        let input = validate_user_update(payload("a@x.com", "", "A", "admin")).unwrap();
        assert!(input.password.is_none());
        assert_eq!(input.role, Role::Admin);

        let input = validate_user_update(payload("a@x.com", "newpass", "A", "admin")).unwrap();
        assert_eq!(input.password.as_deref(), Some("newpass"));
    }

    #[test]
    fn update_still_checks_supplied_password() {
        let errors = validate_user_update(payload("a@x.com", "abc", "A", "user")).unwrap_err();
        assert_eq!(errors[0].field, "password");
    }
}
