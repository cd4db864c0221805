//! Проверка форм входа и регистрации.
//!
//! Выполняется до любого обращения к хранилищу; все ошибки по полям
//! возвращаются разом в `errors`.

use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::models::Role;

/// Аналог `\S+@\S+\.\S+` (без якорей): где-то в строке есть
/// `непробельные@непробельные.непробельные`.
pub fn looks_like_email(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    chars.iter().enumerate().any(|(i, &c)| {
        if c != '@' || i == 0 || chars[i - 1].is_whitespace() {
            return false;
        }
        let domain: Vec<char> = chars[i + 1..]
            .iter()
            .take_while(|c| !c.is_whitespace())
            .copied()
            .collect();
        domain
            .iter()
            .enumerate()
            .any(|(j, &d)| d == '.' && j >= 1 && j + 1 < domain.len())
    })
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(error("required", "Email is required."));
    }
    if !looks_like_email(email) {
        return Err(error("email", "Invalid email format"));
    }
    Ok(())
}

// Администраторов создают только вручную, самостоятельно доступны attendee и organizer
fn check_role(role: &Role) -> Result<(), ValidationError> {
    match role {
        Role::Admin => Err(error("role", "Invalid role")),
        Role::Organizer | Role::Attendee => Ok(()),
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(custom(function = "check_email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required."))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "check_email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = "check_role"))]
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;
    use proptest::prelude::*;

    fn field_errors(form: &impl Validate) -> std::collections::BTreeMap<String, String> {
        match form.validate().map_err(AppError::from) {
            Ok(()) => Default::default(),
            Err(AppError::Validation { fields, .. }) => fields.unwrap_or_default(),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_password_is_reported() {
        let form = LoginForm {
            email: "ann@example.com".to_string(),
            password: String::new(),
        };
        let errors = field_errors(&form);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["password"], "Password is required.");
    }

    #[test]
    fn malformed_email_has_its_own_message() {
        let form = LoginForm {
            email: "ann.example.com".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(field_errors(&form)["email"], "Invalid email format");

        let empty = LoginForm {
            email: String::new(),
            password: "secret".to_string(),
        };
        assert_eq!(field_errors(&empty)["email"], "Email is required.");
    }

    #[test]
    fn signup_requires_name_and_reports_all_fields() {
        let errors = field_errors(&SignupForm::default());
        assert_eq!(errors["name"], "Name is required.");
        assert_eq!(errors["email"], "Email is required.");
        assert_eq!(errors["password"], "Password is required.");
    }

    #[test]
    fn signup_cannot_pick_admin_role() {
        let form = SignupForm {
            name: "Mal".to_string(),
            email: "mal@example.com".to_string(),
            password: "secret".to_string(),
            role: Some(Role::Admin),
        };
        assert_eq!(field_errors(&form)["role"], "Invalid role");

        for role in [None, Some(Role::Attendee), Some(Role::Organizer)] {
            let form = SignupForm { role, ..form.clone() };
            assert!(field_errors(&form).is_empty());
        }
    }

    #[test]
    fn email_pattern_matches_reference_cases() {
        assert!(looks_like_email("a@b.c"));
        assert!(looks_like_email("  x a@b.co  "));
        assert!(!looks_like_email("a@b."));
        assert!(!looks_like_email("@b.c"));
        assert!(!looks_like_email("a@.c"));
        assert!(!looks_like_email("a @b.c"));
    }

    #[test]
    fn generated_emails_pass() {
        for _ in 0..50 {
            let email: String = SafeEmail().fake();
            assert!(looks_like_email(&email), "{}", email);
        }
    }

    proptest! {
        #[test]
        fn strings_without_at_are_rejected(s in "[^@]*") {
            prop_assert!(!looks_like_email(&s));
        }
    }
}
