use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::FieldErrors;

const MIN_PASSWORD_LEN: usize = 6;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// What actually goes over the wire; the confirmation never leaves the client.
#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

impl RegisterForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        if self.name.is_empty() {
            errors.add("name", "Name is required");
        }
        if self.password != self.confirm_password {
            errors.add("confirmPassword", "Passwords do not match");
        }
        errors
    }

    pub(crate) fn request(&self) -> RegisterRequest<'_> {
        RegisterRequest {
            name: &self.name,
            email: &self.email,
            password: &self.password,
        }
    }
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !email_pattern().is_match(email) {
        errors.add("email", "Email is invalid");
    }
}

fn check_password(password: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be at least 6 characters");
    }
}
