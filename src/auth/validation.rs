use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::{
    dto::{LoginRequest, RegisterRequest},
    errors::{AuthError, AuthResult, FieldError},
};

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_NAME_LEN: usize = 100;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

/// Returns every policy violation of `password`, empty when it is acceptable.
pub(crate) fn password_problems(password: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        problems.push(format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    if len > MAX_PASSWORD_LEN {
        problems.push(format!("must be at most {MAX_PASSWORD_LEN} characters"));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        problems.push("must contain an uppercase letter".into());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        problems.push("must contain a lowercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("must contain a digit".into());
    }
    problems
}

fn check_name(field: &'static str, value: &str, errors: &mut Vec<FieldError>) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, "is required"));
    } else if value.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: Option<i32>,
}

pub fn validate_registration(req: RegisterRequest) -> AuthResult<Registration> {
    let mut errors = Vec::new();

    let email = normalize_email(&req.email);
    if email.is_empty() {
        errors.push(FieldError::new("email", "is required"));
    } else if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "is not a valid email address"));
    }

    if req.password.is_empty() {
        errors.push(FieldError::new("password", "is required"));
    } else {
        for problem in password_problems(&req.password) {
            errors.push(FieldError::new("password", problem));
        }
    }

    check_name("firstName", &req.first_name, &mut errors);
    check_name("lastName", &req.last_name, &mut errors);

    if let Some(id) = req.tenant_id {
        if id <= 0 {
            errors.push(FieldError::new("tenantId", "must be a positive integer"));
        }
    }

    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }
    Ok(Registration {
        email,
        password: req.password,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        tenant_id: req.tenant_id,
    })
}

/// Presence checks only; anything else is reported as bad credentials.
pub fn validate_login(req: LoginRequest) -> AuthResult<(String, String)> {
    let mut errors = Vec::new();
    let email = normalize_email(&req.email);
    if email.is_empty() {
        errors.push(FieldError::new("email", "is required"));
    }
    if req.password.is_empty() {
        errors.push(FieldError::new("password", "is required"));
    }
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }
    Ok((email, req.password))
}
