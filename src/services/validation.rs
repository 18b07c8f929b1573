use super::AuthError;

const MAX_USERNAME_LEN: usize = 128;

pub fn validate_username(username: &str) -> Result<&str, AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::validation("username is required"));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::validation(format!(
            "username must be {MAX_USERNAME_LEN} characters or less"
        )));
    }

    if username
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(AuthError::validation(
            "username cannot contain whitespace or control characters",
        ));
    }

    Ok(username)
}

pub fn require_field<'a>(value: &'a str, field: &str) -> Result<&'a str, AuthError> {
    if value.is_empty() {
        return Err(AuthError::validation(format!("{field} is required")));
    }
    Ok(value)
}

/// Treats an empty optional field the same as an absent one.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
