//! Field format checks for registration and password changes.

use std::sync::LazyLock;

use regex::Regex;

use super::AuthError;

const USERNAME_MIN: usize = 4;
const USERNAME_MAX: usize = 24;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 32;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("username pattern"));

/// ASCII letters, digits and common symbols.
static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[a-zA-Z0-9!@#$%^&*()_+={}\[\]:;'"<>,.?/|\\~-]+$"#).expect("password pattern")
});

/// `local@domain.tld`, where the TLD is at least two letters.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::ValidationError("invalid email address".into()))
    }
}

/// 4-24 characters of lowercase letters, digits and underscore.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if (USERNAME_MIN..=USERNAME_MAX).contains(&len) && USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(AuthError::ValidationError(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters of a-z, 0-9 or _"
        )))
    }
}

/// 8-32 characters of ASCII letters, digits and common symbols.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if (PASSWORD_MIN..=PASSWORD_MAX).contains(&len) && PASSWORD_RE.is_match(password) {
        Ok(())
    } else {
        Err(AuthError::ValidationError(format!(
            "password must be {PASSWORD_MIN}-{PASSWORD_MAX} characters of letters, digits or symbols"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_compile() {
        LazyLock::force(&EMAIL_RE);
        LazyLock::force(&USERNAME_RE);
        LazyLock::force(&PASSWORD_RE);
    }

    #[test]
    fn accepts_ordinary_emails() {
        for email in ["a@b.co", "first.last+tag@mail.example.org", "x_y%z@sub-domain.io"] {
            assert!(validate_email(email).is_ok(), "{email}");
        }
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["", "plain", "@b.co", "a@", "a@b", "a@b.c", "a@.com", "a b@c.com", "a@b.c0m"] {
            assert!(validate_email(email).is_err(), "{email}");
        }
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("user_01").is_ok());
        assert!(validate_username("abc").is_err());
        assert!(validate_username(&"a".repeat(25)).is_err());
        assert!(validate_username("Alice").is_err());
        assert!(validate_username("al-ice").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("hunter22").is_ok());
        assert!(validate_password("P@ss[w0rd]~\\").is_ok());
        assert!(validate_password("a/b\"c'd{e}f").is_ok());
        assert!(validate_password("short1!").is_err());
        assert!(validate_password(&"x".repeat(33)).is_err());
        assert!(validate_password("has space1").is_err());
        assert!(validate_password("pässwörd1").is_err());
    }
}
