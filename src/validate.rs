use crate::error::AppError;

pub const NAME_LEN: (usize, usize) = (3, 10);
pub const USERNAME_LEN: (usize, usize) = (4, 15);
pub const PASSWORD_LEN: (usize, usize) = (8, 64);
pub const CONTENT_LEN: (usize, usize) = (3, 255);
pub const BIO_MAX: usize = 160;

pub fn length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(AppError::param_error(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    if len > max {
        return Err(AppError::param_error(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn required(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::param_error(format!("{} cannot be empty", field)));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), AppError> {
    length("Password", value, PASSWORD_LEN)?;
    let complex = value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| !c.is_ascii_alphanumeric());
    if !complex {
        return Err(AppError::param_error(
            "Password does not meet complexity requirements",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counts_trimmed_chars() {
        assert!(length("Name", "  ab  ", NAME_LEN).is_err());
        assert!(length("Name", "abc", NAME_LEN).is_ok());
        assert!(length("Name", "ééé", NAME_LEN).is_ok());
        assert!(length("Name", "abcdefghijk", NAME_LEN).is_err());
    }

    #[test]
    fn password_needs_every_character_class() {
        assert!(password("Test@123").is_ok());
        assert!(password("test@123").is_err());
        assert!(password("TEST@123").is_err());
        assert!(password("Test@abc").is_err());
        assert!(password("Test1234").is_err());
        assert!(password("T@1a").is_err());
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required("Username", "   ").is_err());
        assert!(required("Username", "bob").is_ok());
    }
}
