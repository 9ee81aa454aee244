use crate::error::AppError;
use crate::users::{repo::UserRepository, repo_types::User};

pub const MAX_NAME_LEN: usize = 50;

pub(crate) fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name too long (max {MAX_NAME_LEN} characters)"
        )));
    }
    Ok(())
}

/// Validates `name` and stores it unchanged.
pub async fn add_user(repo: &dyn UserRepository, name: &str) -> Result<User, AppError> {
    validate_name(name)?;
    repo.insert_user(name).await
}

pub async fn list_users(repo: &dyn UserRepository) -> Result<Vec<User>, AppError> {
    repo.list_users().await
}
