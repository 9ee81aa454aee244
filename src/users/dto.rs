use serde::Deserialize;

/// Request body for `POST /adduser`.
#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub name: String,
}
