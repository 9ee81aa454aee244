use crate::config::AppConfig;
use crate::db;
use crate::users::repo::{PgUserRepository, UserRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        // The users table is created by the repository on first use.
        let pool = db::connect_pool(&config.database);
        let users = Arc::new(PgUserRepository::new(pool, config.database.op_timeout))
            as Arc<dyn UserRepository>;

        Ok(Self::from_parts(config, users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserRepository>) -> Self {
        Self { config, users }
    }

    #[cfg(test)]
    pub fn fake(users: Arc<dyn UserRepository>) -> Self {
        Self::from_parts(Arc::new(crate::config::test_config()), users)
    }
}
