use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::error::AppError;
use crate::graphql::{build_schema, GainsSchema};
use crate::source::{FeedSource, FixtureFeedSource, SqliteFeedSource};

pub type DbPool = Pool<SqliteConnectionManager>;

/// How the process was composed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Demo,
}

impl Mode {
    /// Fails with `DemoMode` unless the backend is live.
    pub fn require_live(self) -> Result<(), AppError> {
        match self {
            Mode::Live => Ok(()),
            Mode::Demo => Err(AppError::DemoMode),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub mode: Mode,
    /// Present only in live mode
    pub verifier: Option<Arc<TokenVerifier>>,
    pub source: Arc<dyn FeedSource>,
    pub graphql_schema: GainsSchema,
}

impl AppState {
    /// Composes the state for `config`. Demo mode swaps the feed source for
    /// fixtures and drops token verification.
    pub fn new(config: Config, db: DbPool) -> anyhow::Result<Self> {
        let secret = config
            .auth
            .jwt_secret
            .clone()
            .filter(|_| !config.is_demo());

        let (mode, verifier, source) = match secret {
            Some(secret) => {
                let verifier = Arc::new(TokenVerifier::new(secret.as_bytes()));
                let source: Arc<dyn FeedSource> = Arc::new(SqliteFeedSource::new(db.clone()));
                (Mode::Live, Some(verifier), source)
            }
            None => {
                let source: Arc<dyn FeedSource> = Arc::new(FixtureFeedSource::load()?);
                (Mode::Demo, None, source)
            }
        };

        Ok(Self {
            db,
            config,
            mode,
            verifier,
            source,
            graphql_schema: build_schema(),
        })
    }
}
