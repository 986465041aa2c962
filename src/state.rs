use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::accounts::DynAccountRepository;
use crate::config::Config;
use crate::graphql::BhimdattaSchema;
use crate::problems::DynProblemRepository;
use crate::storage::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub problems: DynProblemRepository,
    pub accounts: DynAccountRepository,
    pub media: MediaStore,
    pub graphql_schema: BhimdattaSchema,
}
