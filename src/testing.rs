//! Setup and teardown for the HTTP tests generated by `#[backend_test]`.

use std::sync::Arc;

use rocket::{figment::Figment, http::Cookie, local::asynchronous::Client};

use crate::config::Config;
use crate::engine::Caller;
use crate::model::{
    api::auth::{Admin, AuthToken, User, Voter},
    mongodb::Id,
};
use crate::store::Store;
use crate::uploads::MemoryFileStorage;

/// Whatever must be cleaned up once a test finishes.
pub struct Teardown {
    #[cfg(feature = "mongo-tests")]
    db: mongodb::Database,
}

/// Build a fresh backend around a fresh store.
///
/// The in-memory file storage is also managed as `Arc<MemoryFileStorage>` so
/// tests can make uploads fail.
pub async fn setup() -> (Client, Teardown) {
    log4rs_test_utils::test_logging::init_logging_once_for(["cohort_elections"], None, None);

    let (store, teardown) = store().await;
    let files = Arc::new(MemoryFileStorage::new());
    let figment = Figment::from(rocket::Config::debug_default())
        .merge(("jwt_secret", "test-only-secret"))
        .merge(("phase_retry_secs", 1));
    let rocket = crate::rocket_for(figment, store, files.clone()).manage(files);
    let client = Client::tracked(rocket).await.unwrap();
    (client, teardown)
}

pub async fn teardown(teardown: Teardown) {
    #[cfg(feature = "mongo-tests")]
    teardown.db.drop(None).await.unwrap();
    #[cfg(not(feature = "mongo-tests"))]
    let Teardown {} = teardown;
}

#[cfg(not(feature = "mongo-tests"))]
async fn store() -> (Arc<dyn Store>, Teardown) {
    let store = crate::store::memory::MemoryStore::new();
    (Arc::new(store), Teardown {})
}

/// Use a random database name to avoid collisions between tests.
#[cfg(feature = "mongo-tests")]
async fn store() -> (Arc<dyn Store>, Teardown) {
    let uri = std::env::var("ROCKET_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
    let random: u32 = rand::random();
    let db_name = format!("test{random}");
    log::info!("Using database {db_name}");
    let store = crate::store::mongo::MongoStore::connect(&uri, &db_name)
        .await
        .unwrap();
    let db = store.database().clone();
    (Arc::new(store), Teardown { db })
}

/// An administrator identity.
pub fn admin() -> Caller {
    Caller::admin(Id::new(), "Registrar")
}

/// An auth cookie for the given caller, signed with the server's secret.
pub fn cookie_for<U: User>(client: &Client, caller: &Caller) -> Cookie<'static> {
    let config = client.rocket().state::<Config>().unwrap();
    AuthToken::<U>::new(caller).into_cookie(config)
}

pub fn admin_cookie(client: &Client) -> Cookie<'static> {
    cookie_for::<Admin>(client, &admin())
}

pub fn voter_cookie(client: &Client, caller: &Caller) -> Cookie<'static> {
    cookie_for::<Voter>(client, caller)
}
