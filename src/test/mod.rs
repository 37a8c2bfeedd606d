mod db;
mod routes;
mod utils;

pub use utils::{test_db, test_utils};
