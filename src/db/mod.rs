pub mod dtr_repo;
pub mod pool;

pub use dtr_repo::PgDtrStore;
pub use pool::create_pool;
