use std::path::{Path, PathBuf};

use rusqlite::Connection;

mod blobs;
mod schema;
mod store;

pub use blobs::SqliteBlobStore;
pub use schema::init_sqlite;
pub use store::SqliteGraphStore;

#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<Connection, String> {
        Connection::open(&self.path).map_err(|error| format!("open sqlite: {error}"))
    }
}
