//! Persistence layer. `Database` owns the pool; each submodule adds an
//! `impl Database` block grouped by the entity it queries.

pub mod courses;
pub mod heatmap;
mod imports;
mod rankings;
pub mod runs;
mod sessions;
mod users;

use sqlx::PgPool;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
