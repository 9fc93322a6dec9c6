pub mod books;

use std::sync::Arc;

use bookshelf_kernel::ModuleRegistry;
use sqlx::SqlitePool;

use books::repository::SqlxBookRepository;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, pool: &SqlitePool) -> anyhow::Result<()> {
    let books = Arc::new(SqlxBookRepository::new(pool.clone()));
    registry.register_custom(books::create_module(books))?;
    Ok(())
}
