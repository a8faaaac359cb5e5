// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    DB_FILE_NAME, DEFAULT_CONFIG_DIR, default_db_path, expand_path, fetch_failure_message,
    init_store, render_recommendations, resolve_db_path,
};
