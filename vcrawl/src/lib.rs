// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    apply_selection, build_client, default_batch_folder, expand_path, export_selection,
    pending_jobs,
};
