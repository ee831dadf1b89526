pub mod api;
pub mod context;
pub mod indexer;
pub mod launcher;
pub mod restorable;
pub mod schema;
pub mod state;
pub mod template;
