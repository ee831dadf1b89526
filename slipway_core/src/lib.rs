pub mod modules;

pub use modules::api;
pub use modules::context;
pub use modules::indexer;
pub use modules::launcher;
pub use modules::restorable;
pub use modules::schema;
pub use modules::state;
pub use modules::template;

pub use slipway_model as model;
