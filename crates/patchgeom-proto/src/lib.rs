pub mod saved_model;

pub use saved_model::*;

/// File name of the serialized `SavedModel` inside a graph bundle.
pub const SAVED_MODEL_FILE: &str = "saved_model.pb";

/// Directory holding the checkpointed weights next to [`SAVED_MODEL_FILE`].
pub const VARIABLES_DIR: &str = "variables";
