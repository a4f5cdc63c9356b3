pub mod loader;
pub mod schema;

pub use loader::{load_engine_data, DataLoadError, EngineData};
