mod settings;

pub use settings::{ApiConfig, HubConfig, Settings};
