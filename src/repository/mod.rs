pub mod config_store;
pub mod listing;

pub use config_store::{ConfigItem, ConfigStore};
pub use listing::ListingRepository;
