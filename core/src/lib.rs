pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod settings;
pub mod store;
pub mod trends;
pub mod units;

pub use error::{GlucoseError, GlucoseResult};
pub use service::GlucoseService;
