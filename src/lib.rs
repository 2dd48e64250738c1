pub mod audit;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod metrics;
pub mod product;
pub mod role;
pub mod shared;
pub mod utils;
pub mod visibility;

pub use dashboard::{Dashboard, DashboardBuilder, DashboardSnapshot};
pub use error::{DashboardError, ValidationError};
