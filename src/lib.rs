pub mod aggregate;
pub mod availability;
pub mod config;
pub mod date;
pub mod harness;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod price;
pub mod store;
