pub mod allocation;
pub mod dividends;
pub mod engine;
pub mod model;
