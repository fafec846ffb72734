pub mod linalg;
pub mod metrics;
pub mod returns;
pub mod statistics;
