pub mod analysis;
pub mod constraints;
pub mod frontier;
pub mod optimizer;
