pub mod heston;
pub mod monte_carlo;
pub mod runtime;
pub mod stats;
