pub mod replay;
pub mod scenarios;
