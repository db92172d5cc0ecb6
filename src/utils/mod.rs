//! contains utils used in file exploration, intermediate tables and parameters

pub mod files;
pub mod parameters;
pub mod tables;

pub use files::*;
pub use parameters::*;
pub use tables::*;
