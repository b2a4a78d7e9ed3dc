// Utility functions

pub mod deadline;
pub mod logger;

pub use deadline::*;
pub use logger::*;
