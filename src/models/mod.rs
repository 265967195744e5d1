pub mod cell;
pub mod listing;

pub use cell::*;
pub use listing::*;
