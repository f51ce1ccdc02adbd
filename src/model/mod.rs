pub mod build;
pub mod constraints;
pub mod state;

pub use build::*;
pub use constraints::*;
pub use state::*;
