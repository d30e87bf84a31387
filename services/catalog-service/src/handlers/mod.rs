pub mod boms;
pub mod health;
pub mod imports;
pub mod parts;

pub use boms::*;
pub use health::*;
pub use imports::*;
pub use parts::*;
