pub mod canonical;
pub mod edition;
pub mod search;

pub use canonical::*;
pub use edition::*;
pub use search::*;
