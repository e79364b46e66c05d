pub mod coordinates;
pub mod period;
pub mod program;
pub mod site;
pub mod target;
pub mod time;

pub use coordinates::*;
pub use period::*;
pub use program::*;
pub use site::*;
pub use target::*;
pub use time::*;
