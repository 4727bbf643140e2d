pub mod ordering;
pub mod eta;
pub mod status;
pub mod reclamation;

pub use ordering::*;
pub use eta::*;
pub use status::*;
pub use reclamation::*;
