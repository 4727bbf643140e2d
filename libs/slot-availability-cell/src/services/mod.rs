pub mod calendar;
pub mod week;
pub mod booking_expiry;

pub use calendar::*;
pub use week::*;
pub use booking_expiry::*;
