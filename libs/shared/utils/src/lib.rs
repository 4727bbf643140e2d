pub mod clock;
pub mod state;
pub mod test_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use state::ClinicState;
