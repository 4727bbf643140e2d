pub mod supabase;
pub mod store;
pub mod memory;
pub mod supabase_store;

pub use store::{ClaimedSlot, ClinicStore, SlotClaim, StatusUpdate, WeekWriteGuard};
pub use memory::InMemoryClinicStore;
pub use supabase_store::SupabaseClinicStore;
