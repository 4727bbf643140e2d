use std::sync::Arc;

use chrono::FixedOffset;

use shared_config::AppConfig;
use shared_database::ClinicStore;

use crate::clock::Clock;

/// Collaborators shared by every scheduling router.
#[derive(Clone)]
pub struct ClinicState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
    pub clock: Arc<dyn Clock>,
}

impl ClinicState {
    pub fn new(config: AppConfig, store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            clock,
        }
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.config.clinic_offset()
    }
}
