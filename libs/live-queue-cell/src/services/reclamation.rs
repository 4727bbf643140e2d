use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{ClinicStore, SlotClaim};
use shared_models::{
    OpenSlot, QueueItem, QueueStatus, SchedulingError, SchedulingResult, Unavailable,
};
use shared_utils::{Clock, ClinicState};

use crate::models::{NoShowReport, OfferDecision, OfferOutcome, WalkInAssignment, WalkInCandidate};
use crate::services::ordering::sort_queue;

/// A no-show only frees a slot when the item held an appointment time.
pub fn frees_slot(item: &QueueItem) -> bool {
    item.is_booked() && item.appointment_at.is_some()
}

/// Booked, still waiting for their consultation, and not yet declined this slot.
pub fn is_booked_candidate(slot: &OpenSlot, item: &QueueItem) -> bool {
    item.is_booked()
        && item.department_id == slot.department_id
        && item.status.is_pre_consultation()
        && item.ticket != slot.freed_from_ticket
        && !slot.was_declined_by(&item.ticket)
}

fn slot_gone(id: Uuid) -> SchedulingError {
    SchedulingError::Conflict(format!("open slot {} is gone", id))
}

/// Re-offers appointment times vacated by no-shows.
pub struct SlotReclamationService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl SlotReclamationService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    async fn queue_item(&self, ticket: &str) -> SchedulingResult<QueueItem> {
        self.store
            .read_queue_item(ticket)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("ticket {}", ticket)))
    }

    async fn open_slot(&self, id: Uuid) -> SchedulingResult<OpenSlot> {
        self.store
            .read_open_slot(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("open slot {}", id)))
    }

    /// Slots are consumed on acceptance, so a missing one during an offer means it was taken.
    async fn live_slot(&self, id: Uuid) -> SchedulingResult<OpenSlot> {
        self.store.read_open_slot(id).await?.ok_or_else(|| slot_gone(id))
    }

    /// Marks a booked ticket as a no-show and opens its appointment time. Not idempotent.
    pub async fn report_no_show(&self, ticket: &str) -> SchedulingResult<NoShowReport> {
        let item = self.queue_item(ticket).await?;

        let Some(appointment_at) = item.appointment_at.filter(|_| item.is_booked()) else {
            return Err(SchedulingError::InvalidInput(format!(
                "ticket {} has no booked appointment to free",
                ticket
            )));
        };
        if !item.status.is_active() {
            return Err(SchedulingError::Conflict(format!(
                "ticket {} is already {}",
                ticket, item.status
            )));
        }

        let slot = OpenSlot::new(item.department_id, appointment_at, ticket, self.clock.now());
        let (item, open_slot) = self.store.record_no_show(ticket, item.status, slot).await?;

        info!(
            "Ticket {} marked no-show, opened slot {} at {}",
            ticket, open_slot.id, open_slot.appointment_at
        );
        Ok(NoShowReport { item, open_slot })
    }

    pub async fn list_open_slots(&self, department_id: Uuid) -> SchedulingResult<Vec<OpenSlot>> {
        self.store.list_open_slots(department_id).await
    }

    async fn candidates_for(&self, slot: &OpenSlot, doctor_id: Option<Uuid>) -> SchedulingResult<Vec<QueueItem>> {
        let mut candidates: Vec<QueueItem> = self
            .store
            .list_active_queue_items(slot.department_id, doctor_id)
            .await?
            .into_iter()
            .filter(|item| is_booked_candidate(slot, item))
            .collect();
        sort_queue(&mut candidates);
        Ok(candidates)
    }

    /// Head of the offer list, or `None` once only the walk-in fallback is left.
    pub async fn next_candidate(&self, slot_id: Uuid, doctor_id: Option<Uuid>) -> SchedulingResult<Option<QueueItem>> {
        let slot = self.open_slot(slot_id).await?;
        let next = self.candidates_for(&slot, doctor_id).await?.into_iter().next();
        debug!(
            "Next candidate for slot {}: {:?}",
            slot_id,
            next.as_ref().map(|i| i.ticket.as_str())
        );
        Ok(next)
    }

    /// `doctor_id` scopes the offer to one doctor's patients, as in [`Self::next_candidate`].
    pub async fn resolve_offer(
        &self,
        slot_id: Uuid,
        ticket: &str,
        decision: OfferDecision,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<OfferOutcome> {
        let slot = self.live_slot(slot_id).await?;
        let item = self.queue_item(ticket).await?;

        let in_view = doctor_id.is_none() || item.assigned_doctor_id == doctor_id;
        if !in_view || !is_booked_candidate(&slot, &item) {
            return Err(SchedulingError::Conflict(format!(
                "ticket {} is not an open candidate for slot {}",
                ticket, slot_id
            )));
        }

        match decision {
            OfferDecision::Accept => self.accept(slot, item).await,
            OfferDecision::Decline => self.decline(slot, item, doctor_id).await,
        }
    }

    async fn accept(&self, slot: OpenSlot, item: QueueItem) -> SchedulingResult<OfferOutcome> {
        let vacated = item
            .appointment_at
            .filter(|at| *at != slot.appointment_at)
            .map(|at| OpenSlot::new(item.department_id, at, &item.ticket, self.clock.now()));

        let claim = SlotClaim {
            open_slot_id: slot.id,
            ticket: item.ticket.clone(),
            expected_status: item.status,
            expected_appointment_at: item.appointment_at,
            new_status: QueueStatus::Waiting,
            vacated,
        };

        let Some(claimed) = self.store.claim_open_slot(claim).await? else {
            warn!("Ticket {} lost the race for slot {}", item.ticket, slot.id);
            return Err(slot_gone(slot.id));
        };

        info!(
            "Ticket {} accepted slot {} at {}",
            claimed.item.ticket, claimed.slot.id, claimed.slot.appointment_at
        );
        if let Some(vacated) = &claimed.vacated {
            info!("Slot {} opened for vacated time {}", vacated.id, vacated.appointment_at);
        }

        Ok(OfferOutcome::Accepted {
            slot: claimed.slot,
            item: claimed.item,
            vacated: claimed.vacated,
        })
    }

    async fn decline(&self, slot: OpenSlot, item: QueueItem, doctor_id: Option<Uuid>) -> SchedulingResult<OfferOutcome> {
        let slot = self
            .store
            .record_declined_offer(slot.id, &item.ticket)
            .await?
            .ok_or_else(|| slot_gone(slot.id))?;
        info!("Ticket {} declined slot {}", item.ticket, slot.id);

        let next_candidate = self.candidates_for(&slot, doctor_id).await?.into_iter().next();
        if next_candidate.is_none() {
            info!("Slot {} has no booked candidates left, walk-ins may take it", slot.id);
        }

        Ok(OfferOutcome::Declined { slot, next_candidate })
    }

    /// Walk-ins who could take the slot: its own department first, then the rest flagged cross-department.
    pub async fn walk_in_candidates(&self, slot_id: Uuid) -> SchedulingResult<Vec<WalkInCandidate>> {
        let slot = self.open_slot(slot_id).await?;

        let (mut same, mut other): (Vec<QueueItem>, Vec<QueueItem>) = self
            .store
            .list_active_walk_ins(None)
            .await?
            .into_iter()
            .filter(|item| item.status.is_pre_consultation())
            .partition(|item| item.department_id == slot.department_id);
        sort_queue(&mut same);
        sort_queue(&mut other);

        Ok(same
            .into_iter()
            .map(|item| WalkInCandidate { item, cross_department: false })
            .chain(other.into_iter().map(|item| WalkInCandidate { item, cross_department: true }))
            .collect())
    }

    /// Manual fallback once every booked candidate in the view has declined.
    pub async fn assign_to_walk_in(
        &self,
        slot_id: Uuid,
        ticket: &str,
        allow_cross_department: bool,
        doctor_id: Option<Uuid>,
    ) -> SchedulingResult<WalkInAssignment> {
        let slot = self.live_slot(slot_id).await?;

        if !self.candidates_for(&slot, doctor_id).await?.is_empty() {
            return Err(SchedulingError::NotAvailable(Unavailable::BookedCandidatesRemain));
        }

        let item = self.queue_item(ticket).await?;
        if !item.is_walk_in() || !item.status.is_pre_consultation() {
            return Err(SchedulingError::InvalidInput(format!(
                "ticket {} is not a waiting walk-in",
                ticket
            )));
        }

        let cross_department = item.department_id != slot.department_id;
        if cross_department && !allow_cross_department {
            return Err(SchedulingError::InvalidInput(format!(
                "ticket {} belongs to another department; cross-department assignment must be allowed explicitly",
                ticket
            )));
        }

        let vacated = item
            .appointment_at
            .filter(|at| *at != slot.appointment_at)
            .map(|at| OpenSlot::new(item.department_id, at, &item.ticket, self.clock.now()));

        let claim = SlotClaim {
            open_slot_id: slot.id,
            ticket: item.ticket.clone(),
            expected_status: item.status,
            expected_appointment_at: item.appointment_at,
            new_status: item.status,
            vacated,
        };

        let Some(claimed) = self.store.claim_open_slot(claim).await? else {
            warn!("Walk-in {} lost the race for slot {}", ticket, slot.id);
            return Err(slot_gone(slot.id));
        };

        if cross_department {
            warn!(
                "Slot {} of department {} assigned across departments to walk-in {}",
                claimed.slot.id, claimed.slot.department_id, ticket
            );
        } else {
            info!("Slot {} assigned to walk-in {}", claimed.slot.id, ticket);
        }

        Ok(WalkInAssignment {
            slot: claimed.slot,
            item: claimed.item,
            cross_department,
            vacated: claimed.vacated,
        })
    }
}
