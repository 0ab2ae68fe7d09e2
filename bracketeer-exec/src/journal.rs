//! Submission journal for at-most-once order submission.
//!
//! Every ticket is recorded before anything is sent to the broker, and a
//! ticket id can only be recorded once. A ticket that was declined, failed,
//! or only half submitted can therefore never be sent again by accident.
//!
//! # Flow
//!
//! 1. Record ticket (before the first leg is sent)
//! 2. Mark submitting
//! 3. Complete (with result)
//!
//! Tickets left in `Submitting` ended with an unknown broker state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use bracketeer_domain::{OrderAction, ShareQuantity, Symbol, TicketId};

use crate::error::{ExecError, ExecResult};
use crate::executor::BracketSubmission;

// =============================================================================
// Record Types
// =============================================================================

/// Journal entry for one ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Ticket identifier
    pub ticket_id: TicketId,
    /// Instrument symbol
    pub symbol: Symbol,
    /// Entry direction
    pub action: OrderAction,
    /// Shares per leg
    pub quantity: ShareQuantity,
    /// Current state
    pub state: SubmissionState,
    /// When the ticket was recorded
    pub created_at: DateTime<Utc>,
    /// When submission finished (if finished)
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome (if finished)
    pub result: Option<SubmissionResult>,
}

impl SubmissionRecord {
    /// Create a new pending record.
    pub fn new(
        ticket_id: TicketId,
        symbol: Symbol,
        action: OrderAction,
        quantity: ShareQuantity,
    ) -> Self {
        Self {
            ticket_id,
            symbol,
            action,
            quantity,
            state: SubmissionState::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        }
    }

    /// Check if the ticket has not finished yet.
    pub fn is_open(&self) -> bool {
        !matches!(self.state, SubmissionState::Completed)
    }

    /// Check if both legs were accepted.
    pub fn is_success(&self) -> bool {
        matches!(self.state, SubmissionState::Completed)
            && matches!(self.result, Some(SubmissionResult::Submitted(_)))
    }
}

/// State of a ticket in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    /// Recorded, nothing sent yet
    Pending,
    /// Legs are being sent
    Submitting,
    /// Finished (check result)
    Completed,
}

/// Outcome of a ticket's submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubmissionResult {
    /// Entry and stop were both acknowledged
    Submitted(BracketSubmission),
    /// Entry is live, stop is not
    Partial {
        /// Broker id of the live entry order
        entry_order_id: String,
        /// Why the stop leg failed
        reason: String,
    },
    /// Nothing is live
    Failed(String),
}

// =============================================================================
// Submission Journal
// =============================================================================

/// In-memory journal of submitted tickets.
///
/// Lives for the length of one process; one ticket per run is the common
/// case, so nothing is persisted.
pub struct SubmissionJournal {
    records: RwLock<HashMap<TicketId, SubmissionRecord>>,
}

impl SubmissionJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Record a ticket before submission.
    ///
    /// Returns `ExecError::AlreadySubmitted` if the ticket was recorded
    /// before, whatever its state.
    pub fn record(&self, record: SubmissionRecord) -> ExecResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| ExecError::Journal(format!("Failed to acquire write lock: {}", e)))?;

        if records.contains_key(&record.ticket_id) {
            return Err(ExecError::AlreadySubmitted(record.ticket_id));
        }

        records.insert(record.ticket_id, record);
        Ok(())
    }

    /// Get the current record for a ticket.
    pub fn get(&self, ticket_id: TicketId) -> ExecResult<Option<SubmissionRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| ExecError::Journal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(records.get(&ticket_id).cloned())
    }

    /// Mark a ticket as submitting.
    pub fn mark_submitting(&self, ticket_id: TicketId) -> ExecResult<()> {
        self.update(ticket_id, |record| {
            record.state = SubmissionState::Submitting;
            Ok(())
        })
    }

    /// Complete a ticket with its result.
    ///
    /// A result is written once; completing a finished ticket is an error.
    pub fn complete(&self, ticket_id: TicketId, result: SubmissionResult) -> ExecResult<()> {
        self.update(ticket_id, |record| {
            if !record.is_open() {
                return Err(ExecError::Journal(format!(
                    "Ticket already completed: {}",
                    ticket_id
                )));
            }
            record.state = SubmissionState::Completed;
            record.completed_at = Some(Utc::now());
            record.result = Some(result);
            Ok(())
        })
    }

    /// Tickets that never finished (broker state unknown).
    pub fn get_open(&self) -> ExecResult<Vec<SubmissionRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| ExecError::Journal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(records.values().filter(|r| r.is_open()).cloned().collect())
    }

    fn update(
        &self,
        ticket_id: TicketId,
        apply: impl FnOnce(&mut SubmissionRecord) -> ExecResult<()>,
    ) -> ExecResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| ExecError::Journal(format!("Failed to acquire write lock: {}", e)))?;

        let record = records
            .get_mut(&ticket_id)
            .ok_or_else(|| ExecError::Journal(format!("Ticket not found: {}", ticket_id)))?;

        apply(record)
    }
}

impl Default for SubmissionJournal {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
