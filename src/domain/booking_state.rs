use crate::domain::model::wire_enum;
use crate::utils::error::{MiddlewareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

wire_enum!(
    /// Life-cycle state of a booking.
    ///
    /// `CANCELLED`, `ABORTED` and `FINISHED` are terminal. `UPDATEREQUESTED`
    /// may move to any state, including itself and the terminal ones.
    BookingState, "booking state" {
        New => "NEW",
        Booked => "BOOKED",
        Cancelled => "CANCELLED",
        UpdateRequested => "UPDATEREQUESTED",
        Started => "STARTED",
        Aborted => "ABORTED",
        Finished => "FINISHED",
        Paused => "PAUSED",
    }
);

/// 判斷狀態轉換是否合法；`next` 缺席時一律不合法
pub fn can_advance(current: BookingState, next: Option<BookingState>) -> bool {
    next.is_some_and(|next| current.can_advance_to(next))
}

impl BookingState {
    pub fn can_advance_to(self, next: BookingState) -> bool {
        use BookingState::*;

        match self {
            New => matches!(next, Booked | Started | UpdateRequested),
            Booked => matches!(next, Cancelled | Started | UpdateRequested),
            Started => matches!(next, Paused | Aborted | Finished | UpdateRequested),
            Paused => matches!(next, Started | Aborted | Finished | UpdateRequested),
            // 更新請求可轉到任何狀態
            UpdateRequested => true,
            // 終止狀態
            Cancelled | Aborted | Finished => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingState::Cancelled | BookingState::Aborted | BookingState::Finished
        )
    }

    /// Rejects an illegal transition with a typed error. Applying the new
    /// state is left to the caller.
    pub fn ensure_can_advance(self, next: BookingState) -> Result<()> {
        if self.can_advance_to(next) {
            Ok(())
        } else {
            Err(MiddlewareError::InvalidTransitionError {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}
