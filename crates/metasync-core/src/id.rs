// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entity identifier codec.
//
// On disk an identifier is a 32-bit unsigned integer. Three high bits (never
// the sign bit) carry the request status of an identifier that is still being
// processed by the server:
//
//   bit 30  INITIAL     request submitted, not yet picked up
//   bit 29  PROCESSING  request under review
//   bit 28  REJECTED    request refused (numeric portion cleared)
//
// In memory the packed form is lifted into `EntityId`, so a finalised server
// id can never be confused with a request number.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};

pub const REQUEST_INITIAL: u32 = 1 << 30;
pub const REQUEST_PROCESSING: u32 = 1 << 29;
pub const REQUEST_REJECTED: u32 = 1 << 28;
pub const REQUEST_MASK: u32 = REQUEST_INITIAL | REQUEST_PROCESSING | REQUEST_REJECTED;

/// Largest numeric value that survives being packed next to a status flag.
pub const NUMERIC_MAX: u32 = REQUEST_REJECTED - 1;

/// Server-side state of a pending registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Initial,
    Processing,
    Rejected,
}

impl RequestState {
    /// The status bit this state occupies in the packed form.
    pub fn bit(&self) -> u32 {
        match self {
            Self::Initial => REQUEST_INITIAL,
            Self::Processing => REQUEST_PROCESSING,
            Self::Rejected => REQUEST_REJECTED,
        }
    }

    /// Lift the status bits of a packed id. Only one bit is ever written; if
    /// a corrupted value carries several, the most final state wins.
    fn from_bits(raw: u32) -> Option<Self> {
        if raw & REQUEST_REJECTED != 0 {
            Some(Self::Rejected)
        } else if raw & REQUEST_PROCESSING != 0 {
            Some(Self::Processing)
        } else if raw & REQUEST_INITIAL != 0 {
            Some(Self::Initial)
        } else {
            None
        }
    }
}

/// Pack `numeric` together with a status flag.
pub fn encode_status(numeric: u32, state: RequestState) -> u32 {
    (numeric & !REQUEST_MASK) | state.bit()
}

/// Numeric value with the status bits cleared.
pub fn decode(raw: u32) -> u32 {
    raw & !REQUEST_MASK
}

/// True iff `raw` is a finalised server id.
pub fn is_valid(raw: u32) -> bool {
    raw != 0 && raw & REQUEST_MASK == 0
}

/// True iff any status bit is set.
pub fn is_pending(raw: u32) -> bool {
    raw & REQUEST_MASK != 0
}

/// Locally cached identifier of a remotely registered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum EntityId {
    /// Nothing registered (or known) yet.
    #[default]
    Unset,
    /// A registration request awaiting its outcome. `request` is the
    /// server's request number (zero for a rejected request).
    Pending { state: RequestState, request: u32 },
    /// Identifier assigned by the server.
    Final(u32),
}

impl EntityId {
    /// A finalised id as assigned by the server; zero maps to `Unset`. An id
    /// reaching into the status bits could not be stored and is refused.
    pub fn final_id(id: u32) -> Result<Self> {
        if id > NUMERIC_MAX {
            return Err(MetaError::Malformed(format!(
                "server id {id} does not fit below the status flags"
            )));
        }
        Ok(if id == 0 { Self::Unset } else { Self::Final(id) })
    }

    pub fn pending(state: RequestState, request: u32) -> Self {
        Self::Pending {
            state,
            request: decode(request),
        }
    }

    /// The marker left behind by a refused request.
    pub fn rejected() -> Self {
        Self::Pending {
            state: RequestState::Rejected,
            request: 0,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        match RequestState::from_bits(raw) {
            Some(RequestState::Rejected) => Self::rejected(),
            Some(state) => Self::Pending {
                state,
                request: decode(raw),
            },
            None if raw == 0 => Self::Unset,
            None => Self::Final(raw),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Unset => 0,
            Self::Pending { state, request } => encode_status(request, state),
            Self::Final(id) => id,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Final(id) if *id != 0)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// The server id, only when finalised. URL construction must go through
    /// this accessor.
    pub fn server_id(&self) -> Option<u32> {
        match self {
            Self::Final(id) if *id != 0 => Some(*id),
            _ => None,
        }
    }
}

impl From<u32> for EntityId {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.to_raw()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Final(id) => write!(f, "{id}"),
            Self::Pending {
                state: RequestState::Rejected,
                ..
            } => write!(f, "rejected"),
            Self::Pending { state, request } => {
                write!(f, "request {request} ({})", format!("{state:?}").to_lowercase())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [RequestState; 3] = [
        RequestState::Initial,
        RequestState::Processing,
        RequestState::Rejected,
    ];

    #[test]
    fn decode_reverses_encode_for_every_flag() {
        for n in [0, 1, 42, 1234, 0x00ff_ffff, NUMERIC_MAX] {
            for state in STATES {
                let raw = encode_status(n, state);
                assert_eq!(decode(raw), n);
                assert!(is_pending(raw));
                assert!(!is_valid(raw));
            }
        }
    }

    #[test]
    fn valid_only_for_nonzero_flagless_ids() {
        assert!(!is_valid(0));
        assert!(is_valid(1));
        assert!(is_valid(NUMERIC_MAX));
        assert!(!is_valid(REQUEST_INITIAL | 7));
        assert!(!is_pending(7));
    }

    #[test]
    fn sign_bit_is_left_alone() {
        let raw = (1 << 31) | REQUEST_PROCESSING | 5;
        assert_eq!(decode(raw), (1 << 31) | 5);
    }

    #[test]
    fn entity_id_lifts_packed_form() {
        assert_eq!(EntityId::from_raw(0), EntityId::Unset);
        assert_eq!(EntityId::from_raw(99), EntityId::Final(99));
        assert_eq!(
            EntityId::from_raw(REQUEST_PROCESSING | 12),
            EntityId::Pending {
                state: RequestState::Processing,
                request: 12
            }
        );
        // A rejected marker never carries a request number.
        assert_eq!(EntityId::from_raw(REQUEST_REJECTED | 12), EntityId::rejected());
    }

    #[test]
    fn entity_id_packs_back() {
        for id in [
            EntityId::Unset,
            EntityId::Final(77),
            EntityId::pending(RequestState::Initial, 3),
            EntityId::rejected(),
        ] {
            assert_eq!(EntityId::from_raw(id.to_raw()), id);
        }
    }

    #[test]
    fn final_ids_stop_below_the_status_bits() {
        assert_eq!(EntityId::final_id(0).expect("zero"), EntityId::Unset);
        let top = EntityId::final_id(NUMERIC_MAX).expect("largest id");
        assert_eq!(EntityId::from_raw(top.to_raw()), EntityId::Final(NUMERIC_MAX));
        assert!(matches!(
            EntityId::final_id(REQUEST_REJECTED),
            Err(MetaError::Malformed(_))
        ));
        assert!(matches!(EntityId::final_id(u32::MAX), Err(MetaError::Malformed(_))));
    }

    #[test]
    fn server_id_only_for_final() {
        assert_eq!(EntityId::Final(5).server_id(), Some(5));
        assert_eq!(EntityId::pending(RequestState::Processing, 5).server_id(), None);
        assert_eq!(EntityId::Unset.server_id(), None);
    }

    #[test]
    fn serde_uses_packed_form() {
        let id = EntityId::pending(RequestState::Initial, 8);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, (REQUEST_INITIAL | 8).to_string());
        let back: EntityId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(EntityId::Final(12).to_string(), "12");
        assert_eq!(
            EntityId::pending(RequestState::Processing, 4).to_string(),
            "request 4 (processing)"
        );
        assert_eq!(EntityId::rejected().to_string(), "rejected");
    }
}
