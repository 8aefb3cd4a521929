//! Handover Status Definitions
//!
//! The custody chain is a closed set of statuses. Wire tokens keep the
//! `HO:` (handover) / `RE:` (receipt) prefixes used by the dashboards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Custody chain statuses
///
/// ```text
/// DEL_TO_DPK → DPK_FROM_DEL → DPK_TO_DRIVER → DRIVER_CHECKIN → DRIVER_CHECKOUT
///   → DPK_FROM_DRIVER → DPK_TO_DEL → DEL_FROM_DPK → DEL_TO_MKT → MKT_FROM_DEL
///   → MKT_TO_FAT → FAT_FROM_MKT
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoverStatus {
    /// Delivery hands documents to the depot (entry state)
    DelToDpk,
    /// Depot confirms receipt from delivery
    DpkFromDel,
    /// Depot hands documents to a driver
    DpkToDriver,
    /// Driver arrives at the customer
    DriverCheckin,
    /// Driver leaves the customer
    DriverCheckout,
    /// Depot confirms receipt back from the driver
    DpkFromDriver,
    /// Depot hands documents back to delivery
    DpkToDel,
    /// Delivery confirms receipt from the depot
    DelFromDpk,
    /// Delivery hands documents to marketing
    DelToMkt,
    /// Marketing confirms receipt from delivery
    MktFromDel,
    /// Marketing hands documents to finance
    MktToFat,
    /// Finance confirms receipt from marketing (final state)
    FatFromMkt,
}

/// How a transition computes the vehicle/driver/customer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Keep vehicle and driver from the record, clear the customer
    CarryForward,
    /// Vehicle and driver from the request, clear the customer
    AssignDriver,
    /// Vehicle, driver and customer from the request
    CheckIn,
    /// Vehicle and driver from the request, customer from the request or the record
    CheckOut,
}

/// What cancelling an outstanding handover does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    /// Remove the record and its events, release the shipment
    HardDelete,
    /// Roll the record back to the given status
    RevertTo(HandoverStatus),
}

impl HandoverStatus {
    /// All statuses in chain order
    pub const ALL: [HandoverStatus; 12] = [
        HandoverStatus::DelToDpk,
        HandoverStatus::DpkFromDel,
        HandoverStatus::DpkToDriver,
        HandoverStatus::DriverCheckin,
        HandoverStatus::DriverCheckout,
        HandoverStatus::DpkFromDriver,
        HandoverStatus::DpkToDel,
        HandoverStatus::DelFromDpk,
        HandoverStatus::DelToMkt,
        HandoverStatus::MktFromDel,
        HandoverStatus::MktToFat,
        HandoverStatus::FatFromMkt,
    ];

    /// Status a shipment enters when tracking starts
    pub const ENTRY: HandoverStatus = HandoverStatus::DelToDpk;

    /// Wire token (stored in `tracking_tb.status` and `tracking_events_tb.event_type`)
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoverStatus::DelToDpk => "HO: DEL_TO_DPK",
            HandoverStatus::DpkFromDel => "RE: DPK_FROM_DEL",
            HandoverStatus::DpkToDriver => "HO: DPK_TO_DRIVER",
            HandoverStatus::DriverCheckin => "HO: DRIVER_CHECKIN",
            HandoverStatus::DriverCheckout => "HO: DRIVER_CHECKOUT",
            HandoverStatus::DpkFromDriver => "RE: DPK_FROM_DRIVER",
            HandoverStatus::DpkToDel => "HO: DPK_TO_DEL",
            HandoverStatus::DelFromDpk => "RE: DEL_FROM_DPK",
            HandoverStatus::DelToMkt => "HO: DEL_TO_MKT",
            HandoverStatus::MktFromDel => "RE: MKT_FROM_DEL",
            HandoverStatus::MktToFat => "HO: MKT_TO_FAT",
            HandoverStatus::FatFromMkt => "RE: FAT_FROM_MKT",
        }
    }

    /// Token without the `HO: ` / `RE: ` prefix
    pub fn token(&self) -> &'static str {
        &self.as_str()[4..]
    }

    pub fn field_policy(&self) -> FieldPolicy {
        match self {
            HandoverStatus::DpkToDriver => FieldPolicy::AssignDriver,
            HandoverStatus::DriverCheckin => FieldPolicy::CheckIn,
            HandoverStatus::DriverCheckout => FieldPolicy::CheckOut,
            _ => FieldPolicy::CarryForward,
        }
    }

    /// Receipt confirmations that materialize a bundle for the batch
    #[inline]
    pub fn creates_bundle(&self) -> bool {
        matches!(
            self,
            HandoverStatus::DpkFromDel
                | HandoverStatus::DelFromDpk
                | HandoverStatus::MktFromDel
                | HandoverStatus::FatFromMkt
        )
    }

    /// Bundle document number prefix
    pub fn document_prefix(&self) -> &'static str {
        match self {
            HandoverStatus::DpkFromDel => "HOPT",
            HandoverStatus::DelFromDpk => "HITP",
            HandoverStatus::MktFromDel => "HIPM",
            HandoverStatus::FatFromMkt => "HIMF",
            _ => "RECV",
        }
    }

    /// Check-in and check-out are broadcast to the driver channel
    #[inline]
    pub fn notifies_driver_channel(&self) -> bool {
        matches!(
            self,
            HandoverStatus::DriverCheckin | HandoverStatus::DriverCheckout
        )
    }

    /// Status a record must hold before entering `self`
    pub fn predecessor(&self) -> Option<HandoverStatus> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        idx.checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Whether a record currently in `current` may move to `self`
    pub fn can_follow(&self, current: HandoverStatus) -> bool {
        self.predecessor() == Some(current)
    }

    /// Cancellation table for outstanding handovers
    ///
    /// Only handovers (`HO:`) that the receiving side has not confirmed yet can be
    /// cancelled. Returns `None` for anything else.
    pub fn cancellation(&self) -> Option<CancelAction> {
        match self {
            HandoverStatus::DelToDpk => Some(CancelAction::HardDelete),
            HandoverStatus::DpkToDriver => Some(CancelAction::RevertTo(HandoverStatus::DpkFromDel)),
            HandoverStatus::DpkToDel => Some(CancelAction::RevertTo(HandoverStatus::DpkFromDriver)),
            HandoverStatus::DelToMkt => Some(CancelAction::RevertTo(HandoverStatus::DelFromDpk)),
            HandoverStatus::MktToFat => Some(CancelAction::RevertTo(HandoverStatus::MktFromDel)),
            _ => None,
        }
    }

    /// Parse a wire token, with or without its `HO:` / `RE:` prefix
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let bare = match s.get(..3) {
            Some(p) if p.eq_ignore_ascii_case("HO:") || p.eq_ignore_ascii_case("RE:") => {
                s[3..].trim_start()
            }
            _ => s,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.token().eq_ignore_ascii_case(bare))
    }
}

impl fmt::Display for HandoverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error for an unknown status token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown handover status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for HandoverStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandoverStatus::parse(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl Serialize for HandoverStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HandoverStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
