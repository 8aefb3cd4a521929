//! Shipment read-model types

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handover::HandoverStatus;

/// Which leg an outstanding list looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutstandingStage {
    /// Handed to a driver and not yet checked in
    Dpk,
    /// Not yet received back by delivery
    Delivery,
}

impl OutstandingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutstandingStage::Dpk => "dpk",
            OutstandingStage::Delivery => "delivery",
        }
    }

    /// Status filter applied to the active tracking record
    pub fn filter(&self) -> StageFilter {
        match self {
            OutstandingStage::Dpk => StageFilter::Is(HandoverStatus::DpkToDriver),
            OutstandingStage::Delivery => StageFilter::IsNot(HandoverStatus::DelFromDpk),
        }
    }
}

impl fmt::Display for OutstandingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutstandingStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dpk" => Ok(OutstandingStage::Dpk),
            "delivery" => Ok(OutstandingStage::Delivery),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFilter {
    Is(HandoverStatus),
    IsNot(HandoverStatus),
}

/// Half-open movement-date window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(chrono::Days::new(days)).unwrap_or(date)
}

fn add_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}

impl DateRange {
    /// Resolve the optional `date_from` / `date_to` query values.
    ///
    /// - neither given: the month containing `today`
    /// - only `date_from`: that single day
    /// - `date_to` is inclusive
    /// - an unparsable `date_from` falls back to the month start, an
    ///   unparsable `date_to` to one month after `from`
    pub fn resolve(date_from: Option<&str>, date_to: Option<&str>, today: NaiveDate) -> Self {
        let date_from = date_from.filter(|s| !s.trim().is_empty());
        let date_to = date_to.filter(|s| !s.trim().is_empty());
        let month_start = today.with_day(1).unwrap_or(today);

        let from = date_from.and_then(parse_day).unwrap_or(month_start);
        let to = match date_to {
            Some(raw) => match parse_day(raw) {
                Some(day) => add_days(day, 1),
                None => add_month(from),
            },
            None if date_from.is_none() => add_month(from),
            None => add_days(from, 1),
        };
        Self { from, to }
    }
}

/// One row of an outstanding list
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OutstandingShipment {
    pub shipment_id: i64,
    pub document_no: String,
    pub movement_date: Option<NaiveDate>,
    pub customer_name: String,
    #[schema(value_type = String, example = "HO: DPK_TO_DRIVER")]
    pub status: HandoverStatus,
    pub driver_name: Option<String>,
    pub vehicle_name: Option<String>,
}

/// Driver / vehicle correction for a handed-over shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverVehicleEdit {
    pub shipment_id: i64,
    pub driver_id: i64,
    pub vehicle_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EditOutcome {
    pub shipment_id: i64,
    pub tracking_id: i64,
    /// `DPK_TO_DRIVER` events rewritten
    pub events_updated: u64,
}
