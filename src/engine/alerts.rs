use std::fmt;

use serde::{Deserialize, Serialize};

use crate::limits::*;
use crate::model::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

/// Inventory alert. Each variant carries the inputs that tripped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    LowAvailability {
        availability_rate: f64,
        total_available: u32,
        total_rooms: u32,
    },
    FullyBooked {
        total_rooms: u32,
        total_occupied: u32,
        total_unavailable: u32,
    },
    HighDemand {
        occupancy_rate: f64,
        total_available: u32,
        total_rooms: u32,
    },
    OverbookingRisk {
        pending_bookings: usize,
        total_available: u32,
    },
}

impl Alert {
    pub fn severity(&self) -> Severity {
        match self {
            Alert::LowAvailability { .. } => Severity::High,
            Alert::FullyBooked { .. } | Alert::OverbookingRisk { .. } => Severity::Critical,
            Alert::HighDemand { .. } => Severity::Medium,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Alert::LowAvailability { .. } => "low_availability",
            Alert::FullyBooked { .. } => "fully_booked",
            Alert::HighDemand { .. } => "high_demand",
            Alert::OverbookingRisk { .. } => "overbooking_risk",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::LowAvailability {
                availability_rate,
                total_available,
                total_rooms,
            } => write!(
                f,
                "low availability: {total_available} of {total_rooms} rooms free ({availability_rate}%)"
            ),
            Alert::FullyBooked { total_rooms, .. } => {
                write!(f, "fully booked: none of {total_rooms} rooms free")
            }
            Alert::HighDemand {
                occupancy_rate,
                total_available,
                ..
            } => write!(
                f,
                "high demand: occupancy at {occupancy_rate}%, {total_available} rooms left"
            ),
            Alert::OverbookingRisk {
                pending_bookings,
                total_available,
            } => write!(
                f,
                "overbooking risk: {pending_bookings} pending bookings for {total_available} free rooms"
            ),
        }
    }
}

/// Apply every threshold rule independently. Pure; dispatch is the caller's job.
pub fn evaluate(stats: &Statistics, pending_bookings: usize) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if stats.availability_rate < LOW_AVAILABILITY_RATE && stats.total_available > 0 {
        alerts.push(Alert::LowAvailability {
            availability_rate: stats.availability_rate,
            total_available: stats.total_available,
            total_rooms: stats.total_rooms,
        });
    }
    if stats.total_available == 0 && stats.total_rooms > 0 {
        alerts.push(Alert::FullyBooked {
            total_rooms: stats.total_rooms,
            total_occupied: stats.total_occupied,
            total_unavailable: stats.total_unavailable,
        });
    }
    if stats.occupancy_rate > HIGH_DEMAND_OCCUPANCY_RATE && stats.occupancy_rate < 100.0 {
        alerts.push(Alert::HighDemand {
            occupancy_rate: stats.occupancy_rate,
            total_available: stats.total_available,
            total_rooms: stats.total_rooms,
        });
    }
    if pending_bookings > stats.total_available as usize {
        alerts.push(Alert::OverbookingRisk {
            pending_bookings,
            total_available: stats.total_available,
        });
    }

    alerts
}
