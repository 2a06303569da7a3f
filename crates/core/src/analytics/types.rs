//! Analytics report types.

use serde::{Deserialize, Serialize};

use crate::ledger::balance::StockSummary;
use crate::ledger::types::{BloodGroup, OrganType, ResourceKind};

/// Blood stock of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodGroupRow {
    /// Blood group.
    pub blood_group: BloodGroup,
    /// Milliliters received.
    pub total_in: i64,
    /// Milliliters dispensed.
    pub total_out: i64,
    /// Milliliters available.
    pub available: i64,
}

/// Organ stock of one organ type, summed across blood groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganRow {
    /// Organ type.
    pub organ_type: OrganType,
    /// Units received.
    pub total_in: i64,
    /// Units dispensed.
    pub total_out: i64,
    /// Units available.
    pub available: i64,
}

/// Totals of a resource kind across every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotals {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Sum of intakes.
    pub total_in: i64,
    /// Sum of dispenses.
    pub total_out: i64,
    /// Sum of per-key available stock.
    pub available: i64,
}

macro_rules! impl_add_summary {
    ($row:ty, $field:ident: $ty:ty) => {
        impl $row {
            /// Zero-filled row.
            #[must_use]
            pub const fn empty($field: $ty) -> Self {
                Self {
                    $field,
                    total_in: 0,
                    total_out: 0,
                    available: 0,
                }
            }

            /// Adds one key's summary to the row.
            pub fn add(&mut self, summary: &StockSummary) {
                self.total_in = self.total_in.saturating_add(summary.total_in);
                self.total_out = self.total_out.saturating_add(summary.total_out);
                self.available = self.available.saturating_add(summary.available);
            }
        }
    };
}

impl_add_summary!(BloodGroupRow, blood_group: BloodGroup);
impl_add_summary!(OrganRow, organ_type: OrganType);
impl_add_summary!(KindTotals, kind: ResourceKind);
