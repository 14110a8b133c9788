use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::payroll::month::YearMonth;

/// Who signed a stage off, and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signoff {
    pub by: Option<u64>,
    pub at: DateTime<Utc>,
}

impl Signoff {
    fn from_columns(by: Option<u64>, at: Option<DateTime<Utc>>) -> Option<Self> {
        at.map(|at| Signoff { by, at })
    }
}

/// Progress of a payroll cycle. The sign-off stamps live inside the variant,
/// so a status can never disagree with its timestamps.
///
/// Finance may sign off without a prior HR sign-off, hence `hr` is optional
/// once finalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
    HrSigned { hr: Signoff },
    Finalized { hr: Option<Signoff>, finance: Signoff },
}

/// Flat name of a [`CycleStatus`], as stored in the `status` column.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    Pending,
    HrSigned,
    Finalized,
}

impl CycleStatus {
    /// Finance stamp wins, then HR stamp; the stored status column is not consulted.
    pub fn from_signoffs(hr: Option<Signoff>, finance: Option<Signoff>) -> Self {
        match (hr, finance) {
            (hr, Some(finance)) => CycleStatus::Finalized { hr, finance },
            (Some(hr), None) => CycleStatus::HrSigned { hr },
            (None, None) => CycleStatus::Pending,
        }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            CycleStatus::Pending => StatusKind::Pending,
            CycleStatus::HrSigned { .. } => StatusKind::HrSigned,
            CycleStatus::Finalized { .. } => StatusKind::Finalized,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, CycleStatus::Finalized { .. })
    }

    pub fn hr_signoff(&self) -> Option<&Signoff> {
        match self {
            CycleStatus::Pending => None,
            CycleStatus::HrSigned { hr } => Some(hr),
            CycleStatus::Finalized { hr, .. } => hr.as_ref(),
        }
    }

    pub fn finance_signoff(&self) -> Option<&Signoff> {
        match self {
            CycleStatus::Finalized { finance, .. } => Some(finance),
            _ => None,
        }
    }

    /// Stamps the HR stage. A finalized cycle keeps its finance stamp.
    pub fn with_hr_signoff(&self, hr: Signoff) -> Self {
        match self {
            CycleStatus::Finalized { finance, .. } => CycleStatus::Finalized {
                hr: Some(hr),
                finance: finance.clone(),
            },
            _ => CycleStatus::HrSigned { hr },
        }
    }

    pub fn with_finance_signoff(&self, finance: Signoff) -> Self {
        CycleStatus::Finalized {
            hr: self.hr_signoff().cloned(),
            finance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reversion {
    pub by: Option<u64>,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// One row per (month, year); created lazily, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollCycle {
    pub id: u64,
    pub period: YearMonth,
    pub status: CycleStatus,
    pub reversion: Option<Reversion>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PayrollCycle {
    pub fn is_finalized(&self) -> bool {
        self.status.is_finalized()
    }
}

/// Column layout of `monthly_payrolls`.
#[derive(Debug, sqlx::FromRow)]
pub struct PayrollCycleRow {
    pub id: u64,
    pub month: u32,
    pub year: i32,
    pub status: String,
    pub hr_signoff_by: Option<u64>,
    pub hr_signoff_at: Option<DateTime<Utc>>,
    pub finance_signoff_by: Option<u64>,
    pub finance_signoff_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<u64>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reversion_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<PayrollCycleRow> for PayrollCycle {
    fn from(row: PayrollCycleRow) -> Self {
        let status = CycleStatus::from_signoffs(
            Signoff::from_columns(row.hr_signoff_by, row.hr_signoff_at),
            Signoff::from_columns(row.finance_signoff_by, row.finance_signoff_at),
        );

        if status.kind().as_ref() != row.status {
            tracing::debug!(
                cycle_id = row.id,
                stored = %row.status,
                derived = %status.kind(),
                "Stored cycle status disagrees with sign-off stamps"
            );
        }

        let reversion = row.reverted_at.map(|at| Reversion {
            by: row.reverted_by,
            at,
            reason: row.reversion_reason.unwrap_or_default(),
        });

        PayrollCycle {
            id: row.id,
            // month is CHECKed to 1..=12 in the schema
            period: YearMonth {
                year: row.year,
                month: row.month,
            },
            status,
            reversion,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Flattened view of a cycle for API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollCycleResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 10)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = "October 2025")]
    pub label: String,
    pub status: StatusKind,
    pub hr_signoff_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub hr_signoff_at: Option<DateTime<Utc>>,
    pub finance_signoff_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub finance_signoff_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reverted_at: Option<DateTime<Utc>>,
    pub reversion_reason: Option<String>,
}

impl From<&PayrollCycle> for PayrollCycleResponse {
    fn from(cycle: &PayrollCycle) -> Self {
        let hr = cycle.status.hr_signoff();
        let finance = cycle.status.finance_signoff();
        PayrollCycleResponse {
            id: cycle.id,
            month: cycle.period.month,
            year: cycle.period.year,
            label: cycle.period.label(),
            status: cycle.status.kind(),
            hr_signoff_by: hr.and_then(|s| s.by),
            hr_signoff_at: hr.map(|s| s.at),
            finance_signoff_by: finance.and_then(|s| s.by),
            finance_signoff_at: finance.map(|s| s.at),
            reverted_by: cycle.reversion.as_ref().and_then(|r| r.by),
            reverted_at: cycle.reversion.as_ref().map(|r| r.at),
            reversion_reason: cycle.reversion.as_ref().map(|r| r.reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, hr: bool, finance: bool) -> PayrollCycleRow {
        let now = Utc::now();
        PayrollCycleRow {
            id: 7,
            month: 11,
            year: 2025,
            status: status.to_string(),
            hr_signoff_by: hr.then_some(2),
            hr_signoff_at: hr.then_some(now),
            finance_signoff_by: finance.then_some(3),
            finance_signoff_at: finance.then_some(now),
            reverted_by: None,
            reverted_at: None,
            reversion_reason: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn finance_stamp_means_finalized_regardless_of_status_column() {
        let cycle = PayrollCycle::from(row("pending", false, true));
        assert_eq!(cycle.status.kind(), StatusKind::Finalized);
        assert!(cycle.status.hr_signoff().is_none());
    }

    #[test]
    fn hr_stamp_alone_means_hr_signed() {
        let cycle = PayrollCycle::from(row("finalized", true, false));
        assert_eq!(cycle.status.kind(), StatusKind::HrSigned);
    }

    #[test]
    fn no_stamps_means_pending() {
        let cycle = PayrollCycle::from(row("hr_signed", false, false));
        assert_eq!(cycle.status, CycleStatus::Pending);
    }

    #[test]
    fn finance_signoff_keeps_hr_stamp() {
        let hr = Signoff { by: Some(2), at: Utc::now() };
        let finance = Signoff { by: Some(3), at: Utc::now() };
        let status = CycleStatus::HrSigned { hr: hr.clone() }.with_finance_signoff(finance.clone());
        assert_eq!(status, CycleStatus::Finalized { hr: Some(hr), finance });
    }

    #[test]
    fn status_kind_round_trips_through_column_text() {
        assert_eq!(StatusKind::HrSigned.as_ref(), "hr_signed");
        assert_eq!("finalized".parse::<StatusKind>().unwrap(), StatusKind::Finalized);
    }
}
