//! Which payroll month is open for work, and which months may be viewed.
//!
//! The open ("active") month is never stored. It is derived from the cycle
//! history on every load: the month after the latest finalized cycle, or the
//! company start month when nothing has been finalized yet.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::payroll_cycle::{PayrollCycle, StatusKind};
use crate::payroll::month::YearMonth;

/// A cycle may be opened for `period` only if it is the company start month,
/// or the cycle of the month before it exists and is finalized.
pub fn month_accessible(period: YearMonth, company_start: YearMonth, previous: Option<&PayrollCycle>) -> bool {
    if period < company_start {
        return false;
    }
    if period == company_start {
        return true;
    }
    previous.is_some_and(PayrollCycle::is_finalized)
}

#[derive(Debug, Clone)]
pub struct MonthProgression {
    company_start: YearMonth,
    cycles: Vec<PayrollCycle>,
}

impl MonthProgression {
    pub fn new(company_start: YearMonth, mut cycles: Vec<PayrollCycle>) -> Self {
        cycles.sort_by_key(|c| c.period);
        Self { company_start, cycles }
    }

    pub fn company_start(&self) -> YearMonth {
        self.company_start
    }

    pub fn cycles(&self) -> &[PayrollCycle] {
        &self.cycles
    }

    pub fn cycle(&self, period: YearMonth) -> Option<&PayrollCycle> {
        self.cycles.iter().find(|c| c.period == period)
    }

    pub fn active_month(&self) -> YearMonth {
        self.cycles
            .iter()
            .rev()
            .find(|c| c.is_finalized())
            .map(|c| c.period.next())
            .unwrap_or(self.company_start)
    }

    pub fn is_finalized(&self, period: YearMonth) -> bool {
        self.cycle(period).is_some_and(PayrollCycle::is_finalized)
    }

    /// Months without a cycle read as pending.
    pub fn status_of(&self, period: YearMonth) -> StatusKind {
        self.cycle(period)
            .map(|c| c.status.kind())
            .unwrap_or(StatusKind::Pending)
    }

    pub fn is_month_accessible(&self, period: YearMonth) -> bool {
        month_accessible(period, self.company_start, self.cycle(period.prev()))
    }

    pub fn can_go_prev(&self, selected: YearMonth) -> bool {
        selected > self.company_start
    }

    /// Forward browsing walks finalized history up to the active month, never past it.
    pub fn can_go_next(&self, selected: YearMonth) -> bool {
        let active = self.active_month();
        if selected == active {
            return false;
        }
        let next = selected.next();
        next == active || self.is_finalized(next)
    }

    /// Only the active month and finalized months can be selected.
    pub fn is_navigable(&self, target: YearMonth) -> bool {
        target >= self.company_start && (target == self.active_month() || self.is_finalized(target))
    }
}

/// Selected-month state of one user's payroll page.
///
/// Until the user navigates, the selection follows the active month, so a
/// finalization elsewhere moves the view forward on the next sync.
#[derive(Debug, Clone, Default)]
pub struct MonthNavigator {
    selected: Option<YearMonth>,
    navigated: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NavigationState {
    pub selected: YearMonth,
    #[schema(example = "October 2025")]
    pub selected_label: String,
    pub active: YearMonth,
    pub selected_status: StatusKind,
    pub selected_cycle_id: Option<u64>,
    /// A cycle may be opened for the selected month.
    pub selected_accessible: bool,
    pub can_go_prev: bool,
    pub can_go_next: bool,
    pub is_viewing_active: bool,
    pub is_viewing_finalized: bool,
}

impl MonthNavigator {
    pub fn sync(&mut self, progression: &MonthProgression) -> YearMonth {
        if !self.navigated || self.selected.is_none() {
            self.selected = Some(progression.active_month());
        }
        self.selected(progression)
    }

    pub fn selected(&self, progression: &MonthProgression) -> YearMonth {
        self.selected.unwrap_or_else(|| progression.active_month())
    }

    pub fn go_next(&mut self, progression: &MonthProgression) -> bool {
        let current = self.sync(progression);
        if !progression.can_go_next(current) {
            return false;
        }
        self.commit(current.next());
        true
    }

    pub fn go_prev(&mut self, progression: &MonthProgression) -> bool {
        let current = self.sync(progression);
        if !progression.can_go_prev(current) {
            return false;
        }
        self.commit(current.prev());
        true
    }

    /// Silently ignores targets that are neither active nor finalized.
    pub fn go_to_month(&mut self, progression: &MonthProgression, target: YearMonth) -> bool {
        if !progression.is_navigable(target) {
            return false;
        }
        self.commit(target);
        true
    }

    pub fn go_to_active(&mut self, progression: &MonthProgression) {
        self.selected = Some(progression.active_month());
        self.navigated = false;
    }

    pub fn state(&self, progression: &MonthProgression) -> NavigationState {
        let selected = self.selected(progression);
        let active = progression.active_month();
        let selected_status = progression.status_of(selected);
        NavigationState {
            selected,
            selected_label: selected.label(),
            active,
            selected_status,
            selected_cycle_id: progression.cycle(selected).map(|c| c.id),
            selected_accessible: progression.is_month_accessible(selected),
            can_go_prev: progression.can_go_prev(selected),
            can_go_next: progression.can_go_next(selected),
            is_viewing_active: selected == active,
            is_viewing_finalized: selected_status == StatusKind::Finalized,
        }
    }

    fn commit(&mut self, target: YearMonth) {
        self.selected = Some(target);
        self.navigated = true;
    }
}
