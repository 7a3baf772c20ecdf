//! Unit instrumentation
//!
//! Turns a discovered unit into the guard placements the substrate
//! installs: a capture guard at entry, a syscall guard before every
//! syscall, and a switch hook wherever the scheduler asked for one.

use vspin_core::{
    ktrace, IPoint, InstrumentationPlan, SpinResult, ThreadContext, TraceInfo, UnitDesc, Violation,
};

use crate::arbiter::Arbiter;

impl<C: ThreadContext> Arbiter<C> {
    pub fn instrument_unit(&self, unit: &UnitDesc) -> SpinResult<InstrumentationPlan> {
        let mut info = TraceInfo::new(unit);
        {
            let mut s = self.lock();
            s.hooks.on_trace_unit(unit, &mut info);
        }
        self.stats().unit();

        let mut plan = InstrumentationPlan {
            // A leading syscall guard already handles entry
            capture_guard: !unit.is_empty() && !unit.is_syscall(0),
            syscall_guards: unit.syscalls().collect(),
            switch_hooks: Vec::new(),
        };

        for placement in info.switch_points() {
            if placement.point != IPoint::Before {
                return Err(Violation::UnsupportedPlacement(placement.point).into());
            }
            if placement.index >= unit.len() {
                return Err(Violation::PlacementOutOfRange {
                    index: placement.index,
                    len: unit.len(),
                }
                .into());
            }
            if placement.index == 0 && info.skip_leading_switch_call() {
                continue;
            }
            if !plan.switch_hooks.contains(&placement.index) {
                plan.switch_hooks.push(placement.index);
            }
        }
        plan.switch_hooks.sort_unstable();

        ktrace!(
            "unit {:#x}: {} ops, {} syscall guards, {} switch hooks",
            unit.address,
            unit.len(),
            plan.syscall_guards.len(),
            plan.switch_hooks.len()
        );
        Ok(plan)
    }
}
