//! When scans run.
//!
//! All of this is plain state driven by explicit [`Instant`]s; the device owns the timers and
//! input waits and feeds their outcome back in.

use embassy_time::{Duration, Instant};

use crate::conf::TriggerMode;
use crate::scan::Rearm;

/// A cancellable one-shot deadline. Holds at most one pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deferred {
    deadline: Option<Instant>,
}

impl Deferred {
    /// Creates an idle slot.
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Cancels any pending submission, then submits one due at `at`.
    pub fn submit_at(&mut self, at: Instant) {
        self.cancel();
        self.deadline = Some(at);
    }

    /// Cancels the pending submission. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether a submission is pending.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending submission is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes the submission if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Where the device is in its scan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanPhase {
    /// Not scanning. No timer runs and no input is watched.
    Disabled,
    /// No key held. Interrupt mode watches the sensed lines; polling mode waits for the next tick.
    Idle,
    /// A scan is scheduled.
    Pending,
}

/// Scan scheduling for one device.
#[derive(Debug)]
pub struct Trigger {
    mode: TriggerMode,
    debounce_period: Duration,
    phase: ScanPhase,
    work: Deferred,
    next_tick: Option<Instant>,
}

impl Trigger {
    /// Creates a disabled trigger.
    pub const fn new(mode: TriggerMode, debounce_period: Duration) -> Self {
        Self {
            mode,
            debounce_period,
            phase: ScanPhase::Disabled,
            work: Deferred::new(),
            next_tick: None,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// The trigger mode, fixed at creation.
    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    /// Starts triggering.
    ///
    /// Returns `true` when a scan must run right away: interrupt mode always scans once on
    /// enable so keys already held are reported. Enabling twice is a no-op.
    pub fn enable(&mut self, now: Instant) -> bool {
        if self.phase != ScanPhase::Disabled {
            return false;
        }
        match self.mode {
            TriggerMode::Polling { interval } => {
                self.next_tick = Some(now + interval);
                self.phase = ScanPhase::Idle;
                false
            }
            TriggerMode::Interrupt => {
                self.phase = ScanPhase::Pending;
                true
            }
        }
    }

    /// Stops the tick, cancels pending work and stops watching inputs.
    pub fn disable(&mut self) {
        self.work.cancel();
        self.next_tick = None;
        self.phase = ScanPhase::Disabled;
    }

    /// Whether the sensed lines should be watched.
    pub fn interrupts_armed(&self) -> bool {
        self.mode == TriggerMode::Interrupt && self.phase == ScanPhase::Idle
    }

    /// A sensed line became active.
    ///
    /// Disarms the inputs and schedules a scan after the debounce period. Ignored unless armed.
    pub fn on_interrupt(&mut self, now: Instant) {
        if !self.interrupts_armed() {
            return;
        }
        self.phase = ScanPhase::Pending;
        self.work.submit_at(now + self.debounce_period);
    }

    /// Applies a scan's re-arm decision.
    pub fn on_scan_complete(&mut self, rearm: Rearm, now: Instant) {
        if self.phase == ScanPhase::Disabled {
            return;
        }
        match rearm {
            Rearm::Immediate => {
                self.work.submit_at(now);
                self.phase = ScanPhase::Pending;
            }
            Rearm::After(delay) => {
                self.work.submit_at(now + delay);
                self.phase = ScanPhase::Pending;
            }
            Rearm::Idle => self.phase = ScanPhase::Idle,
        }
    }

    /// The earliest instant something is due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.work.deadline(), self.next_tick) {
            (Some(work), Some(tick)) => Some(work.min(tick)),
            (work, tick) => work.or(tick),
        }
    }

    /// Consumes everything due at `now`. Returns `true` when exactly one scan must run.
    ///
    /// A polling tick enqueues its scan through the same slot as follow-up scans, so a tick
    /// and a due follow-up coalesce into one scan.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.phase == ScanPhase::Disabled {
            return false;
        }
        if let (TriggerMode::Polling { interval }, Some(tick)) = (self.mode, self.next_tick) {
            if tick <= now {
                let mut next = tick + interval;
                if next <= now {
                    log::trace!("kscan: poll tick overrun");
                    next = now + interval;
                }
                self.next_tick = Some(next);
                self.work.submit_at(now);
            }
        }
        if self.work.take_due(now) {
            self.phase = ScanPhase::Pending;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn deferred_resubmit_replaces_deadline() {
        let mut work = Deferred::new();
        work.submit_at(at(10));
        work.submit_at(at(30));
        assert_eq!(work.deadline(), Some(at(30)));
        assert!(!work.take_due(at(10)));
        assert!(work.take_due(at(30)));
        assert!(!work.is_pending());
        assert!(!work.cancel());
    }

    #[test]
    fn interrupt_enable_scans_then_idles_until_a_line_fires() {
        let mut trigger = Trigger::new(TriggerMode::Interrupt, Duration::from_millis(5));
        assert!(trigger.enable(at(0)));
        assert_eq!(trigger.phase(), ScanPhase::Pending);
        assert!(!trigger.interrupts_armed());

        trigger.on_scan_complete(Rearm::Idle, at(1));
        assert_eq!(trigger.phase(), ScanPhase::Idle);
        assert!(trigger.interrupts_armed());
        assert_eq!(trigger.next_deadline(), None);

        trigger.on_interrupt(at(100));
        assert!(!trigger.interrupts_armed());
        assert_eq!(trigger.next_deadline(), Some(at(105)));
        assert!(!trigger.fire(at(104)));
        assert!(trigger.fire(at(105)));
        // One scan per firing.
        assert!(!trigger.fire(at(105)));
    }

    #[test]
    fn interrupt_while_pending_is_ignored() {
        let mut trigger = Trigger::new(TriggerMode::Interrupt, Duration::from_millis(5));
        trigger.enable(at(0));
        trigger.on_scan_complete(Rearm::After(Duration::from_millis(5)), at(1));

        trigger.on_interrupt(at(3));
        assert_eq!(trigger.next_deadline(), Some(at(6)));
    }

    #[test]
    fn held_keys_keep_rescheduling() {
        let mut trigger = Trigger::new(TriggerMode::Interrupt, Duration::from_millis(5));
        trigger.enable(at(0));
        for step in 0..3 {
            let now = at(step * 5);
            trigger.on_scan_complete(Rearm::After(Duration::from_millis(5)), now);
            assert_eq!(trigger.phase(), ScanPhase::Pending);
            assert!(!trigger.interrupts_armed());
            assert!(trigger.fire(now + Duration::from_millis(5)));
        }
        trigger.on_scan_complete(Rearm::Immediate, at(20));
        assert!(trigger.fire(at(20)));
    }

    #[test]
    fn zero_debounce_interrupt_is_due_at_once() {
        let mut trigger = Trigger::new(TriggerMode::Interrupt, Duration::from_ticks(0));
        trigger.enable(at(0));
        trigger.on_scan_complete(Rearm::Idle, at(0));
        trigger.on_interrupt(at(7));
        assert!(trigger.fire(at(7)));
    }

    #[test]
    fn polling_ticks_on_interval_and_never_arms_inputs() {
        let mut trigger = Trigger::new(TriggerMode::polling(), Duration::from_millis(5));
        assert!(!trigger.enable(at(0)));
        assert!(!trigger.interrupts_armed());
        assert_eq!(trigger.next_deadline(), Some(at(25)));

        assert!(!trigger.fire(at(24)));
        assert!(trigger.fire(at(25)));
        trigger.on_scan_complete(Rearm::Idle, at(25));
        assert!(!trigger.interrupts_armed());
        assert_eq!(trigger.next_deadline(), Some(at(50)));

        trigger.on_interrupt(at(30));
        assert_eq!(trigger.next_deadline(), Some(at(50)));
    }

    #[test]
    fn polling_follow_up_and_tick_share_one_slot() {
        let mut trigger = Trigger::new(TriggerMode::polling(), Duration::from_millis(5));
        trigger.enable(at(0));
        assert!(trigger.fire(at(25)));
        trigger.on_scan_complete(Rearm::After(Duration::from_millis(30)), at(25));
        assert_eq!(trigger.next_deadline(), Some(at(50)));

        // The tick replaces the follow-up; a single scan runs.
        assert!(trigger.fire(at(50)));
        assert!(!trigger.fire(at(55)));
        assert_eq!(trigger.next_deadline(), Some(at(75)));
    }

    #[test]
    fn late_tick_skips_missed_periods() {
        let mut trigger = Trigger::new(TriggerMode::polling(), Duration::from_millis(5));
        trigger.enable(at(0));
        assert!(trigger.fire(at(80)));
        assert_eq!(trigger.next_deadline(), Some(at(105)));
    }

    #[test]
    fn disable_cancels_everything() {
        let mut trigger = Trigger::new(TriggerMode::polling(), Duration::from_millis(5));
        trigger.enable(at(0));
        trigger.disable();
        assert_eq!(trigger.phase(), ScanPhase::Disabled);
        assert_eq!(trigger.next_deadline(), None);
        assert!(!trigger.fire(at(1000)));

        let mut trigger = Trigger::new(TriggerMode::Interrupt, Duration::from_millis(5));
        trigger.enable(at(0));
        trigger.on_scan_complete(Rearm::After(Duration::from_millis(5)), at(0));
        trigger.disable();
        assert!(!trigger.interrupts_armed());
        assert!(!trigger.fire(at(5)));
        trigger.on_scan_complete(Rearm::Idle, at(6));
        assert_eq!(trigger.phase(), ScanPhase::Disabled);
    }

    #[test]
    fn enable_twice_is_a_no_op() {
        let mut trigger = Trigger::new(TriggerMode::Interrupt, Duration::from_millis(5));
        assert!(trigger.enable(at(0)));
        assert!(!trigger.enable(at(1)));
    }
}
