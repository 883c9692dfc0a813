pub mod sjf;

use crate::config::Config;
use crate::rng::SimRng;
use crate::task::{TaskId, TaskTable};
use crate::trace::TraceSink;

/// Whole-machine scheduling counters, independent of any one policy's
/// internal queues.
#[derive(Debug, Clone, Copy)]
pub struct Runqueue {
    pub nr_runnable: u32,
    pub nr_switches: u64,
    pub current: TaskId,
}

/// Everything a [`SchedulerPolicy`] callback needs, bundled so the policy
/// never has to reach into the engine directly. Takes the place of the
/// original's file-scope globals: every call site gets an explicit,
/// borrow-checked view instead of ambient state.
pub struct SchedCx<'a> {
    pub tasks: &'a mut TaskTable,
    pub rq: &'a mut Runqueue,
    pub rng: &'a mut SimRng,
    pub io_wait_timer: &'a mut Option<u64>,
    pub config: &'a Config,
}

/// The pluggable half of the simulator. The engine (clock, interrupts,
/// process lifecycle) calls these at fixed points; everything about *which*
/// task runs next, and how priorities/time slices evolve, lives here.
pub trait SchedulerPolicy {
    /// Called once before the first cycle, with the seed task already the
    /// current task. Give it whatever bookkeeping a freshly-created task
    /// needs (enqueue, initial slice, ...).
    fn init(&mut self, cx: &mut SchedCx<'_>, seed: TaskId);

    /// Called once after the run loop exits, for final bookkeeping or a
    /// consistency check over queue sizes.
    fn shutdown(&mut self, cx: &mut SchedCx<'_>);

    /// A task that forks subtracts its own bookkeeping (e.g. halves its
    /// remaining slice) and returns the child's.
    fn sched_fork(&mut self, cx: &mut SchedCx<'_>, parent: TaskId, child: TaskId);

    /// The child becomes runnable for the first time.
    fn wake_up_new_task(&mut self, cx: &mut SchedCx<'_>, child: TaskId);

    /// A blocked task becomes runnable again (I/O completed).
    fn activate(&mut self, cx: &mut SchedCx<'_>, task: TaskId);

    /// The current task leaves the runnable state (blocked or killed).
    fn deactivate(&mut self, cx: &mut SchedCx<'_>, task: TaskId);

    /// The scheduling timer fired for the current task: consume one
    /// jiffy of its slice and flag a reschedule if it has run out.
    fn scheduler_tick(&mut self, cx: &mut SchedCx<'_>, current: TaskId, now_ms: u64);

    /// Pick the next task to run and install it as `cx.rq.current`.
    fn schedule(&mut self, cx: &mut SchedCx<'_>, sink: &mut dyn TraceSink, now_ms: u64);
}
