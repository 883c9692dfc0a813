use crate::task::{Container, TaskId, TaskKind};
use crate::trace::{event_line, Level, TraceSink};

use super::{SchedCx, SchedulerPolicy};

/// Jiffies handed to a brand-new task with no parent to inherit a slice
/// from. `NS_TO_JIFFIES(100_000_000)` at `HZ=100` in the original.
const NEW_TASK_SLICE_JIFFIES: u64 = 10;

fn remove_from(list: &mut Vec<TaskId>, id: TaskId) -> bool {
    if let Some(pos) = list.iter().position(|&x| x == id) {
        list.remove(pos);
        true
    } else {
        false
    }
}

/// Reference scheduling policy: always run whichever runnable task has
/// the fewest jiffies left on its current slice. `active` holds tasks
/// still eligible to run this epoch; once it empties, `expired` (tasks
/// that burned through their slice) swaps in and gets refilled. A task
/// stays in whichever container it's enqueued in even while it is
/// `current` — it's only removed when it blocks, dies, or its slice
/// rotates it from `active` to `expired`.
#[derive(Debug, Default)]
pub struct SjfScheduler {
    active: Vec<TaskId>,
    expired: Vec<TaskId>,
}

impl SjfScheduler {
    pub fn new() -> Self {
        SjfScheduler::default()
    }
}

impl SchedulerPolicy for SjfScheduler {
    fn init(&mut self, cx: &mut SchedCx<'_>, seed: TaskId) {
        let seed_task = cx.tasks.get_mut(seed);
        seed_task.time_slice = NEW_TASK_SLICE_JIFFIES;
        seed_task.initial_time_slice = NEW_TASK_SLICE_JIFFIES;
        seed_task.on_runqueue = Some(Container::Active);
        self.active.push(seed);
        cx.rq.nr_runnable = 1;
    }

    fn shutdown(&mut self, _cx: &mut SchedCx<'_>) {
        self.active.clear();
        self.expired.clear();
    }

    fn sched_fork(&mut self, cx: &mut SchedCx<'_>, parent: TaskId, child: TaskId) {
        let half = cx.tasks.get(parent).initial_time_slice / 2;
        {
            let parent_task = cx.tasks.get_mut(parent);
            parent_task.initial_time_slice = half;
            parent_task.time_slice = half;
        }

        let static_priority = cx.tasks.get(parent).static_priority;
        let child_task = cx.tasks.get_mut(child);
        child_task.initial_time_slice = half;
        child_task.time_slice = half;
        child_task.static_priority = static_priority;
        child_task.dynamic_priority = static_priority;
    }

    fn wake_up_new_task(&mut self, cx: &mut SchedCx<'_>, child: TaskId) {
        cx.tasks.get_mut(child).on_runqueue = Some(Container::Active);
        cx.tasks.get_mut(child).needs_reschedule = true;
        self.active.push(child);
        cx.rq.nr_runnable += 1;
    }

    fn activate(&mut self, cx: &mut SchedCx<'_>, task: TaskId) {
        cx.tasks.get_mut(task).on_runqueue = Some(Container::Active);
        cx.tasks.get_mut(task).needs_reschedule = true;
        self.active.push(task);
        cx.rq.nr_runnable += 1;
    }

    fn deactivate(&mut self, cx: &mut SchedCx<'_>, task: TaskId) {
        let removed = remove_from(&mut self.active, task) || remove_from(&mut self.expired, task);
        if removed {
            cx.rq.nr_runnable = cx.rq.nr_runnable.saturating_sub(1);
        }
        cx.tasks.get_mut(task).on_runqueue = None;
    }

    fn scheduler_tick(&mut self, cx: &mut SchedCx<'_>, current: TaskId, _now_ms: u64) {
        if current.is_idle() || cx.tasks.get(current).on_runqueue.is_none() {
            return;
        }
        let task = cx.tasks.get_mut(current);
        if task.time_slice > 0 {
            task.time_slice -= 1;
        }
        if task.time_slice == 0 {
            remove_from(&mut self.active, current);
            task.time_slice = task.initial_time_slice;
            task.on_runqueue = Some(Container::Expired);
            task.needs_reschedule = true;
            self.expired.push(current);
        }
    }

    fn schedule(&mut self, cx: &mut SchedCx<'_>, sink: &mut dyn TraceSink, now_ms: u64) {
        if self.active.is_empty() {
            std::mem::swap(&mut self.active, &mut self.expired);
        }

        let prev = cx.rq.current;
        let next = self
            .active
            .iter()
            .min_by_key(|id| cx.tasks.get(**id).time_slice)
            .copied()
            .unwrap_or(TaskId::IDLE);

        if next != prev {
            cx.rq.nr_switches += 1;
            sink.line(
                Level::One,
                &event_line(
                    &cx.tasks.get(next).display_name,
                    cx.tasks.get(next).time_slice,
                    now_ms,
                    "switched in",
                ),
            );
        }

        cx.rq.current = next;

        if !next.is_idle() {
            cx.tasks.get_mut(next).needs_reschedule = false;
        }

        // Re-arm (or disarm) io_wait_timer unconditionally on every
        // schedule() call, even when `next == prev`, so a stale countdown
        // never outlives the task it was drawn for.
        if !next.is_idle() && cx.tasks.get(next).kind == TaskKind::Interactive {
            let slice_ms = cx
                .config
                .ticks_to_ms(cx.tasks.get(next).time_slice * cx.config.ticks_per_jiffy());
            let delay_ms = cx.rng.io_wait_delay_ms(slice_ms.max(1));
            *cx.io_wait_timer = Some(cx.config.ms_to_ticks(delay_ms));
        } else {
            *cx.io_wait_timer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rng::SimRng;
    use crate::task::{Task, TaskTable};
    use crate::trace::VecSink;

    fn blank_task(id: TaskId, parent: Option<TaskId>, slice: u64) -> Task {
        Task {
            id,
            parent,
            display_name: format!("task-{id}"),
            kind: TaskKind::Interactive,
            on_runqueue: Some(Container::Active),
            nice: 0,
            static_priority: 0,
            dynamic_priority: 0,
            initial_time_slice: slice,
            time_slice: slice,
            needs_reschedule: false,
            sleep_avg: 0,
            last_ran: 0,
            timestamp: 0,
            sched_time: 0,
            kill_time_ms: None,
            killed: false,
            children_remaining: 0,
            reclaimed: false,
            pending_spawns: Vec::new(),
        }
    }

    struct Harness {
        tasks: TaskTable,
        rq: super::super::Runqueue,
        rng: SimRng,
        io_wait_timer: Option<u64>,
        config: Config,
        scheduler: SjfScheduler,
        sink: VecSink,
    }

    impl Harness {
        fn new() -> Self {
            let mut tasks = TaskTable::new();
            tasks.set_idle(blank_task(TaskId::IDLE, None, 0));
            Harness {
                tasks,
                rq: super::super::Runqueue {
                    nr_runnable: 0,
                    nr_switches: 0,
                    current: TaskId::IDLE,
                },
                rng: SimRng::new(1),
                io_wait_timer: None,
                config: Config::default(),
                scheduler: SjfScheduler::new(),
                sink: VecSink::new(),
            }
        }

        fn cx(&mut self) -> SchedCx<'_> {
            SchedCx {
                tasks: &mut self.tasks,
                rq: &mut self.rq,
                rng: &mut self.rng,
                io_wait_timer: &mut self.io_wait_timer,
                config: &self.config,
            }
        }
    }

    #[test]
    fn init_does_not_count_as_a_switch() {
        let mut h = Harness::new();
        let seed = h.tasks.alloc_id();
        h.tasks.insert(blank_task(seed, None, 0));
        h.rq.current = seed;
        let mut cx = h.cx();
        h.scheduler.init(&mut cx, seed);
        assert_eq!(h.rq.nr_switches, 0);
        assert_eq!(h.rq.current, seed);
        assert_eq!(h.rq.nr_runnable, 1);
    }

    #[test]
    fn picks_shortest_remaining_slice() {
        let mut h = Harness::new();
        let seed = h.tasks.alloc_id();
        h.tasks.insert(blank_task(seed, None, 10));
        h.rq.current = seed;
        {
            let mut cx = h.cx();
            h.scheduler.init(&mut cx, seed);
        }

        let short = h.tasks.alloc_id();
        h.tasks.insert(blank_task(short, Some(seed), 2));
        let long = h.tasks.alloc_id();
        h.tasks.insert(blank_task(long, Some(seed), 8));

        {
            let mut cx = h.cx();
            h.scheduler.wake_up_new_task(&mut cx, long);
            h.scheduler.wake_up_new_task(&mut cx, short);
        }

        let mut sink = VecSink::new();
        {
            let mut cx = h.cx();
            h.scheduler.schedule(&mut cx, &mut sink, 0);
        }
        assert_eq!(h.rq.current, short);
    }

    #[test]
    fn fork_halves_parents_initial_slice_and_matches_child() {
        let mut h = Harness::new();
        let parent = h.tasks.alloc_id();
        h.tasks.insert(blank_task(parent, None, 10));
        // Run the parent down a few jiffies before forking, so the slice
        // and initial_time_slice diverge and the ledger law can actually
        // be exercised against initial_time_slice, not the mid-run slice.
        h.tasks.get_mut(parent).time_slice = 6;
        let child = h.tasks.alloc_id();
        h.tasks.insert(blank_task(child, Some(parent), 0));

        let mut cx = h.cx();
        h.scheduler.sched_fork(&mut cx, parent, child);

        assert_eq!(h.tasks.get(parent).initial_time_slice, 5);
        assert_eq!(h.tasks.get(parent).time_slice, 5);
        assert_eq!(h.tasks.get(child).initial_time_slice, 5);
        assert_eq!(h.tasks.get(child).time_slice, 5);
        assert_eq!(
            h.tasks.get(parent).initial_time_slice + h.tasks.get(child).initial_time_slice,
            10
        );
    }

    #[test]
    fn exhausted_slice_moves_task_to_expired_and_flags_reschedule() {
        let mut h = Harness::new();
        let seed = h.tasks.alloc_id();
        h.tasks.insert(blank_task(seed, None, 1));
        h.rq.current = seed;

        let mut cx = h.cx();
        h.scheduler.scheduler_tick(&mut cx, seed, 10);

        assert_eq!(h.tasks.get(seed).time_slice, h.tasks.get(seed).initial_time_slice);
        assert!(h.tasks.get(seed).needs_reschedule);
        assert_eq!(h.tasks.get(seed).on_runqueue, Some(Container::Expired));
    }

    #[test]
    fn tick_is_a_no_op_once_current_is_off_the_runqueue() {
        let mut h = Harness::new();
        let seed = h.tasks.alloc_id();
        h.tasks.insert(blank_task(seed, None, 3));
        h.tasks.get_mut(seed).on_runqueue = None;
        h.rq.current = seed;

        let mut cx = h.cx();
        h.scheduler.scheduler_tick(&mut cx, seed, 10);

        assert_eq!(h.tasks.get(seed).time_slice, 3, "dequeued task is not ticked");
    }
}
