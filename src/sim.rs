use std::collections::VecDeque;

use crate::config::Config;
use crate::profile::ParsedProfile;
use crate::rng::SimRng;
use crate::scheduler::{Runqueue, SchedCx, SchedulerPolicy};
use crate::task::{ChildDescriptor, Task, TaskId, TaskKind, TaskTable};
use crate::trace::{event_line, Level, TraceSink};

/// The original's `readProfile`-ignored but field-contract-preserved nice
/// value: `NICE_TO_PRIO(p)` always collapses to the same priority. Kept as
/// a named conversion point so a future policy could change this without
/// touching the lifecycle code that calls it.
fn nice_to_priority(_nice: i32) -> i32 {
    0
}

#[derive(Debug, Default)]
struct ClockState {
    ticks: u64,
    sched_timer: u64,
    io_timer: Option<u64>,
    io_wait_timer: Option<u64>,
}

/// Final tally handed back once the runqueue (and every I/O in flight)
/// has run dry.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub ticks: u64,
    pub jiffies: u64,
    pub nr_switches: u64,
}

/// The whole machine: clock, task table, runqueue counters, RNG, and the
/// pluggable policy plus wherever its trace goes. Generic over both so the
/// reference policy and the default sink are swappable without touching
/// this module.
pub struct Simulation<S: SchedulerPolicy, T: TraceSink> {
    config: Config,
    tasks: TaskTable,
    rq: Runqueue,
    rng: SimRng,
    clock: ClockState,
    /// Interactive tasks blocked on I/O, in the order they went to sleep.
    /// `io_timer` firing wakes this whole queue at once, in FIFO order.
    io_wait_queue: VecDeque<TaskId>,
    scheduler: S,
    sink: T,
    seed: TaskId,
}

impl<S: SchedulerPolicy, T: TraceSink> Simulation<S, T> {
    pub fn new(profile: ParsedProfile, scheduler: S, sink: T) -> Self {
        let config = profile.config;
        let mut tasks = TaskTable::new();

        tasks.set_idle(Task {
            id: TaskId::IDLE,
            parent: None,
            display_name: "(idle)".to_string(),
            kind: TaskKind::Idle,
            on_runqueue: None,
            nice: 0,
            static_priority: 0,
            dynamic_priority: 0,
            initial_time_slice: 0,
            time_slice: 0,
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
        });

        let seed_id = tasks.alloc_id();
        tasks.insert(Task {
            id: seed_id,
            parent: None,
            display_name: format!("(init:{seed_id})"),
            kind: TaskKind::SeedInit,
            on_runqueue: None,
            nice: 0,
            static_priority: 0,
            dynamic_priority: 0,
            initial_time_slice: 0,
            time_slice: 0,
            needs_reschedule: false,
            sleep_avg: 0,
            last_ran: 0,
            timestamp: 0,
            sched_time: 0,
            kill_time_ms: None,
            killed: false,
            children_remaining: 0,
            reclaimed: false,
            pending_spawns: profile.root_children,
        });

        let rng = SimRng::new(config.seed);
        let rq = Runqueue {
            nr_runnable: 0,
            nr_switches: 0,
            current: seed_id,
        };
        let clock = ClockState {
            ticks: 0,
            sched_timer: config.ticks_per_jiffy(),
            io_timer: None,
            io_wait_timer: None,
        };

        Simulation {
            config,
            tasks,
            rq,
            rng,
            clock,
            io_wait_queue: VecDeque::new(),
            scheduler,
            sink,
            seed: seed_id,
        }
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut T {
        &mut self.sink
    }

    pub fn run(&mut self) -> Summary {
        self.sink.banner("simulation start");

        let seed = self.seed;
        {
            let Simulation {
                tasks,
                rq,
                rng,
                clock,
                config,
                scheduler,
                ..
            } = self;
            let mut cx = SchedCx {
                tasks,
                rq,
                rng,
                io_wait_timer: &mut clock.io_wait_timer,
                config,
            };
            scheduler.init(&mut cx, seed);
        }

        let mut last_ms_seen = 0u64;
        while self.rq.nr_runnable != 0 {
            let reschedule = self.run_cycle();
            if reschedule {
                let now_ms = self.config.ticks_to_ms(self.clock.ticks);
                let Simulation {
                    tasks,
                    rq,
                    rng,
                    clock,
                    config,
                    scheduler,
                    sink,
                    ..
                } = self;
                let mut cx = SchedCx {
                    tasks,
                    rq,
                    rng,
                    io_wait_timer: &mut clock.io_wait_timer,
                    config,
                };
                scheduler.schedule(&mut cx, sink, now_ms);
            }

            self.check_end_of_simulation();

            let now_ms = self.config.ticks_to_ms(self.clock.ticks);
            if now_ms > last_ms_seen {
                last_ms_seen = now_ms;
                if let Some(micros) = self.config.cycle_sleep_microseconds {
                    if micros > 0 {
                        std::thread::sleep(std::time::Duration::from_micros(micros));
                    }
                }
            }
        }

        {
            let Simulation {
                tasks,
                rq,
                rng,
                clock,
                config,
                scheduler,
                ..
            } = self;
            let mut cx = SchedCx {
                tasks,
                rq,
                rng,
                io_wait_timer: &mut clock.io_wait_timer,
                config,
            };
            scheduler.shutdown(&mut cx);
        }
        self.sink.banner("simulation end");

        Summary {
            ticks: self.clock.ticks,
            jiffies: self.clock.ticks / self.config.ticks_per_jiffy().max(1),
            nr_switches: self.rq.nr_switches,
        }
    }

    /// Once the configured `end_time_ms` has passed, the driver flags the
    /// seed task for death. Because every live task's ancestor chain
    /// bottoms out at the seed, this single flag is enough to start every
    /// remaining task dying the next time it becomes `current`.
    fn check_end_of_simulation(&mut self) {
        if let Some(end) = self.config.end_time_ms {
            if self.config.ticks_to_ms(self.clock.ticks) >= end && self.tasks.is_live(self.seed) {
                self.tasks.get_mut(self.seed).killed = true;
            }
        }
    }

    /// One full pass of the per-cycle contract: lifecycle cycle, then
    /// interrupt service, then the tick increment. Returns whether the
    /// driver should call `schedule()` afterwards.
    fn run_cycle(&mut self) -> bool {
        let now_ms = self.config.ticks_to_ms(self.clock.ticks);

        self.lifecycle_cycle(now_ms);
        self.interrupt_service(now_ms);

        let want_reschedule = self.tasks.get(self.rq.current).needs_reschedule;

        self.clock.ticks += 1;
        want_reschedule
    }

    fn lifecycle_cycle(&mut self, now_ms: u64) {
        if self.termination_check(now_ms) {
            return;
        }
        self.interactive_blocking_check(now_ms);
        self.spawn_ready_children(now_ms);
    }

    /// Checks only `current` for termination, mirroring the original's
    /// `taskEnd`. A task observing its own kill condition marks itself
    /// killed; if it has no live children left it is reclaimed on the
    /// spot, otherwise it stays `current`, inert, until the rest of its
    /// subtree exits and decrements `children_remaining` to zero.
    fn termination_check(&mut self, now_ms: u64) -> bool {
        let current = self.rq.current;
        if current.is_idle() {
            return false;
        }

        let kill_time_due =
            matches!(self.tasks.get(current).kill_time_ms, Some(k) if (k as u64) <= now_ms);
        let should_die = kill_time_due || self.tasks.ancestor_killed(current);
        if !should_die {
            return false;
        }

        self.tasks.get_mut(current).killed = true;

        if self.tasks.get(current).children_remaining > 0 {
            return true;
        }

        {
            let Simulation {
                tasks,
                rq,
                rng,
                clock,
                config,
                scheduler,
                ..
            } = self;
            let mut cx = SchedCx {
                tasks,
                rq,
                rng,
                io_wait_timer: &mut clock.io_wait_timer,
                config,
            };
            scheduler.deactivate(&mut cx, current);
        }

        self.sink
            .banner(&format!("{} is going down", self.tasks.get(current).display_name));

        self.tasks.get_mut(current).pending_spawns.clear();
        self.tasks.get_mut(current).reclaimed = true;

        if let Some(parent) = self.tasks.get(current).parent {
            let parent_task = self.tasks.get_mut(parent);
            parent_task.children_remaining = parent_task.children_remaining.saturating_sub(1);
        }

        self.rq.current = TaskId::IDLE;
        if self.rq.nr_runnable > 0 {
            self.tasks.get_mut(TaskId::IDLE).needs_reschedule = true;
        }

        true
    }

    fn interactive_blocking_check(&mut self, now_ms: u64) {
        let current = self.rq.current;
        if current.is_idle() || self.tasks.get(current).kind != TaskKind::Interactive {
            return;
        }
        if self.clock.io_wait_timer != Some(0) {
            return;
        }
        self.clock.io_wait_timer = None;

        {
            let Simulation {
                tasks,
                rq,
                rng,
                clock,
                config,
                scheduler,
                ..
            } = self;
            let mut cx = SchedCx {
                tasks,
                rq,
                rng,
                io_wait_timer: &mut clock.io_wait_timer,
                config,
            };
            scheduler.deactivate(&mut cx, current);
        }

        self.io_wait_queue.push_back(current);
        self.tasks.get_mut(current).needs_reschedule = true;

        let display_name = self.tasks.get(current).display_name.clone();
        let time_slice = self.tasks.get(current).time_slice;
        self.sink.line(
            Level::Two,
            &event_line(&display_name, time_slice, now_ms, "Going to Sleep"),
        );
    }

    /// Realizes pending children of `current` only, one at a time, as
    /// their `spawn_time_ms` arrives. A non-running task's pending
    /// children simply wait until it becomes `current` again.
    fn spawn_ready_children(&mut self, now_ms: u64) {
        let current = self.rq.current;
        if current.is_idle() {
            return;
        }
        loop {
            let ready_idx = self
                .tasks
                .get(current)
                .pending_spawns
                .iter()
                .position(|c| c.spawn_time_ms <= now_ms);
            let idx = match ready_idx {
                Some(i) => i,
                None => break,
            };
            let descriptor = self.tasks.get_mut(current).pending_spawns.remove(idx);
            self.spawn_child(current, descriptor, now_ms);
        }
    }

    fn spawn_child(&mut self, parent_id: TaskId, descriptor: ChildDescriptor, now_ms: u64) {
        let child_id = self.tasks.alloc_id();
        let parent_display = self.tasks.get(parent_id).display_name.clone();
        let parent_is_init = self.tasks.get(parent_id).parent.is_none();
        let display_name = if parent_is_init {
            format!("({}:{})", descriptor.name, child_id)
        } else {
            format!("{}:({}:{})", parent_display, descriptor.name, child_id)
        };

        let child = Task {
            id: child_id,
            parent: Some(parent_id),
            display_name,
            kind: descriptor.kind.into(),
            on_runqueue: None,
            nice: descriptor.nice,
            static_priority: nice_to_priority(descriptor.nice),
            dynamic_priority: nice_to_priority(descriptor.nice),
            initial_time_slice: 0,
            time_slice: 0,
            needs_reschedule: false,
            sleep_avg: 0,
            last_ran: 0,
            timestamp: now_ms,
            sched_time: 0,
            kill_time_ms: descriptor.kill_time_ms,
            killed: false,
            children_remaining: 0,
            reclaimed: false,
            pending_spawns: descriptor.children,
        };
        self.tasks.insert(child);
        self.tasks.get_mut(parent_id).children_remaining += 1;

        {
            let Simulation {
                tasks,
                rq,
                rng,
                clock,
                config,
                scheduler,
                ..
            } = self;
            let mut cx = SchedCx {
                tasks,
                rq,
                rng,
                io_wait_timer: &mut clock.io_wait_timer,
                config,
            };
            scheduler.sched_fork(&mut cx, parent_id, child_id);
            scheduler.wake_up_new_task(&mut cx, child_id);
        }

        self.tasks.get_mut(parent_id).needs_reschedule = true;

        self.sink.banner(&format!(
            "Process: {} has been created",
            self.tasks.get(child_id).display_name
        ));
    }

    /// Decrements every armed timer by one, then reacts to whichever
    /// reached zero: `sched_timer` ticks `current`'s slice, `io_timer`
    /// wakes the whole I/O wait queue at once. `io_timer` is always
    /// re-armed whenever it ends the cycle disarmed, independent of
    /// whether anything is actually waiting on it.
    fn interrupt_service(&mut self, now_ms: u64) {
        if self.clock.sched_timer > 0 {
            self.clock.sched_timer -= 1;
        }
        if let Some(t) = self.clock.io_timer {
            self.clock.io_timer = Some(t.saturating_sub(1));
        }
        if let Some(t) = self.clock.io_wait_timer {
            self.clock.io_wait_timer = Some(t.saturating_sub(1));
        }

        if self.clock.sched_timer == 0 {
            self.clock.sched_timer = self.config.ticks_per_jiffy();
            let current = self.rq.current;
            let Simulation {
                tasks,
                rq,
                rng,
                clock,
                config,
                scheduler,
                ..
            } = self;
            let mut cx = SchedCx {
                tasks,
                rq,
                rng,
                io_wait_timer: &mut clock.io_wait_timer,
                config,
            };
            scheduler.scheduler_tick(&mut cx, current, now_ms);
        }

        if self.clock.io_timer == Some(0) {
            self.clock.io_timer = None;
            let woken: Vec<TaskId> = self.io_wait_queue.drain(..).collect();
            for w in woken {
                if !self.tasks.is_live(w) {
                    continue;
                }
                {
                    let Simulation {
                        tasks,
                        rq,
                        rng,
                        clock,
                        config,
                        scheduler,
                        ..
                    } = self;
                    let mut cx = SchedCx {
                        tasks,
                        rq,
                        rng,
                        io_wait_timer: &mut clock.io_wait_timer,
                        config,
                    };
                    scheduler.activate(&mut cx, w);
                }
                let display_name = self.tasks.get(w).display_name.clone();
                let time_slice = self.tasks.get(w).time_slice;
                self.sink.line(
                    Level::Two,
                    &event_line(&display_name, time_slice, now_ms, "Waking Up from Sleep"),
                );
            }
            if !self.rq.current.is_idle() {
                self.tasks.get_mut(self.rq.current).needs_reschedule = true;
            }
        }

        if self.clock.io_timer.is_none() {
            let delay_ms = self.rng.io_completion_delay_ms();
            self.clock.io_timer = Some(self.config.ms_to_ticks(delay_ms).max(1));
        }
    }
}
