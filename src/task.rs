use std::fmt;

/// Handle into [`TaskTable`]. `IDLE` is a sentinel, never present in the
/// arena, always resolved to the table's dedicated idle task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub const IDLE: TaskId = TaskId(u64::MAX);

    pub fn is_idle(self) -> bool {
        self == TaskId::IDLE
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_idle() {
            write!(f, "idle")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    SeedInit,
    Interactive,
    NonInteractive,
    Idle,
}

/// Which half of the scheduler's runqueue a task currently sits in, or
/// `None` if it isn't queued at all (blocked on I/O, not yet forked, or
/// already reclaimed). The reference policy is the only thing that writes
/// this; the engine only reads it to decide whether `scheduler_tick`
/// applies to `current` and to audit `nr_runnable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Active,
    Expired,
}

/// A pending, not-yet-spawned child read out of the profile. `children`
/// nests recursively so a SPAWN/ENDSPAWN block becomes a subtree that is
/// only realized into live [`Task`]s once the parent actually forks it.
#[derive(Debug, Clone, Default)]
pub struct ChildDescriptor {
    pub name: String,
    pub kind: TaskKind2,
    pub nice: i32,
    pub kill_time_ms: Option<i64>,
    pub spawn_time_ms: u64,
    pub children: Vec<ChildDescriptor>,
}

/// Parser-time stand-in for [`TaskKind`] so a descriptor can default to
/// "not yet told" before `#TYPE` is read; collapses to `TaskKind` at fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskKind2 {
    #[default]
    Interactive,
    NonInteractive,
}

impl From<TaskKind2> for TaskKind {
    fn from(k: TaskKind2) -> TaskKind {
        match k {
            TaskKind2::Interactive => TaskKind::Interactive,
            TaskKind2::NonInteractive => TaskKind::NonInteractive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub parent: Option<TaskId>,
    pub display_name: String,
    pub kind: TaskKind,
    pub on_runqueue: Option<Container>,

    pub nice: i32,
    pub static_priority: i32,
    pub dynamic_priority: i32,

    pub initial_time_slice: u64,
    pub time_slice: u64,
    pub needs_reschedule: bool,

    /// Accounting fields read and written only by the scheduler policy;
    /// the reference SJF policy never touches them, but the field
    /// contract is part of the task shape regardless of which policy is
    /// plugged in.
    pub sleep_avg: u64,
    pub last_ran: u64,
    pub timestamp: u64,
    pub sched_time: u64,

    pub kill_time_ms: Option<i64>,
    pub killed: bool,
    /// Count of direct children forked but not yet reclaimed. A killed
    /// task with `children_remaining > 0` stays `current` without being
    /// torn down until its descendants have all exited.
    pub children_remaining: u32,
    /// Set once the task has actually been torn down. Distinct from
    /// `killed`: a task can be killed and still waiting on
    /// `children_remaining` to reach zero before it is reclaimed.
    pub reclaimed: bool,

    /// Children read from the profile but not yet forked. Realized one at
    /// a time, only while this task is `current`, as their
    /// `spawn_time_ms` arrives.
    pub pending_spawns: Vec<ChildDescriptor>,
}

impl Task {
    pub fn is_live(&self) -> bool {
        !self.reclaimed
    }
}

/// Arena of every task that has ever existed in the run, indexed by
/// [`TaskId`]. Replaces the original's intrusive linked lists of raw
/// `thread_info` pointers: reclaimed tasks stay in the arena (a parent
/// still waiting on siblings might otherwise need to look them up) rather
/// than being freed outright.
#[derive(Debug, Default)]
pub struct TaskTable {
    arena: Vec<Option<Task>>,
    idle: Option<Task>,
    next_id: u64,
}

impl TaskTable {
    pub fn new() -> Self {
        TaskTable {
            arena: Vec::new(),
            idle: None,
            next_id: 0,
        }
    }

    pub fn alloc_id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, task: Task) {
        let idx = task.id.0 as usize;
        if self.arena.len() <= idx {
            self.arena.resize_with(idx + 1, || None);
        }
        self.arena[idx] = Some(task);
    }

    pub fn set_idle(&mut self, task: Task) {
        self.idle = Some(task);
    }

    pub fn get(&self, id: TaskId) -> &Task {
        if id.is_idle() {
            self.idle.as_ref().expect("idle task not initialized")
        } else {
            self.arena[id.0 as usize]
                .as_ref()
                .unwrap_or_else(|| panic!("task {id} not in table"))
        }
    }

    pub fn get_mut(&mut self, id: TaskId) -> &mut Task {
        if id.is_idle() {
            self.idle.as_mut().expect("idle task not initialized")
        } else {
            self.arena[id.0 as usize]
                .as_mut()
                .unwrap_or_else(|| panic!("task {id} not in table"))
        }
    }

    pub fn idle(&self) -> &Task {
        self.idle.as_ref().expect("idle task not initialized")
    }

    pub fn is_live(&self, id: TaskId) -> bool {
        if id.is_idle() {
            true
        } else {
            self.arena[id.0 as usize]
                .as_ref()
                .map(Task::is_live)
                .unwrap_or(false)
        }
    }

    /// Walks the parent chain: true if `id` or any of its ancestors is
    /// killed. A task consults this about itself once per cycle (while
    /// `current`) to decide whether to start dying.
    pub fn ancestor_killed(&self, mut id: TaskId) -> bool {
        loop {
            if id.is_idle() {
                return false;
            }
            let task = self.get(id);
            if task.killed {
                return true;
            }
            match task.parent {
                Some(p) => id = p,
                None => return false,
            }
        }
    }
}
