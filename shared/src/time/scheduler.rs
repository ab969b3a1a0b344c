#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

struct ScheduledTask<C> {
    id: TaskId,
    due: f64,
    callback: Box<dyn FnOnce(&mut C)>,
}

/// Delayed callbacks driven by `GameTime::run_time`.
///
/// Due callbacks run in order of due time, ties in scheduling order.
/// Callbacks scheduled while others run wait for the next `take_due`.
pub struct Scheduler<C> {
    next_id: u64,
    tasks: Vec<ScheduledTask<C>>,
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            tasks: Vec::new(),
        }
    }

    pub fn add(
        &mut self,
        now: f64,
        delay: f64,
        callback: impl FnOnce(&mut C) + 'static,
    ) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.tasks.push(ScheduledTask {
            id,
            due: now + delay,
            callback: Box::new(callback),
        });
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    pub fn take_due(&mut self, now: f64) -> Vec<Box<dyn FnOnce(&mut C)>> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|task| task.due <= now);
        self.tasks = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)));
        due.into_iter().map(|task| task.callback).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}
