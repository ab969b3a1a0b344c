mod game_time;
mod scheduler;

pub use game_time::GameTime;
pub use scheduler::{Scheduler, TaskId};
