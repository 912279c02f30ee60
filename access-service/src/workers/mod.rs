mod scheduler;

pub use scheduler::RoutineScheduler;
