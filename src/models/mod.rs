// Models module

pub mod attendance;
pub mod report;
pub mod stats;
pub mod task;
pub mod user;

pub use attendance::{
    attendance_id, compute_work_hours, format_work_hours, Attendance, AttendanceKey,
    AttendanceStatus, CheckIn, CheckOut, NO_WORK_HOURS,
};
pub use report::{report_id, NewReport, Report, REPORT_SUBMITTED};
pub use stats::{CacheStats, ReconcileSummary, TaskDatabaseProbe};
pub use task::{NewTask, StatusUpdate, Task, TaskPriority, TaskStatus};
pub use user::{NewUser, User};
