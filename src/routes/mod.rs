// Routes module

pub mod admin;
pub mod attendance;
pub mod health;
pub mod reports;
pub mod tasks;
pub mod users;

pub use admin::admin_routes;
pub use attendance::attendance_routes;
pub use health::health_routes;
pub use reports::reports_routes;
pub use tasks::tasks_routes;
pub use users::users_routes;
