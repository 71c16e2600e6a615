pub mod capability;
pub mod grant;
pub mod subscription;
pub mod usage_log;
pub mod user;

pub use subscription::{Metered, Status};
pub use usage_log::UsageAction;
pub use user::Role;
