pub mod catalog;
pub mod grant;
pub mod quota;
pub mod usage_log;
pub mod user;

pub use catalog::Catalog;
pub use grant::{Granted, Grants};
pub use quota::{Action, Metering, Plan, Quota, Usage};
pub use usage_log::UsageLog;
pub use user::{Principal, User};
