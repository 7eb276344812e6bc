pub mod attachments;
pub mod config;
pub mod navigator;
pub mod render;
pub mod session;

pub use attachments::FileArg;
pub use config::{cookie_path, load_settings};
pub use navigator::TerminalNavigator;
pub use session::{ChatError, CourierSession};
