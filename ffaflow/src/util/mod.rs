pub mod lists;
pub mod logging;
pub mod process;
pub mod shell;

pub use lists::list_entries;
pub use logging::{LoggingGuard, init_logging};
pub use process::{exit_code, terminate_process_group};
