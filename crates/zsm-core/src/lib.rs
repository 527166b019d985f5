pub mod process;
pub mod session;
pub mod text;

pub use process::{format_bytes, format_uptime, parse_elapsed, ProcessStats, ProcessTable};
pub use session::{parse_session_list, Session};
