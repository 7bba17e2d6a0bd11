//! One file per subcommand.

mod add;
mod cancel;
mod run;
mod show;
mod status;
mod watch;
mod worker;

pub use add::run_add;
pub use cancel::run_cancel;
pub use run::run_scheduler;
pub use show::run_show;
pub use status::run_status;
pub use watch::run_watch;
pub use worker::{run_worker, WorkerArgs};
