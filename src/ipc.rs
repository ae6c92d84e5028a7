mod dispatch;
mod pipeline;
mod runtime;
mod server;

pub use pipeline::{PipelineOptions, replay};
pub use runtime::socket_path;
pub use server::{client_request, run_daemon};
