mod dispatch;
mod serve;
mod shutdown;

pub use dispatch::DispatchCommand;
pub use serve::ServeCommand;
