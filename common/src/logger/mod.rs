mod init;
mod spans;

pub use init::init_logger;
pub use spans::tick_span;
