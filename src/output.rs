mod channel;
mod sink;

pub use channel::OutputChannel;
pub use sink::OutputSink;
