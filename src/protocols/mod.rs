//! Narrow protocol collaborators the connection delegates to.

pub mod ftp;
pub mod modbus;
pub mod ssh;
