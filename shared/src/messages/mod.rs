pub mod args;
pub mod error;
pub mod framing;
pub mod packet;
pub mod wire_message;
