mod channel;
mod line;

pub use channel::{CommandEffect, SerialControlChannel};
pub use line::{LineReader, SerialLine, send_line, write_all};
