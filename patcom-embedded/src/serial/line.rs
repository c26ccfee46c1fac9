use alloc::string::String;
use alloc::vec::Vec;

use embedded_hal_nb::nb::block;
use embedded_hal_nb::serial::Write;

use patcom_api::message::MAX_LINE_LEN;

use crate::error::{Error, Result};

pub fn write_all<S>(serial: &mut S, buffer: &[u8]) -> Result<()>
where
    S: Write<u8>,
{
    for &byte in buffer {
        block!(serial.write(byte)).map_err(|_| Error::SerialError)?;
    }
    Ok(())
}

/// Write `line` followed by a newline and flush
pub fn send_line<S>(serial: &mut S, line: &str) -> Result<()>
where
    S: Write<u8>,
{
    write_all(serial, line.as_bytes())?;
    write_all(serial, b"\n")?;
    block!(serial.flush()).map_err(|_| Error::SerialError)?;
    Ok(())
}

/// Longest command keyword kept from a discarded line
const KEYWORD_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialLine {
    Complete(String),
    /// Exceeded [`MAX_LINE_LEN`]; only the upper-cased command keyword survives
    Overflowed { keyword: String },
}

/// Assembles newline-terminated lines from single bytes.
///
/// A line longer than [`MAX_LINE_LEN`] is discarded up to its terminator and
/// reported as [`SerialLine::Overflowed`] so the sender still gets an answer.
#[derive(Debug, Default)]
pub struct LineReader {
    buffer: Vec<u8>,
    overflow: Option<String>,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning a line once its terminator arrives
    pub fn push(&mut self, byte: u8) -> Option<SerialLine> {
        match byte {
            b'\n' => {
                let bytes = core::mem::take(&mut self.buffer);
                if let Some(keyword) = self.overflow.take() {
                    log::warn!("Serial line exceeded {} bytes, dropped", MAX_LINE_LEN);
                    return Some(SerialLine::Overflowed { keyword });
                }
                match String::from_utf8(bytes) {
                    Ok(line) => Some(SerialLine::Complete(line)),
                    Err(_) => {
                        log::warn!("Serial line is not valid UTF-8, dropped");
                        None
                    }
                }
            }
            b'\r' => None,
            _ if self.overflow.is_some() => None,
            _ if self.buffer.len() >= MAX_LINE_LEN => {
                self.overflow = Some(self.keyword());
                self.buffer.clear();
                None
            }
            _ => {
                self.buffer.push(byte);
                None
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn keyword(&self) -> String {
        let head = &self.buffer[..self.buffer.len().min(KEYWORD_LEN)];
        let end = head.iter().position(|&b| b == b':').unwrap_or(head.len());
        String::from_utf8_lossy(&head[..end]).trim().to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(reader: &mut LineReader, bytes: &[u8]) -> Vec<SerialLine> {
        bytes.iter().filter_map(|&b| reader.push(b)).collect()
    }

    fn complete(line: &str) -> SerialLine {
        SerialLine::Complete(String::from(line))
    }

    #[test]
    fn test_lines_split_on_newline() {
        let mut reader = LineReader::new();
        let lines = feed(&mut reader, b"IDENTIFY\r\nTEST:3\nSTA");

        assert_eq!(lines, [complete("IDENTIFY"), complete("TEST:3")]);
        assert_eq!(reader.pending(), 3);
        assert_eq!(feed(&mut reader, b"TUS\n"), [complete("STATUS")]);
    }

    #[test]
    fn test_overlong_line_reported_with_keyword() {
        let mut reader = LineReader::new();
        let mut input = b"set_config:".to_vec();
        input.resize(MAX_LINE_LEN + 10, b'x');
        input.extend_from_slice(b"\nHELP\n");

        assert_eq!(
            feed(&mut reader, &input),
            [
                SerialLine::Overflowed {
                    keyword: String::from("SET_CONFIG")
                },
                complete("HELP")
            ]
        );
    }
}
