use std::io::{self, Write as _};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use embedded_hal_nb::nb;
use embedded_hal_nb::serial::{ErrorType, Read, Write};

use patcom_embedded::Error;

/// Console standing in for the USB serial port: stdin in, stdout out
#[derive(Clone)]
pub struct StdioSerial {
    incoming: Arc<Mutex<Receiver<u8>>>,
}

impl StdioSerial {
    /// Start the thread that feeds stdin bytes to the device
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = [0u8; 256];
            loop {
                match io::Read::read(&mut io::stdin(), &mut buffer) {
                    Ok(0) => return,
                    Ok(n) => {
                        if buffer[..n].iter().any(|&b| tx.send(b).is_err()) {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!("stdin closed: {}", e);
                        return;
                    }
                }
            }
        });
        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: Receiver<u8>) -> Self {
        Self {
            incoming: Arc::new(Mutex::new(rx)),
        }
    }
}

impl ErrorType for StdioSerial {
    type Error = Error;
}

impl Read<u8> for StdioSerial {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let incoming = self
            .incoming
            .lock()
            .map_err(|_| nb::Error::Other(Error::SerialError))?;
        match incoming.try_recv() {
            Ok(byte) => Ok(byte),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Err(nb::Error::WouldBlock),
        }
    }
}

impl Write<u8> for StdioSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        io::stdout()
            .write_all(&[word])
            .map_err(|_| nb::Error::Other(Error::SerialError))
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        io::stdout()
            .flush()
            .map_err(|_| nb::Error::Other(Error::SerialError))
    }
}
