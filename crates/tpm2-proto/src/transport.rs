// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command transports
//!
//! A transport moves one marshaled command to the TPM and brings back the
//! complete response, header included. It knows nothing about what the
//! bytes mean.

use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::net::TcpStream;
use tracing::{debug, warn};

use crate::HEADER_SIZE;

/// Resource-managed kernel TPM device
pub const DEFAULT_DEVICE: &str = "/dev/tpmrm0";

/// Default mssim/swtpm host
pub const DEFAULT_MSSIM_HOST: &str = "localhost";

/// Default mssim/swtpm command port
pub const DEFAULT_MSSIM_PORT: u16 = 2321;

/// mssim platform protocol: send a TPM command
const TPM_SEND_COMMAND: u32 = 8;

/// mssim platform protocol: close the session
const TPM_SESSION_END: u32 = 20;

/// Upper bound on a response we are willing to buffer
const MAX_RESPONSE_SIZE: usize = 64 * 1024;

pub trait Transport {
    /// Send a complete command and return the complete response
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>>;
}

/// Character device transport (/dev/tpm0, /dev/tpmrm0)
pub struct DeviceTransport {
    device: File,
}

impl DeviceTransport {
    pub fn open(path: &str) -> Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .context(format!("Failed to open TPM device at {}", path))?;
        debug!(path, "opened TPM device");

        Ok(Self { device })
    }
}

impl Transport for DeviceTransport {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.device
            .write_all(command)
            .context("Failed to write TPM command")?;

        // Read response header first (10 bytes)
        let mut response = vec![0u8; HEADER_SIZE];
        self.device
            .read_exact(&mut response)
            .context("Failed to read TPM response header")?;

        let size = u32::from_be_bytes([response[2], response[3], response[4], response[5]]) as usize;
        if !(HEADER_SIZE..=MAX_RESPONSE_SIZE).contains(&size) {
            bail!("Invalid TPM response size: {}", size);
        }

        // Read response body (excluding header)
        response.resize(size, 0);
        self.device
            .read_exact(&mut response[HEADER_SIZE..])
            .context("Failed to read TPM response body")?;

        Ok(response)
    }
}

/// TCP transport for the Microsoft reference simulator and swtpm
///
/// Commands are framed as `TPM_SEND_COMMAND`, locality, length, bytes. The
/// simulator answers with length, bytes and a trailing u32 status.
pub struct MssimTransport {
    stream: TcpStream,
}

impl MssimTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .context(format!("Failed to connect to TPM simulator at {}:{}", host, port))?;
        debug!(host, port, "connected to TPM simulator");

        Ok(Self { stream })
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.stream
            .read_exact(&mut buf)
            .context("Failed to read from TPM simulator")?;
        Ok(u32::from_be_bytes(buf))
    }
}

impl Transport for MssimTransport {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(9 + command.len());
        frame.extend_from_slice(&TPM_SEND_COMMAND.to_be_bytes());
        frame.push(0); // locality
        frame.extend_from_slice(&(command.len() as u32).to_be_bytes());
        frame.extend_from_slice(command);
        self.stream
            .write_all(&frame)
            .context("Failed to write TPM command to simulator")?;

        let size = self.read_u32()? as usize;
        if size > MAX_RESPONSE_SIZE {
            bail!("Invalid TPM response size: {}", size);
        }
        let mut response = vec![0u8; size];
        self.stream
            .read_exact(&mut response)
            .context("Failed to read TPM response from simulator")?;

        let status = self.read_u32()?;
        if status != 0 {
            bail!("TPM simulator reported failure status {}", status);
        }

        Ok(response)
    }
}

impl Drop for MssimTransport {
    fn drop(&mut self) {
        if let Err(e) = self.stream.write_all(&TPM_SESSION_END.to_be_bytes()) {
            warn!("Failed to end TPM simulator session: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::net::TcpListener;
    use std::rc::Rc;
    use std::thread;

    /// Replays canned responses and records every command it was given
    pub(crate) struct ScriptedTransport {
        responses: VecDeque<Vec<u8>>,
        sent: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<Vec<u8>>) -> (Self, Rc<RefCell<Vec<Vec<u8>>>>) {
            let sent = Rc::new(RefCell::new(Vec::new()));
            let transport = Self {
                responses: responses.into(),
                sent: Rc::clone(&sent),
            };
            (transport, sent)
        }
    }

    impl Transport for ScriptedTransport {
        fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
            self.sent.borrow_mut().push(command.to_vec());
            match self.responses.pop_front() {
                Some(response) => Ok(response),
                None => bail!("No scripted response left"),
            }
        }
    }

    #[test]
    fn test_device_open_missing_path_fails() {
        assert!(DeviceTransport::open("/nonexistent/tpm-device").is_err());
    }

    #[test]
    fn test_mssim_framing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut head = [0u8; 9];
            conn.read_exact(&mut head).unwrap();
            assert_eq!(&head[0..4], &TPM_SEND_COMMAND.to_be_bytes());
            assert_eq!(head[4], 0);
            let len = u32::from_be_bytes([head[5], head[6], head[7], head[8]]) as usize;
            let mut command = vec![0u8; len];
            conn.read_exact(&mut command).unwrap();

            let response = [0x80, 0x01, 0, 0, 0, 10, 0, 0, 0, 0];
            conn.write_all(&(response.len() as u32).to_be_bytes()).unwrap();
            conn.write_all(&response).unwrap();
            conn.write_all(&0u32.to_be_bytes()).unwrap();

            let mut end = [0u8; 4];
            conn.read_exact(&mut end).unwrap();
            assert_eq!(end, TPM_SESSION_END.to_be_bytes());
            command
        });

        let mut transport = MssimTransport::connect("127.0.0.1", port).unwrap();
        let response = transport.transceive(&[1, 2, 3]).unwrap();
        assert_eq!(response, vec![0x80, 0x01, 0, 0, 0, 10, 0, 0, 0, 0]);
        drop(transport);

        assert_eq!(server.join().unwrap(), vec![1, 2, 3]);
    }
}
