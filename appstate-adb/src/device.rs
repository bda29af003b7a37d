//! Authenticated ADB device sessions.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use crate::wire::{auth_type, Command, Packet, MAX_PAYLOAD, VERSION};
use crate::{AdbError, AdbKey, AdbResult};

const MAX_PAYLOAD_WORD: u32 = MAX_PAYLOAD as u32;
const HOST_BANNER: &[u8] = b"host::\0";

/// Deadlines applied while talking to a device.
#[derive(Clone, Copy, Debug)]
pub struct ConnectTimeouts {
    /// Per-read/-connect deadline once a session is established.
    pub transport: Duration,
    /// Overall deadline for the CNXN/AUTH handshake. First-time pairing
    /// includes the on-TV authorization dialog, so this is usually longer.
    pub auth: Duration,
}

impl ConnectTimeouts {
    /// Creates a timeout pair.
    #[must_use]
    pub const fn new(transport: Duration, auth: Duration) -> Self {
        Self { transport, auth }
    }
}

impl Default for ConnectTimeouts {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(10))
    }
}

/// An authenticated ADB session over TCP.
pub struct DeviceConnection {
    stream: TcpStream,
    banner: String,
    transport_timeout: Duration,
    next_local_id: u32,
}

impl fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("banner", &self.banner)
            .field("transport_timeout", &self.transport_timeout)
            .finish()
    }
}

impl DeviceConnection {
    /// Dials the device and completes the CNXN/AUTH handshake.
    ///
    /// The first AUTH TOKEN challenge is answered with a signature; a repeated
    /// challenge means the device does not know the key yet, so the public key
    /// is offered and the device may prompt for on-screen authorization. A
    /// device that skips AUTH entirely is accepted as already authorized.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Timeout`] when the handshake exceeds its deadline,
    /// [`AdbError::Protocol`] for unexpected traffic, and [`AdbError::Io`]
    /// for transport failures.
    pub async fn connect(
        host: &str,
        port: u16,
        key: &AdbKey,
        timeouts: ConnectTimeouts,
    ) -> AdbResult<Self> {
        let mut stream = timeout(timeouts.transport, TcpStream::connect((host, port)))
            .await
            .map_err(|_| AdbError::timeout("connect"))??;

        Packet::new(Command::Connect, VERSION, MAX_PAYLOAD_WORD, Bytes::from_static(HOST_BANNER))
            .write_to(&mut stream)
            .await?;

        let deadline = Instant::now() + timeouts.auth;
        let mut signature_sent = false;
        let banner = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AdbError::timeout("auth"));
            }
            let packet = timeout(remaining, Packet::read_from(&mut stream))
                .await
                .map_err(|_| AdbError::timeout("auth"))??;

            match (packet.command, packet.arg0) {
                (Command::Auth, auth_type::TOKEN) if !signature_sent => {
                    let signature = key.sign_token(&packet.payload)?;
                    Packet::new(Command::Auth, auth_type::SIGNATURE, 0, signature)
                        .write_to(&mut stream)
                        .await?;
                    signature_sent = true;
                }
                (Command::Auth, auth_type::TOKEN) => {
                    debug!("signature rejected, offering public key");
                    let mut line = key.public_key_line()?.into_bytes();
                    line.push(0);
                    Packet::new(Command::Auth, auth_type::RSAPUBLICKEY, 0, line)
                        .write_to(&mut stream)
                        .await?;
                    info!(
                        fingerprint = %key.fingerprint(),
                        "waiting for on-device authorization"
                    );
                }
                (Command::Connect, _) => {
                    break String::from_utf8_lossy(&packet.payload).into_owned();
                }
                (command, arg0) => {
                    return Err(AdbError::protocol(format!(
                        "unexpected {command:?} (arg0={arg0}) during handshake"
                    )));
                }
            }
        };

        debug!(banner = %banner, "adb connection established");
        Ok(Self {
            stream,
            banner,
            transport_timeout: timeouts.transport,
            next_local_id: 1,
        })
    }

    /// Returns the system identity banner the device sent in its CNXN.
    #[must_use]
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Runs a command through the `shell:` service and collects its output.
    ///
    /// # Errors
    ///
    /// Returns [`AdbError::Protocol`] when the device refuses the stream or
    /// violates stream framing, [`AdbError::Timeout`] when a read exceeds the
    /// transport deadline, and [`AdbError::Io`] for transport failures.
    pub async fn shell(&mut self, command: &str) -> AdbResult<String> {
        let local_id = self.next_local_id;
        self.next_local_id = self.next_local_id.wrapping_add(1);

        let service = format!("shell:{command}\0");
        Packet::new(Command::Open, local_id, 0, service.into_bytes())
            .write_to(&mut self.stream)
            .await?;

        let remote_id = loop {
            let packet = self.recv().await?;
            match packet.command {
                Command::Okay if packet.arg1 == local_id => break packet.arg0,
                Command::Close if packet.arg1 == local_id => {
                    return Err(AdbError::protocol(format!("shell service refused: {command}")));
                }
                // Stale traffic from a previous stream.
                Command::Okay | Command::Write | Command::Close => {}
                other => {
                    return Err(AdbError::protocol(format!(
                        "unexpected {other:?} while opening stream"
                    )));
                }
            }
        };

        let mut output = Vec::new();
        loop {
            let packet = self.recv().await?;
            match packet.command {
                Command::Write if packet.arg1 == local_id => {
                    if !packet.payload.is_empty() {
                        output.extend_from_slice(&packet.payload);
                    }
                    Packet::empty(Command::Okay, local_id, remote_id)
                        .write_to(&mut self.stream)
                        .await?;
                }
                Command::Close if packet.arg1 == local_id => {
                    Packet::empty(Command::Close, local_id, remote_id)
                        .write_to(&mut self.stream)
                        .await?;
                    break;
                }
                // Acks for our own writes, or traffic for unknown streams.
                Command::Okay | Command::Write | Command::Close => {}
                other => {
                    return Err(AdbError::protocol(format!(
                        "unexpected {other:?} during shell"
                    )));
                }
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Shuts the socket down. Errors are ignored; the session is gone either
    /// way.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }

    async fn recv(&mut self) -> AdbResult<Packet> {
        timeout(self.transport_timeout, Packet::read_from(&mut self.stream))
            .await
            .map_err(|_| AdbError::timeout("read"))?
    }
}
