//! The SASL exchange which D-Bus performs before any messages are sent.


use std::fmt;
use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::process;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{ConnectError, ConnectErrorKind};

/// Longest line accepted from the server.
const MAX_LINE: usize = 16 * 1024;

/// The GUID the server identifies itself with after authenticating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Guid(Box<str>);

impl Guid {
    /// Generate a GUID for a server.
    ///
    /// This only needs to be unique, it is not a secret.
    pub(crate) fn generate() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let n = COUNTER.fetch_add(1, Ordering::Relaxed);

        // The trailing 32 bits are a timestamp in seconds.
        Guid(
            format!(
                "{:08x}{n:08x}{:08x}{:08x}",
                process::id(),
                now.subsec_nanos(),
                now.as_secs() as u32
            )
            .into(),
        )
    }
}

impl fmt::Display for Guid {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The SASL authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    /// Skip authentication entirely.
    None,
    /// EXTERNAL authentication as the given user id.
    External(u32),
}

impl Auth {
    /// External authentication as the user running the current process.
    #[cfg(feature = "libc")]
    pub(crate) fn current_uid() -> Self {
        // SAFETY: getuid has no preconditions and cannot fail.
        Auth::External(unsafe { libc::getuid() })
    }
}

/// Encode a user id as the payload of an EXTERNAL authentication, which is
/// its decimal representation encoded as hex.
pub(crate) fn external_payload(uid: u32) -> String {
    let mut out = String::new();

    for b in uid.to_string().bytes() {
        let _ = write!(out, "{b:02x}");
    }

    out
}

/// Perform the client side of the SASL exchange over the given stream.
///
/// Returns the server GUID if the server was asked to authenticate.
pub(crate) fn authenticate<S>(stream: &mut S, auth: Auth) -> Result<Option<Guid>, ConnectError>
where
    S: Read + Write,
{
    stream.write_all(b"\0")?;

    let guid = match auth {
        Auth::None => None,
        Auth::External(uid) => {
            write!(stream, "AUTH EXTERNAL {}\r\n", external_payload(uid))?;
            stream.flush()?;

            let line = recv_line(stream)?;

            match line.split_once(' ').unwrap_or((line.as_str(), "")) {
                ("OK", guid) => Some(Guid(guid.trim().into())),
                ("REJECTED", mechanisms) => {
                    return Err(ConnectError::new(
                        ConnectErrorKind::AuthenticationRejected,
                        format_args!("server rejected EXTERNAL, supports: {}", mechanisms.trim()),
                    ));
                }
                _ => {
                    return Err(ConnectError::new(
                        ConnectErrorKind::AuthenticationRejected,
                        format_args!("unexpected SASL response `{line}`"),
                    ));
                }
            }
        }
    };

    stream.write_all(b"BEGIN\r\n")?;
    stream.flush()?;
    Ok(guid)
}

/// Perform the server side of the SASL exchange over the given stream.
///
/// EXTERNAL is the only mechanism offered. The identity claimed by the
/// client is not checked against the credentials of the socket, and a
/// client which sends `BEGIN` without authenticating is let through.
pub(crate) fn serve<S>(stream: &mut S, guid: &Guid) -> Result<(), ConnectError>
where
    S: Read + Write,
{
    let mut nul = [0];
    stream.read_exact(&mut nul)?;

    if nul != [0] {
        return Err(ConnectError::new(
            ConnectErrorKind::AuthenticationRejected,
            "expected a nul byte before SASL",
        ));
    }

    loop {
        let line = recv_line(stream)?;
        let mut parts = line.split(' ');

        match (parts.next(), parts.next()) {
            (Some("BEGIN"), _) => return Ok(()),
            (Some("AUTH"), Some("EXTERNAL")) => {
                write!(stream, "OK {guid}\r\n")?;
            }
            (Some("AUTH" | "CANCEL" | "ERROR"), _) => {
                stream.write_all(b"REJECTED EXTERNAL\r\n")?;
            }
            _ => {
                tracing::trace!(line, "Unsupported SASL command");
                stream.write_all(b"ERROR\r\n")?;
            }
        }

        stream.flush()?;
    }
}

/// Receive a single line without reading past its end, since the server may
/// follow it up with binary data.
fn recv_line<S>(stream: &mut S) -> Result<String, ConnectError>
where
    S: Read,
{
    let mut line = Vec::new();
    let mut byte = [0];

    loop {
        if stream.read(&mut byte)? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        if byte[0] == b'\n' {
            break;
        }

        if line.len() == MAX_LINE {
            return Err(ConnectError::new(
                ConnectErrorKind::AuthenticationRejected,
                "SASL response too long",
            ));
        }

        line.push(byte[0]);
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }

    String::from_utf8(line).map_err(|_| {
        ConnectError::new(
            ConnectErrorKind::AuthenticationRejected,
            "SASL response is not UTF-8",
        )
    })
}
