use base64::Engine as _;
use sha1::{Digest, Sha1};
use wen::{Handshake, LinkError};

/// Protocol GUID appended to the client key before hashing (RFC 6455 §4.2).
const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on the request prefix the handshake will look at.
const MAX_REQUEST: usize = 2048;

/// Base64 of a 20-byte SHA-1 digest.
const ACCEPT_LEN: usize = 28;

const RESPONSE_HEAD: &[u8] = b"HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: ";
const RESPONSE_TAIL: &[u8] = b"\r\n\r\n";

/// Validates the upgrade request accumulated in `input` and, once the key
/// header has arrived, writes the 101 response into `out`.
///
/// The whole received prefix is treated as the request: completion reports
/// it fully consumed, incompletion consumes nothing so the next attempt sees
/// everything again.
pub(crate) fn server_handshake(input: &[u8], out: &mut [u8]) -> Result<Handshake, LinkError> {
    if input.len() > MAX_REQUEST {
        return Err(LinkError::Protocol);
    }
    if !contains(input, b"GET ")
        || find_ci(input, b"Upgrade: websocket").is_none()
        || find_ci(input, b"Connection: Upgrade").is_none()
        || !contains(input, b"Sec-WebSocket-Version: 13")
    {
        return Err(LinkError::Protocol);
    }
    let Some(key) = header_value(input, b"Sec-WebSocket-Key:") else {
        return Ok(Handshake::Incomplete { consumed: 0, written: 0 });
    };

    let mut sha = Sha1::new();
    sha.update(key);
    sha.update(WS_GUID);
    let digest = sha.finalize();

    let mut accept = [0u8; ACCEPT_LEN];
    let accept_len = base64::engine::general_purpose::STANDARD
        .encode_slice(digest, &mut accept)
        .map_err(|_| LinkError::Overflow)?;

    let written = RESPONSE_HEAD.len() + accept_len + RESPONSE_TAIL.len();
    if written > out.len() {
        return Err(LinkError::Overflow);
    }
    out[..RESPONSE_HEAD.len()].copy_from_slice(RESPONSE_HEAD);
    let mut at = RESPONSE_HEAD.len();
    out[at..at + accept_len].copy_from_slice(&accept[..accept_len]);
    at += accept_len;
    out[at..at + RESPONSE_TAIL.len()].copy_from_slice(RESPONSE_TAIL);

    Ok(Handshake::Complete { consumed: input.len(), written })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn find_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window.eq_ignore_ascii_case(needle))
}

/// Value of the named header: name matched case-insensitively, leading
/// spaces and tabs stripped, terminated at CR or LF. An unterminated value
/// counts as not present yet, so a key split across reads never hashes a
/// truncated nonce.
fn header_value<'a>(input: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let after = find_ci(input, name)? + name.len();
    let rest = &input[after..];
    let from = rest.iter().position(|b| *b != b' ' && *b != b'\t')?;
    let rest = &rest[from..];
    let to = rest.iter().position(|b| *b == b'\r' || *b == b'\n')?;
    Some(&rest[..to])
}
