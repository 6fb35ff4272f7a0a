use wen::LinkError;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Frame opcodes defined by RFC 6455.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self, LinkError> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            _ => Err(LinkError::Protocol),
        }
    }
}

/// Control frames are the opcodes with the high bit of the nibble set.
#[inline]
pub const fn is_control(opcode: u8) -> bool {
    opcode & 0x08 != 0
}

/// Parsed prefix of one RFC 6455 frame: base header, extended length and
/// mask key. Parsing is pure inspection and never consumes or copies payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub masked: bool,
    pub opcode: u8,
    pub payload_len: u64,
    pub mask: Option<[u8; 4]>,
    /// Wire bytes covered by header, extended length and mask key.
    pub prefix_len: usize,
}

impl FrameHeader {
    /// Inspects the start of `buf`. `None` means the prefix itself is still
    /// incomplete. Reserved bits are ignored.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 2 {
            return None;
        }
        let fin = buf[0] & 0b1000_0000 != 0;
        let opcode = buf[0] & 0b0000_1111;
        let masked = buf[1] & 0b1000_0000 != 0;
        let code = buf[1] & 0b0111_1111;

        let extra = match code {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let prefix_len = 2 + extra + if masked { 4 } else { 0 };
        if buf.len() < prefix_len {
            return None;
        }

        let payload_len = match extra {
            2 => u64::from(u16::from_be_bytes(buf[2..4].try_into().unwrap())),
            8 => u64::from_be_bytes(buf[2..10].try_into().unwrap()),
            _ => u64::from(code),
        };
        let mask = masked.then(|| buf[2 + extra..prefix_len].try_into().unwrap());

        Some(Self { fin, masked, opcode, payload_len, mask, prefix_len })
    }

    /// Total wire length of the frame, payload included. Saturates instead
    /// of wrapping: the payload length is attacker-controlled and may be
    /// anything up to `u64::MAX`.
    #[inline]
    pub fn total_len(&self) -> u64 {
        self.payload_len.saturating_add(self.prefix_len as u64)
    }
}

/// Encodes one unmasked server-to-client frame with FIN set.
///
/// Length encoding follows the payload size: literal up to 125, 16-bit
/// big-endian up to 64 KiB, 64-bit big-endian beyond.
pub fn encode_frame(opcode: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, LinkError> {
    if is_control(opcode) && payload.len() as u64 > MAX_CONTROL_PAYLOAD {
        return Err(LinkError::Protocol);
    }

    let header_len = if payload.len() <= 125 {
        2
    } else if payload.len() <= 0xFFFF {
        4
    } else {
        10
    };
    let total = header_len + payload.len();
    if total > out.len() {
        return Err(LinkError::Overflow);
    }

    out[0] = 0x80 | (opcode & 0x0F);
    match header_len {
        2 => out[1] = payload.len() as u8,
        4 => {
            out[1] = 126;
            out[2..4].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        _ => {
            out[1] = 127;
            out[2..10].copy_from_slice(&(payload.len() as u64).to_be_bytes());
        }
    }
    out[header_len..total].copy_from_slice(payload);
    Ok(total)
}

/// Applies the client mask key in place. Decoding hands the application raw
/// frame bytes, key included; this is the XOR it performs on the payload.
pub fn unmask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}
