mod frame;
mod handshake;

pub use frame::{FrameHeader, MAX_CONTROL_PAYLOAD, OpCode, encode_frame, is_control, unmask};

use tracing::warn;
use wen::{Codec, Decode, DecodeSink, Event, FrameInfo, Handshake, LinkError, config::RX_BUFFER};

/// Server-side RFC 6455 codec.
///
/// Decoding is pure inspection: slices surfaced by the link carry raw frame
/// bytes, mask key included, and the application applies the XOR (see
/// [`unmask`]). Holds no per-connection state, so one value may serve any
/// number of links.
pub struct ServerCodec;

impl Codec for ServerCodec {
    fn handshake(&mut self, input: &[u8], out: &mut [u8]) -> Result<Handshake, LinkError> {
        handshake::server_handshake(input, out)
    }

    fn decode(&mut self, data: &[u8], sink: &mut DecodeSink) -> Result<Decode, LinkError> {
        if sink.frame_len() > 0 {
            // Mid-frame: the boundary is already recorded and the remaining
            // bytes stream out as they arrive.
            return Ok(Decode::Ready);
        }
        let Some(header) = FrameHeader::parse(data) else {
            return Ok(Decode::NeedMore);
        };

        if !header.masked {
            warn!("ws: unmasked client frame");
            return Err(LinkError::Protocol);
        }
        if is_control(header.opcode) && (!header.fin || header.payload_len > MAX_CONTROL_PAYLOAD) {
            warn!(opcode = header.opcode, "ws: malformed control frame");
            return Err(LinkError::Protocol);
        }

        // The raw payload length is bounded before it is ever summed with
        // the prefix, so a hostile 64-bit length cannot wrap the check.
        if header.payload_len > RX_BUFFER as u64 {
            warn!(payload_len = header.payload_len, "ws: frame exceeds receive capacity");
            return Err(LinkError::Protocol);
        }
        let total = header.total_len();
        if total > RX_BUFFER as u64 {
            // Could never be buffered whole under the complete-frame rule;
            // reject instead of wedging the link.
            warn!(total, "ws: frame exceeds receive capacity");
            return Err(LinkError::Protocol);
        }
        if (data.len() as u64) < total {
            return Ok(Decode::NeedMore);
        }

        sink.push(Event::Frame(FrameInfo {
            fin: header.fin,
            masked: header.masked,
            opcode: header.opcode,
            payload_len: header.payload_len,
        }))?;
        if header.opcode == OpCode::Ping.as_u8() {
            sink.push(Event::Ping)?;
        } else if header.opcode == OpCode::Pong.as_u8() {
            sink.push(Event::Pong)?;
        }
        sink.set_frame_len(total as usize);
        Ok(Decode::Ready)
    }

    fn encode(&mut self, opcode: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, LinkError> {
        frame::encode_frame(opcode, payload, out)
    }
}

#[cfg(test)]
mod tests {
    use wen::{EventQueue, config::EVENT_QUEUE_CAP};

    use super::*;

    /// Masked client frame assembled byte by byte.
    fn client_frame(opcode: u8, fin: bool, payload: &[u8]) -> Vec<u8> {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let mut out = vec![if fin { 0x80 } else { 0x00 } | opcode];
        if payload.len() <= 125 {
            out.push(0x80 | payload.len() as u8);
        } else {
            out.push(0x80 | 126);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        out.extend_from_slice(&mask);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i & 3]));
        out
    }

    fn decode(data: &[u8]) -> (Result<Decode, LinkError>, Vec<Event>, usize) {
        let mut sink = DecodeSink::new(EVENT_QUEUE_CAP - 1, 0);
        let result = ServerCodec.decode(data, &mut sink);
        // Mirror the link: staged events only commit on success.
        let mut events = EventQueue::new();
        let frame_len = if result.is_ok() { sink.commit_into(&mut events) } else { 0 };
        let mut drained = Vec::new();
        while let Some(event) = events.pop() {
            drained.push(event);
        }
        (result, drained, frame_len)
    }

    #[test]
    fn complete_frame_reports_metadata_and_boundary() {
        let wire = client_frame(OpCode::Text.as_u8(), true, b"hello");
        let (result, events, frame_len) = decode(&wire);
        assert_eq!(result, Ok(Decode::Ready));
        assert_eq!(frame_len, wire.len());
        assert_eq!(
            events,
            vec![Event::Frame(FrameInfo {
                fin: true,
                masked: true,
                opcode: OpCode::Text.as_u8(),
                payload_len: 5,
            })]
        );
    }

    #[test]
    fn partial_frame_accumulates() {
        let wire = client_frame(OpCode::Binary.as_u8(), true, &[7; 300]);
        let (result, events, frame_len) = decode(&wire[..wire.len() - 1]);
        assert_eq!(result, Ok(Decode::NeedMore));
        assert!(events.is_empty());
        assert_eq!(frame_len, 0);
    }

    #[test]
    fn ping_queues_both_events() {
        let wire = client_frame(OpCode::Ping.as_u8(), true, b"hi");
        let (result, events, _) = decode(&wire);
        assert_eq!(result, Ok(Decode::Ready));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Frame(_)));
        assert_eq!(events[1], Event::Ping);
    }

    #[test]
    fn unmasked_frame_is_a_protocol_error() {
        let (result, events, _) = decode(&[0x81, 0x02, b'h', b'i']);
        assert_eq!(result, Err(LinkError::Protocol));
        assert!(events.is_empty());
    }

    #[test]
    fn fragmented_control_frame_is_rejected() {
        let wire = client_frame(OpCode::Ping.as_u8(), false, b"x");
        let (result, _, _) = decode(&wire);
        assert_eq!(result, Err(LinkError::Protocol));
    }

    #[test]
    fn oversized_control_payload_is_rejected() {
        let wire = client_frame(OpCode::Ping.as_u8(), true, &[0; 126]);
        let (result, _, _) = decode(&wire);
        assert_eq!(result, Err(LinkError::Protocol));
    }

    #[test]
    fn mid_frame_bytes_pass_through() {
        let mut sink = DecodeSink::new(EVENT_QUEUE_CAP - 1, 40);
        // Garbage that would not parse as a header: irrelevant mid-frame.
        assert_eq!(ServerCodec.decode(&[0xFF; 16], &mut sink), Ok(Decode::Ready));
        let mut events = EventQueue::new();
        assert_eq!(sink.commit_into(&mut events), 40);
        assert!(events.pop().is_none());
    }

    #[test]
    fn frame_beyond_receive_capacity_is_rejected() {
        let mut wire = vec![0x82, 0x80 | 126];
        wire.extend_from_slice(&(RX_BUFFER as u16).to_be_bytes());
        wire.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        let (result, _, _) = decode(&wire);
        assert_eq!(result, Err(LinkError::Protocol));
    }

    #[test]
    fn hostile_length_cannot_wrap_the_size_guard() {
        let mut wire = vec![0x82, 0x80 | 127];
        wire.extend_from_slice(&u64::MAX.to_be_bytes());
        wire.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        let (result, events, frame_len) = decode(&wire);
        assert_eq!(result, Err(LinkError::Protocol));
        assert!(events.is_empty());
        assert_eq!(frame_len, 0);
    }
}
