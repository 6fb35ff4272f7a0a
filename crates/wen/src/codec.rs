use crate::{
    error::LinkError,
    event::{Event, EventQueue},
};

/// Outcome of one handshake attempt over the accumulated input prefix.
///
/// Both variants report how many input bytes were consumed and how many
/// response bytes were produced; the link compacts the former out of its
/// receive buffer and queues the latter for transmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handshake {
    /// Keep accumulating input.
    Incomplete { consumed: usize, written: usize },
    /// The link may open.
    Complete { consumed: usize, written: usize },
}

/// Whether the head of the receive buffer may be surfaced to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decode {
    /// Buffered bytes (clamped by any recorded frame length) are
    /// application data.
    Ready,
    /// Mid-header; nothing may be surfaced until more bytes arrive.
    NeedMore,
}

/// Capability handed to [`Codec::decode`]: staged access to the link's
/// event queue plus get/set access to its running frame-length counter.
/// This stands in for a codec→link back-reference, so codec state never
/// points at the link.
///
/// Pushes land in a staging ring and reach the link only when the decode
/// call returns `Ok`. A decode that pushes some events and then fails
/// leaves the link's queue untouched, so the retried parse of the same
/// bytes cannot deliver duplicate metadata.
pub struct DecodeSink {
    staged: EventQueue,
    available: usize,
    frame_len: usize,
}

impl DecodeSink {
    /// `available` is the room left in the destination queue; pushes beyond
    /// it fail the way pushes into the queue itself would.
    pub fn new(available: usize, frame_len: usize) -> Self {
        Self { staged: EventQueue::new(), available, frame_len }
    }

    /// Bytes of the frame in progress that are still unsurfaced. Zero means
    /// the buffer head sits at a frame boundary.
    #[inline]
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Records the total wire length of the frame at the buffer head.
    #[inline]
    pub fn set_frame_len(&mut self, len: usize) {
        self.frame_len = len;
    }

    /// Stages a metadata event ahead of the slice that will materialise it.
    pub fn push(&mut self, event: Event) -> Result<(), LinkError> {
        if self.staged.len() >= self.available {
            return Err(LinkError::Overflow);
        }
        match self.staged.try_push(event) {
            None => Ok(()),
            Some(_) => Err(LinkError::Overflow),
        }
    }

    /// Moves the staged events into `events` and returns the (possibly
    /// updated) frame length. Room for every staged event was reserved at
    /// construction, so the transfer cannot reject.
    pub fn commit_into(mut self, events: &mut EventQueue) -> usize {
        while let Some(event) = self.staged.pop() {
            let rejected = events.try_push(event);
            debug_assert!(rejected.is_none(), "staged events exceed reserved room");
        }
        self.frame_len
    }
}

/// A wire protocol, attached to a link as three operations.
///
/// The struct itself is borrowed by the link and may be shared across links;
/// any mutable protocol state lives inside the implementor and is owned by
/// the caller.
pub trait Codec {
    /// Runs the opening handshake against the accumulated input prefix,
    /// writing any response into `out`. `Err` fails the handshake; the link
    /// stays in the handshake state and the caller decides whether to
    /// abandon it.
    fn handshake(&mut self, input: &[u8], out: &mut [u8]) -> Result<Handshake, LinkError>;

    /// Inspects, but never consumes, the unprocessed receive prefix. May
    /// stage metadata events and record a frame boundary through `sink`;
    /// both reach the link only when this returns `Ok`, and the link decides
    /// how far to advance based on the slice it emits.
    fn decode(&mut self, data: &[u8], sink: &mut DecodeSink) -> Result<Decode, LinkError>;

    /// Serialises one outbound message into `out`, returning the encoded
    /// length. Codecs without an outbound wire format keep the default.
    fn encode(&mut self, opcode: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, LinkError> {
        let _ = (opcode, payload, out);
        Err(LinkError::Unsupported)
    }
}
