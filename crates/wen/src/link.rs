use tracing::{debug, warn};

use crate::{
    arena::{Arena, align_up},
    codec::{Codec, Decode, DecodeSink, Handshake},
    config::{MAX_SLICE, RX_BUFFER, TX_BUFFER},
    error::LinkError,
    event::{Event, EventQueue, Slice, SliceFlags},
    transport::Transport,
};

/// Close code reported when the peer ends the stream without a close frame.
const NORMAL_CLOSE: u16 = 1000;

/// Lifecycle of a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    /// Created, no codec attached yet.
    Init,
    /// Codec attached, opening handshake in progress.
    Handshake,
    Open,
    /// Shutting down; a close event is pending or about to be queued.
    Closing,
    /// Terminal. Further polls return nothing.
    Closed,
}

/// Single bidirectional byte-stream connection.
///
/// Owns fixed receive/transmit buffers, an arena for surfaced slices and a
/// bounded event queue. The whole engine is [`poll`](Link::poll): one call
/// flushes pending output, performs at most one bounded read, advances the
/// codec and hands back at most one event. Nothing happens between polls.
///
/// Outbound:
///   - [`send`](Link::send) encodes into the transmit buffer only.
///   - The next poll writes the whole pending buffer once; a short write
///     keeps the remainder for the poll after.
///
/// Inbound:
///   - Received bytes accumulate in the receive buffer until the codec lets
///     them surface.
///   - Surfaced bytes are copied into the arena and returned as a
///     [`Slice`]; at most one slice is ever outstanding, and
///     [`release`](Link::release) is what reclaims its storage.
///
/// Shutdown:
///   - Peer EOF or [`close`](Link::close) moves to `Closing`; the link
///     becomes `Closed` at the moment the caller dequeues the close event,
///     after pending output and any outstanding slice have been observed.
pub struct Link<'c, T> {
    state: LinkState,
    transport: T,
    codec: Option<&'c mut dyn Codec>,

    rx: Box<[u8]>,
    rx_len: usize,
    tx: Box<[u8]>,
    tx_len: usize,

    /// Wire bytes of the frame at the buffer head still to be surfaced.
    /// Maintained by the codec (via [`DecodeSink`]) and decremented here as
    /// slices are taken.
    frame_len: usize,

    arena: Arena,
    events: EventQueue,
    slice_outstanding: bool,
    close_queued: bool,
    close_code: u16,
}

impl<'c, T: Transport> Link<'c, T> {
    pub fn new(transport: T) -> Self {
        Self {
            state: LinkState::Init,
            transport,
            codec: None,
            rx: vec![0; RX_BUFFER].into_boxed_slice(),
            rx_len: 0,
            tx: vec![0; TX_BUFFER].into_boxed_slice(),
            tx_len: 0,
            frame_len: 0,
            arena: Arena::new(align_up(MAX_SLICE)),
            events: EventQueue::new(),
            slice_outstanding: false,
            close_queued: false,
            close_code: NORMAL_CLOSE,
        }
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Bytes queued for transmission and not yet flushed.
    #[inline]
    pub fn tx_len(&self) -> usize {
        self.tx_len
    }

    /// Unprocessed received bytes.
    #[inline]
    pub fn rx_len(&self) -> usize {
        self.rx_len
    }

    /// Attaches the wire protocol and starts the opening handshake.
    pub fn attach_codec(&mut self, codec: &'c mut dyn Codec) -> Result<(), LinkError> {
        if self.state != LinkState::Init {
            return Err(LinkError::State);
        }
        self.codec = Some(codec);
        self.state = LinkState::Handshake;
        Ok(())
    }

    /// Advances the link one step and returns at most one event.
    ///
    /// Ordering within a step: drain the event queue, then flush pending
    /// output, then read once, then run the codec. Flushing always precedes
    /// reading, so a poll that had output to write ends there.
    pub fn poll(&mut self) -> Option<Event> {
        if let Some(event) = self.events.pop() {
            if matches!(event, Event::Close { .. }) && self.state != LinkState::Closed {
                debug!("link: closed");
                self.state = LinkState::Closed;
                self.arena.release();
            }
            return Some(event);
        }

        if self.state == LinkState::Closed {
            return None;
        }
        if self.codec.is_none() {
            return Some(Event::Error(LinkError::Unsupported));
        }

        if self.tx_len > 0 {
            return self.flush_tx();
        }
        if self.state == LinkState::Closing {
            // Output is drained; the close event can go out once no slice
            // is parked in the arena.
            self.maybe_queue_close();
            return None;
        }

        if self.rx_len < self.rx.len() {
            match self.transport.read(&mut self.rx[self.rx_len..]) {
                Err(err) => {
                    warn!(?err, "link: transport read failed");
                    return Some(Event::Error(LinkError::Io));
                }
                Ok(0) => {
                    debug!("link: peer closed");
                    self.state = LinkState::Closing;
                    self.maybe_queue_close();
                    return None;
                }
                Ok(n) => self.rx_len += n,
            }
        }

        if self.state == LinkState::Handshake {
            return self.run_handshake();
        }
        self.run_decode()
    }

    /// Returns the payload of an unreleased slice.
    #[inline]
    pub fn slice_bytes(&self, slice: &Slice) -> &[u8] {
        debug_assert!(self.slice_outstanding, "slice read after release");
        self.arena.get(slice.offset, slice.len)
    }

    /// Hands a surfaced slice back, rolling the arena to the mark taken at
    /// its emission. Calling this with no outstanding slice is a caller bug.
    pub fn release(&mut self, slice: Slice) {
        assert!(self.slice_outstanding, "release with no outstanding slice");
        self.arena.reset(slice.mark);
        self.slice_outstanding = false;
    }

    /// Encodes one outbound message onto the tail of the transmit buffer.
    /// The transport is not touched; the next poll flushes.
    pub fn send(&mut self, opcode: u8, payload: &[u8]) -> Result<(), LinkError> {
        if self.state == LinkState::Closed {
            return Err(LinkError::Closed);
        }
        let Some(codec) = self.codec.as_deref_mut() else {
            return Err(LinkError::Unsupported);
        };
        if self.tx_len >= self.tx.len() {
            return Err(LinkError::Overflow);
        }
        let written = codec.encode(opcode, payload, &mut self.tx[self.tx_len..])?;
        self.tx_len += written;
        Ok(())
    }

    /// Starts an orderly shutdown.
    ///
    /// Refused while output is pending: the close frame must be the next
    /// thing to go out. If the codec encodes, a close frame carrying `code`
    /// big-endian is queued under `close_opcode`; a codec that declines just
    /// omits the frame. Either way the state moves to `Closing` and the next
    /// polls flush and deliver the close event.
    pub fn close(&mut self, code: u16, close_opcode: u8) -> Result<(), LinkError> {
        if self.state == LinkState::Closed {
            return Ok(());
        }
        if self.tx_len != 0 {
            return Err(LinkError::State);
        }
        debug!(code, "link: closing");
        self.state = LinkState::Closing;
        self.close_code = code;
        if let Some(codec) = self.codec.as_deref_mut() {
            if let Ok(written) = codec.encode(close_opcode, &code.to_be_bytes(), &mut self.tx[..]) {
                self.tx_len = written;
            }
        }
        Ok(())
    }

    /// One bounded write of everything pending. Ends the poll either way.
    fn flush_tx(&mut self) -> Option<Event> {
        match self.transport.write(&self.tx[..self.tx_len]) {
            Err(err) => {
                warn!(?err, "link: transport write failed");
                return Some(Event::Error(LinkError::Io));
            }
            Ok(n) if n >= self.tx_len => self.tx_len = 0,
            Ok(n) => {
                self.tx.copy_within(n..self.tx_len, 0);
                self.tx_len -= n;
            }
        }
        if self.tx_len == 0 {
            self.maybe_queue_close();
        }
        None
    }

    /// Queues the close event exactly once, and only when nothing that must
    /// be observed first (pending output, an outstanding slice) remains.
    fn maybe_queue_close(&mut self) {
        if self.state == LinkState::Closing
            && !self.close_queued
            && !self.slice_outstanding
            && self.events.try_push(Event::Close { code: self.close_code }).is_none()
        {
            self.close_queued = true;
        }
    }

    fn run_handshake(&mut self) -> Option<Event> {
        let Some(codec) = self.codec.as_deref_mut() else {
            return Some(Event::Error(LinkError::Unsupported));
        };
        match codec.handshake(&self.rx[..self.rx_len], &mut self.tx[self.tx_len..]) {
            Err(err) => {
                warn!(%err, "link: handshake failed");
                Some(Event::Error(err))
            }
            Ok(Handshake::Incomplete { consumed, written }) => {
                self.tx_len += written;
                self.consume_rx(consumed);
                None
            }
            Ok(Handshake::Complete { consumed, written }) => {
                self.tx_len += written;
                self.consume_rx(consumed);
                self.state = LinkState::Open;
                debug!("link: open");
                Some(Event::Open)
            }
        }
    }

    fn run_decode(&mut self) -> Option<Event> {
        // Chosen before the codec runs: an already-known frame boundary
        // bounds the slice, otherwise whatever is buffered does.
        let mut slice_len = if self.frame_len > 0 {
            self.frame_len.min(MAX_SLICE)
        } else {
            self.rx_len.min(MAX_SLICE)
        };

        let decoded = {
            let Some(codec) = self.codec.as_deref_mut() else {
                return Some(Event::Error(LinkError::Unsupported));
            };
            let mut sink = DecodeSink::new(self.events.available(), self.frame_len);
            match codec.decode(&self.rx[..self.rx_len], &mut sink) {
                Err(err) => {
                    // Staged events die with the sink; the queue and the
                    // receive buffer are exactly as they were before the
                    // call, so nothing is delivered twice on a retry.
                    warn!(%err, "link: decode failed");
                    return Some(Event::Error(err));
                }
                Ok(decoded) => {
                    self.frame_len = sink.commit_into(&mut self.events);
                    decoded
                }
            }
        };
        if decoded == Decode::NeedMore {
            return None;
        }

        if self.frame_len > 0 {
            slice_len = slice_len.min(self.frame_len);
        }
        slice_len = slice_len.min(MAX_SLICE).min(self.rx_len);
        if slice_len == 0 {
            return None;
        }

        assert!(!self.slice_outstanding, "poll would emit a slice while one is outstanding");

        let mark = self.arena.mark();
        let Some(offset) = self.arena.alloc(slice_len) else {
            return Some(Event::Error(LinkError::Overflow));
        };
        self.arena.get_mut(offset, slice_len).copy_from_slice(&self.rx[..slice_len]);

        // The slice returns inline, but it still needs a queue cell's worth
        // of headroom; a full queue aborts the emission entirely.
        if self.events.is_full() {
            self.arena.reset(mark);
            return Some(Event::Error(LinkError::Overflow));
        }

        self.consume_rx(slice_len);
        self.slice_outstanding = true;
        if self.frame_len > 0 {
            self.frame_len -= slice_len;
        }
        Some(Event::Slice(Slice {
            offset,
            len: slice_len,
            flags: SliceFlags::BEGIN | SliceFlags::END,
            mark,
        }))
    }

    /// Drops `n` processed bytes off the front of the receive buffer.
    fn consume_rx(&mut self, n: usize) {
        debug_assert!(n <= self.rx_len);
        if n == 0 {
            return;
        }
        self.rx.copy_within(n..self.rx_len, 0);
        self.rx_len -= n;
    }
}
