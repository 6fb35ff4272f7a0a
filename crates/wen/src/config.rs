/// Inbound buffer size in bytes for one link.
pub const RX_BUFFER: usize = 8192;

/// Outbound buffer size in bytes for one link.
pub const TX_BUFFER: usize = 8192;

/// Upper bound on the length of a single surfaced slice. Also sizes the
/// arena backing slice payloads, since at most one slice is ever live.
pub const MAX_SLICE: usize = 4096;

/// Cell count of the per-link event ring. One cell always stays unused to
/// tell a full ring from an empty one.
pub const EVENT_QUEUE_CAP: usize = 16;

const _: () = assert!(RX_BUFFER >= 1024, "RX_BUFFER below protocol minimum");
const _: () = assert!(TX_BUFFER >= 1024, "TX_BUFFER below protocol minimum");
const _: () = assert!(MAX_SLICE > 0 && MAX_SLICE <= RX_BUFFER);
const _: () = assert!(EVENT_QUEUE_CAP >= 2);
