//! HTTP/2 stream identifier bookkeeping for the client side of a connection.
//!
//! Client-initiated streams use odd identifiers starting at 1 and may never be reused
//! (RFC 9113 §5.1.1). Once the next odd identifier would overflow the 31-bit space the
//! connection cannot open another stream and has to be retired.

/// Largest legal stream identifier (31 bits).
pub const MAX_STREAM_ID: u32 = (1 << 31) - 1;

/// Highest identifier a server may use for the streams it initiates.
///
/// Advertised in the GOAWAY frame sent when the client runs out of identifiers, so every stream
/// the peer could still have open is covered.
pub const LAST_PEER_STREAM_ID: u32 = MAX_STREAM_ID - 1;

/// Hands out client-initiated stream identifiers: 1, 3, 5, ... up to [`MAX_STREAM_ID`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdAllocator {
    next: u32,
}

impl StreamIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Starts allocating at `next`, e.g. after an upgrade consumed stream 1.
    ///
    /// Even values are bumped to the following odd identifier.
    pub fn starting_at(next: u32) -> Self {
        Self { next: next | 1 }
    }

    /// Returns the next identifier, or `None` once the identifier space is exhausted.
    pub fn next_id(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }

        let id = self.next;
        self.next = self.next.saturating_add(2);
        Some(id)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.next > MAX_STREAM_ID
    }
}

impl Default for StreamIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
