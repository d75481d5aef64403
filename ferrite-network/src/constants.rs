//! Protocol constants.

use std::time::Duration;

/// The network magic prefixing every message frame.
pub const MAGIC: [u8; 4] = [0xFE, 0x52, 0x17, 0xE0];

/// The protocol version spoken in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The length of a message header: magic, command, body length, checksum.
pub const HEADER_LEN: usize = 24;

/// Maximum size of a protocol message body. Large enough for a
/// maximum-size block with framing slack.
pub const MAX_PROTOCOL_MESSAGE_LEN: usize = 4 * 1024 * 1024 + 1024;

/// Maximum number of entries accepted in one inventory message.
pub const MAX_INV_ITEMS: usize = 50_000;

/// Maximum number of block hashes returned for one GETBLOCKS request.
pub const MAX_GETBLOCKS_RESULTS: usize = 500;

/// How long a sync request may go without progress before it is declared
/// stale and re-issued with a fresh locator.
pub const IBD_STALE_TIMEOUT: Duration = Duration::from_secs(30);
