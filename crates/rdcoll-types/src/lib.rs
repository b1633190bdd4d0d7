//! Wire-level types for the recursive-doubling reduction collective.
//!
//! A packet is an 8-byte metadata header followed by `num_elements` 32-bit
//! words. The header's 16-bit field is little-endian; payload words use the
//! sending platform's native byte order.

pub mod codec;
pub mod packet;

pub use codec::{decode, encode, encode_into};
pub use packet::{
    BYTES_PER_ELEMENT, DEFAULT_BUFFER_LEN, DEFAULT_MAX_LEVEL, DEFAULT_NUM_ELEMENTS, METADATA_LEN,
    Packet, PacketGeometry, PacketMetadata, PacketRegion, Payload,
};
