//! Packet codec: header first, payload second, no padding.
//!
//! ```text
//!  offset  size  field
//!  0       2     collective_id   (LE)
//!  2       1     collective_type
//!  3       1     operation
//!  4       2     reserved        (zero)
//!  6       1     max_level
//!  7       1     current_level
//!  8       4*N   payload         (native-endian u32)
//! ```

use rdcoll_error::{CollectiveError, Result};
use tracing::trace;

use crate::packet::{
    BYTES_PER_ELEMENT, METADATA_LEN, Packet, PacketGeometry, PacketMetadata, Payload,
};

/// Encode a request packet into a freshly allocated buffer of exactly
/// `geometry.total_len()` bytes.
///
/// # Errors
///
/// Returns `InvalidMetadata` if the header violates request invariants and
/// `PayloadLength` if the payload width does not match `geometry`.
pub fn encode(
    metadata: &PacketMetadata,
    payload: &Payload,
    geometry: PacketGeometry,
) -> Result<Vec<u8>> {
    metadata.validate_request()?;
    let mut bytes = vec![0u8; geometry.total_len()];
    encode_into(metadata, payload, geometry, &mut bytes)?;
    Ok(bytes)
}

/// Write a packet into a reusable buffer, returning the packet length.
///
/// The whole buffer is zero-filled first so no bytes from a previous packet
/// survive past the end of this one. Header invariants are not checked here;
/// this is also how expected device responses are rendered.
///
/// # Errors
///
/// Returns `PayloadLength` on a width mismatch and `BufferTooSmall` if `buf`
/// cannot hold the packet.
pub fn encode_into(
    metadata: &PacketMetadata,
    payload: &Payload,
    geometry: PacketGeometry,
    buf: &mut [u8],
) -> Result<usize> {
    if payload.len() != geometry.num_elements() {
        return Err(CollectiveError::PayloadLength {
            expected: geometry.num_elements(),
            actual: payload.len(),
        });
    }
    let total = geometry.total_len();
    if buf.len() < total {
        return Err(CollectiveError::BufferTooSmall {
            needed: total,
            available: buf.len(),
        });
    }

    buf.fill(0);
    buf[..METADATA_LEN].copy_from_slice(&metadata.to_bytes());
    for (chunk, word) in buf[METADATA_LEN..total]
        .chunks_exact_mut(BYTES_PER_ELEMENT)
        .zip(payload.as_slice())
    {
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    trace!(
        level = metadata.current_level,
        total_len = total,
        "packet encoded"
    );
    Ok(total)
}

/// Decode the leading `geometry.total_len()` bytes of `bytes`.
///
/// Trailing bytes are ignored; callers that require an exact length must
/// check it before decoding.
///
/// # Errors
///
/// Returns `MalformedPacket` if `bytes` is shorter than a full packet.
pub fn decode(bytes: &[u8], geometry: PacketGeometry) -> Result<Packet> {
    let total = geometry.total_len();
    if bytes.len() < total {
        return Err(CollectiveError::MalformedPacket {
            expected: total,
            actual: bytes.len(),
        });
    }

    let mut header = [0u8; METADATA_LEN];
    header.copy_from_slice(&bytes[..METADATA_LEN]);
    let metadata = PacketMetadata::from_bytes(&header);

    let elements = bytes[METADATA_LEN..total]
        .chunks_exact(BYTES_PER_ELEMENT)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(Packet {
        metadata,
        payload: Payload::from_vec(elements),
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_meta() -> PacketMetadata {
        PacketMetadata::new(0xABCD, 0x01, 0x05, 3)
    }

    #[test]
    fn test_encode_produces_exact_length() {
        let g = PacketGeometry::reference();
        let payload = Payload::from_vec((1..=256).collect());
        let bytes = encode(&sample_meta().with_level(1), &payload, g).unwrap();
        assert_eq!(bytes.len(), 1032);
        assert_eq!(&bytes[..8], &[0xCD, 0xAB, 0x01, 0x05, 0, 0, 3, 1]);
        assert_eq!(&bytes[8..12], &1u32.to_ne_bytes());
        assert_eq!(&bytes[1028..1032], &256u32.to_ne_bytes());
    }

    #[test]
    fn test_encode_rejects_level_above_max() {
        let g = PacketGeometry::new(4).unwrap();
        let err = encode(&sample_meta().with_level(4), &Payload::zeroed(4), g).unwrap_err();
        assert!(matches!(err, CollectiveError::InvalidMetadata { .. }));
    }

    #[test]
    fn test_encode_rejects_wrong_width() {
        let g = PacketGeometry::new(4).unwrap();
        let err = encode(&sample_meta(), &Payload::zeroed(5), g).unwrap_err();
        assert!(matches!(
            err,
            CollectiveError::PayloadLength {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_encode_into_clears_stale_bytes() {
        let g = PacketGeometry::new(2).unwrap();
        let mut buf = [0xEEu8; 32];
        let n = encode_into(&sample_meta(), &Payload::zeroed(2), g, &mut buf).unwrap();
        assert_eq!(n, 16);
        assert!(buf[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_into_small_buffer() {
        let g = PacketGeometry::new(2).unwrap();
        let mut buf = [0u8; 15];
        let err = encode_into(&sample_meta(), &Payload::zeroed(2), g, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            CollectiveError::BufferTooSmall {
                needed: 16,
                available: 15
            }
        ));
    }

    #[test]
    fn test_decode_short_input_is_malformed() {
        let g = PacketGeometry::reference();
        let err = decode(&[0u8; 1031], g).unwrap_err();
        assert!(matches!(
            err,
            CollectiveError::MalformedPacket {
                expected: 1032,
                actual: 1031
            }
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let g = PacketGeometry::new(1).unwrap();
        let mut bytes = encode(&sample_meta(), &Payload::from_vec(vec![7]), g).unwrap();
        bytes.extend_from_slice(&[0xFF; 5]);
        let packet = decode(&bytes, g).unwrap();
        assert_eq!(packet.payload.as_slice(), &[7]);
    }

    fn arb_metadata() -> impl Strategy<Value = PacketMetadata> {
        let header = (any::<u16>(), any::<u8>(), any::<u8>(), any::<u8>());
        header.prop_flat_map(|(id, kind, op, max_level)| {
            (0..=max_level).prop_map(move |level| {
                PacketMetadata::new(id, kind, op, max_level).with_level(level)
            })
        })
    }

    proptest! {
        #[test]
        fn prop_codec_round_trip(
            meta in arb_metadata(),
            words in prop::collection::vec(any::<u32>(), 1..64),
        ) {
            let g = PacketGeometry::new(words.len()).unwrap();
            let payload = Payload::from_vec(words);
            let bytes = encode(&meta, &payload, g).unwrap();
            prop_assert_eq!(bytes.len(), g.total_len());
            let packet = decode(&bytes, g).unwrap();
            prop_assert_eq!(packet.metadata, meta);
            prop_assert_eq!(packet.payload, payload);
        }
    }
}
