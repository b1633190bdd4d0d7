//! Hex and element dumps for packet debugging.

use std::fmt::Write as _;

/// 16 bytes per line, with an extra gap after the eighth.
#[must_use]
pub fn hex_dump(title: &str, bytes: &[u8]) -> String {
    let mut out = format!("{title} ({} bytes):\n", bytes.len());
    for (i, byte) in bytes.iter().enumerate() {
        let _ = write!(out, "{byte:02x} ");
        if (i + 1) % 16 == 0 {
            out.push('\n');
        } else if (i + 1) % 8 == 0 {
            out.push(' ');
        }
    }
    if bytes.len() % 16 != 0 {
        out.push('\n');
    }
    out
}

/// Payload words, eight per line.
#[must_use]
pub fn element_dump(title: &str, elements: &[u32]) -> String {
    let mut out = format!(
        "{title} ({} elements, {} bytes total):\n",
        elements.len(),
        elements.len() * 4
    );
    for (i, word) in elements.iter().enumerate() {
        let _ = write!(out, "{word:#010x} ");
        if (i + 1) % 8 == 0 || i + 1 == elements.len() {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump_layout() {
        let bytes: Vec<u8> = (1..=18).collect();
        let text = hex_dump("TX", &bytes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TX (18 bytes):");
        assert_eq!(
            lines[1],
            "01 02 03 04 05 06 07 08  09 0a 0b 0c 0d 0e 0f 10 "
        );
        assert_eq!(lines[2], "11 12 ");
    }

    #[test]
    fn test_element_dump_wraps_at_eight() {
        let text = element_dump("RX", &[1; 9]);
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("RX (9 elements, 36 bytes total):"));
        assert!(text.contains("0x00000001"));
    }
}
