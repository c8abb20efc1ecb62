//! # Line Checksums
//!
//! The two integrity checks carried on the node's serial lines:
//!
//! - **NMEA**: XOR of every byte between `$` and `*`, sent as two hex digits
//!   after the `*` (`$GPRMC,...*6A`).
//! - **Command**: 8-bit wrapping sum of the payload bytes, appended as
//!   `,*HH` (`U,Hello balloon,*7C`). The offset of the `,*` trailer is the
//!   checksum boundary: everything before it is the command payload.

/// Command trailer separating payload from check value
const COMMAND_TRAILER: &[u8] = b",*";

/// Length of `,*HH`
const COMMAND_TRAILER_LEN: usize = 4;

/// XOR checksum over an NMEA sentence body (the bytes between `$` and `*`)
///
/// # Examples
///
/// ```
/// use telemetry_node::checksum::nmea_checksum;
///
/// let body = b"GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
/// assert_eq!(nmea_checksum(body), 0x6A);
/// ```
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// 8-bit wrapping sum used by uplinked commands
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Parse two ASCII hex digits into a byte
pub fn parse_hex_byte(digits: &[u8]) -> Option<u8> {
    if digits.len() != 2 {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u8::from_str_radix(text, 16).ok()
}

/// Verify the `*HH` suffix of a complete NMEA sentence
///
/// The sentence must start with `$`; trailing `\r`/`\n` are ignored.
pub fn verify_nmea(sentence: &[u8]) -> bool {
    let sentence = trim_line_end(sentence);

    if sentence.first() != Some(&b'$') {
        return false;
    }

    let star = match sentence.iter().rposition(|&b| b == b'*') {
        Some(pos) => pos,
        None => return false,
    };

    match parse_hex_byte(&sentence[star + 1..]) {
        Some(expected) => nmea_checksum(&sentence[1..star]) == expected,
        None => false,
    }
}

/// Locate the checksum boundary of a command line
///
/// Returns the offset of the `,*HH` trailer when the check value matches the
/// payload sum, `None` otherwise.
pub fn command_boundary(line: &[u8]) -> Option<usize> {
    if line.len() <= COMMAND_TRAILER_LEN {
        return None;
    }

    let boundary = line.len() - COMMAND_TRAILER_LEN;
    if &line[boundary..boundary + 2] != COMMAND_TRAILER {
        return None;
    }

    let expected = parse_hex_byte(&line[boundary + 2..])?;
    if sum8(&line[..boundary]) == expected {
        Some(boundary)
    } else {
        None
    }
}

/// Append the `,*HH` check value to a command payload
///
/// # Examples
///
/// ```
/// use telemetry_node::checksum::{command_boundary, with_check_value};
///
/// let line = with_check_value("U,Hello balloon");
/// assert_eq!(line, "U,Hello balloon,*7C");
/// assert_eq!(command_boundary(line.as_bytes()), Some(15));
/// ```
pub fn with_check_value(payload: &str) -> String {
    format!("{},*{:02X}", payload, sum8(payload.as_bytes()))
}

/// Strip any trailing `\r` and `\n` bytes
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}
