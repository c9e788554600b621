//! Low-level protobuf wire format reading.
//!
//! The schema blob is decoded with `prost`, which drops any field it does not
//! know about. Custom options live exactly in those dropped fields, so the
//! translate phase walks the raw bytes a second time with the reader in this
//! module.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated groups)
//! - 5: I32 (fixed32, sfixed32, float)

use crate::error::{Error, Result};

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_wire_format(
                0,
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_VALID_NUMBER: u32 = 536_870_911;

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= 10 {
            // Varints are at most 10 bytes for a 64-bit value
            return Err(Error::varint_decode(i));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::varint_decode(data.len()))
}

/// The payload of a single raw field, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue<'a> {
    /// Varint payload
    Varint(u64),
    /// 64-bit little-endian payload
    Fixed64(u64),
    /// Length-delimited payload
    Bytes(&'a [u8]),
    /// Body of a group, without its start and end tags
    Group(&'a [u8]),
    /// 32-bit little-endian payload
    Fixed32(u32),
}

/// A single field read from a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    /// Field number from the tag
    pub number: u32,
    /// Decoded payload
    pub value: RawValue<'a>,
}

/// Read one tag, returning field number, wire type and tag length.
fn read_tag(data: &[u8], offset: usize) -> Result<(u32, WireType, usize)> {
    let (tag, tag_len) = decode_varint(&data[offset..])
        .map_err(|_| Error::invalid_wire_format(offset, "failed to decode field tag"))?;

    let wire_type = WireType::try_from((tag & 0x07) as u8)
        .map_err(|_| Error::invalid_wire_format(offset, format!("unknown wire type: {}", tag & 0x07)))?;
    let field_number = (tag >> 3) as u32;

    if field_number == 0 || field_number > MAX_VALID_NUMBER {
        return Err(Error::invalid_wire_format(
            offset,
            format!("invalid field number {}", field_number),
        ));
    }

    Ok((field_number, wire_type, tag_len))
}

/// Read a single field starting at `offset`.
///
/// Returns the field and the offset just past it. An end-group tag is an
/// error here; groups are consumed whole.
pub fn read_field(data: &[u8], offset: usize) -> Result<(RawField<'_>, usize)> {
    let (number, wire_type, tag_len) = read_tag(data, offset)?;
    let start = offset + tag_len;

    let (value, end) = match wire_type {
        WireType::Varint => {
            let (value, len) = decode_varint(&data[start..])
                .map_err(|_| Error::invalid_wire_format(start, "failed to decode varint value"))?;
            (RawValue::Varint(value), start + len)
        }
        WireType::I64 => {
            let bytes = data
                .get(start..start + 8)
                .ok_or_else(|| Error::invalid_wire_format(start, "not enough bytes for I64"))?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            (RawValue::Fixed64(u64::from_le_bytes(buf)), start + 8)
        }
        WireType::Len => {
            let (length, len) = decode_varint(&data[start..])
                .map_err(|_| Error::invalid_wire_format(start, "failed to decode length prefix"))?;
            let body_start = start + len;
            let body_end = body_start
                .checked_add(length as usize)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| {
                    Error::invalid_wire_format(
                        start,
                        format!(
                            "not enough bytes for LEN field (need {}, have {})",
                            length,
                            data.len() - body_start
                        ),
                    )
                })?;
            (RawValue::Bytes(&data[body_start..body_end]), body_end)
        }
        WireType::StartGroup => {
            let mut position = start;
            loop {
                if position >= data.len() {
                    return Err(Error::invalid_wire_format(position, "unterminated group"));
                }
                let (inner, inner_type, inner_len) = read_tag(data, position)?;
                if inner_type == WireType::EndGroup {
                    if inner != number {
                        return Err(Error::invalid_wire_format(position, "mismatched end group"));
                    }
                    break (RawValue::Group(&data[start..position]), position + inner_len);
                }
                let (_, next) = read_field(data, position)?;
                position = next;
            }
        }
        WireType::EndGroup => {
            return Err(Error::invalid_wire_format(offset, "unexpected end group"));
        }
        WireType::I32 => {
            let bytes = data
                .get(start..start + 4)
                .ok_or_else(|| Error::invalid_wire_format(start, "not enough bytes for I32"))?;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            (RawValue::Fixed32(u32::from_le_bytes(buf)), start + 4)
        }
    };

    Ok((RawField { number, value }, end))
}

/// Read every field in the buffer, in order.
pub fn read_fields(data: &[u8]) -> Result<Vec<RawField<'_>>> {
    let mut fields = Vec::new();
    let mut position = 0;

    while position < data.len() {
        let (field, next) = read_field(data, position)?;
        fields.push(field);
        position = next;
    }

    Ok(fields)
}

/// Collect the length-delimited payloads of every occurrence of `number`.
pub fn length_delimited<'a>(fields: &[RawField<'a>], number: u32) -> Vec<&'a [u8]> {
    fields
        .iter()
        .filter(|field| field.number == number)
        .filter_map(|field| match field.value {
            RawValue::Bytes(bytes) => Some(bytes),
            _ => None,
        })
        .collect()
}

/// Concatenate every occurrence of a singular embedded message field.
///
/// Repeated occurrences of a singular message merge, and merging is exactly
/// what parsing the concatenation of their bodies produces.
pub fn merged_message(fields: &[RawField<'_>], number: u32) -> Option<Vec<u8>> {
    let parts = length_delimited(fields, number);
    if parts.is_empty() {
        return None;
    }
    Some(parts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_varint_single_byte() {
        let data = [0x08];
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, 8);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_decode_varint_multi_byte() {
        let data = [0xAC, 0x02]; // 300
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, 300);
        assert_eq!(len, 2);
    }

    #[test]
    fn test_decode_varint_max() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, u64::MAX);
        assert_eq!(len, 10);
    }

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::Len);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::I32);
        assert!(WireType::try_from(6).is_err());
    }

    #[test]
    fn test_read_mixed_fields() {
        // 1: varint 150, 2: "hi", 3: fixed32 1, 4: fixed64 2
        let data = [
            0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i', 0x1D, 0x01, 0x00, 0x00, 0x00, 0x21, 0x02,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let fields = read_fields(&data).unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].value, RawValue::Varint(150));
        assert_eq!(fields[1].value, RawValue::Bytes(b"hi"));
        assert_eq!(fields[2].value, RawValue::Fixed32(1));
        assert_eq!(fields[3].value, RawValue::Fixed64(2));
    }

    #[test]
    fn test_read_group() {
        // 1: start group, 2: varint 5, 1: end group, 3: varint 1
        let data = [0x0B, 0x10, 0x05, 0x0C, 0x18, 0x01];
        let fields = read_fields(&data).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].value, RawValue::Group(&[0x10, 0x05]));
        assert_eq!(fields[1].number, 3);
    }

    #[test]
    fn test_truncated_len_field() {
        let data = [0x0A, 0x05, b'h'];
        assert!(read_fields(&data).is_err());
    }

    #[test]
    fn test_invalid_field_number() {
        let data = [0x00, 0x01];
        assert!(read_fields(&data).is_err());
    }

    #[test]
    fn test_merged_message_concatenates() {
        let data = [0x0A, 0x01, 0xAA, 0x10, 0x01, 0x0A, 0x01, 0xBB];
        let fields = read_fields(&data).unwrap();
        assert_eq!(merged_message(&fields, 1), Some(vec![0xAA, 0xBB]));
        assert_eq!(merged_message(&fields, 7), None);
    }
}
