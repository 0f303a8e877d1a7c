//! Advertising data (AD structure) decoding.
//!
//! The advertising data section is a chain of length-prefixed fields:
//! `length` (1 byte, counts type + payload), `type` (1 byte), payload.
//! A zero length byte ends the chain. The bytes come straight off the air, so
//! every read is bounds checked and a broken field only costs that field.

use crate::advertisement::DecodeError;
use std::fmt;
use std::iter::FusedIterator;

/// AD type: Shortened Local Name.
pub const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;

/// AD type: Complete Local Name.
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Whether an AD type carries a UTF-8 local name.
pub fn is_local_name(ad_type: u8) -> bool {
    matches!(
        ad_type,
        AD_TYPE_SHORTENED_LOCAL_NAME | AD_TYPE_COMPLETE_LOCAL_NAME
    )
}

/// Decoded payload of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdData<'a> {
    /// Shortened or complete local name, validated as UTF-8.
    LocalName(&'a str),
    /// Any other type, kept as raw bytes for diagnostics.
    Raw(&'a [u8]),
}

/// One decoded AD structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdField<'a> {
    /// Length byte as found on the wire (type + payload).
    pub length: u8,
    pub ad_type: u8,
    pub data: AdData<'a>,
}

impl<'a> AdField<'a> {
    fn decode(
        offset: usize,
        length: u8,
        ad_type: u8,
        payload: &'a [u8],
    ) -> Result<Self, DecodeError> {
        let data = if is_local_name(ad_type) {
            let text = std::str::from_utf8(payload)
                .map_err(|_| DecodeError::InvalidEncoding { offset, ad_type })?;
            AdData::LocalName(text)
        } else {
            AdData::Raw(payload)
        };

        Ok(Self {
            length,
            ad_type,
            data,
        })
    }

    /// Payload bytes exactly as received.
    pub fn payload(&self) -> &'a [u8] {
        match self.data {
            AdData::LocalName(text) => text.as_bytes(),
            AdData::Raw(bytes) => bytes,
        }
    }

    /// The advertised name, with trailing NUL padding removed.
    pub fn local_name(&self) -> Option<&'a str> {
        match self.data {
            AdData::LocalName(text) => Some(text.trim_end_matches('\0')),
            AdData::Raw(_) => None,
        }
    }

    /// Append this field in wire format.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.length);
        out.push(self.ad_type);
        out.extend_from_slice(self.payload());
    }
}

/// Diagnostic rendering: `{name}` for local names, `{LL tt:pp:..}` otherwise,
/// with the length in decimal and type + payload in hex.
impl fmt::Display for AdField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let AdData::LocalName(text) = self.data {
            return write!(f, "{{{}}}", text.trim_end_matches('\0'));
        }

        write!(f, "{{{:02} {:02x}", self.length, self.ad_type)?;
        for byte in self.payload() {
            write!(f, ":{byte:02x}")?;
        }
        write!(f, "}}")
    }
}

/// Lazy iterator over the fields of an advertising data section.
///
/// Yields `Err(TruncatedField)` at most once and then stops.
/// `Err(InvalidEncoding)` only skips the offending field. Cloning the iterator
/// restarts decoding from the clone point.
#[derive(Debug, Clone)]
pub struct AdFields<'a> {
    section: &'a [u8],
    cursor: usize,
    done: bool,
}

/// Decode an advertising data section.
pub fn decode_fields(section: &[u8]) -> AdFields<'_> {
    AdFields {
        section,
        cursor: 0,
        done: false,
    }
}

impl<'a> AdFields<'a> {
    fn truncated(
        &mut self,
        declared: u8,
        available: usize,
    ) -> Option<Result<AdField<'a>, DecodeError>> {
        self.done = true;
        Some(Err(DecodeError::TruncatedField {
            offset: self.cursor,
            declared,
            available,
        }))
    }
}

impl<'a> Iterator for AdFields<'a> {
    type Item = Result<AdField<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = self.section.get(self.cursor..).unwrap_or_default();
        let Some((&length, rest)) = rest.split_first() else {
            self.done = true;
            return None;
        };
        if length == 0 {
            self.done = true;
            return None;
        }

        let Some((&ad_type, rest)) = rest.split_first() else {
            return self.truncated(length, 0);
        };

        let payload_len = usize::from(length) - 1;
        let Some(payload) = rest.get(..payload_len) else {
            return self.truncated(length, rest.len() + 1);
        };

        let offset = self.cursor;
        self.cursor += 1 + usize::from(length);
        Some(AdField::decode(offset, length, ad_type, payload))
    }
}

impl FusedIterator for AdFields<'_> {}

/// Serialize fields back to advertising data, without a terminator.
pub fn encode_fields(fields: &[AdField<'_>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(fields.iter().map(|f| 1 + usize::from(f.length)).sum());
    for field in fields {
        field.encode_into(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_fields(section: &[u8]) -> Vec<AdField<'_>> {
        decode_fields(section).map(Result::unwrap).collect()
    }

    #[test]
    fn test_flags_field_is_raw() {
        let section = [0x02, 0x01, 0x06, 0x00];
        let fields = ok_fields(&section);
        assert_eq!(
            fields,
            [AdField {
                length: 2,
                ad_type: 0x01,
                data: AdData::Raw(&[0x06]),
            }]
        );
        assert_eq!(fields[0].local_name(), None);
    }

    #[test]
    fn test_complete_local_name() {
        let section = [0x05, 0x09, b'D', b'o', b'g', 0x00];
        let fields = ok_fields(&section);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].ad_type, AD_TYPE_COMPLETE_LOCAL_NAME);
        assert_eq!(fields[0].payload(), b"Dog\0");
        assert_eq!(fields[0].local_name(), Some("Dog"));
    }

    #[test]
    fn test_shortened_local_name() {
        let section = [0x03, 0x08, b'H', b'i'];
        let fields = ok_fields(&section);
        assert_eq!(fields[0].local_name(), Some("Hi"));
    }

    #[test]
    fn test_single_zero_byte_is_empty() {
        assert_eq!(decode_fields(&[0x00]).count(), 0);
    }

    #[test]
    fn test_empty_section_is_empty() {
        assert_eq!(decode_fields(&[]).count(), 0);
    }

    #[test]
    fn test_terminator_stops_decoding() {
        let section = [0x02, 0x01, 0x06, 0x00, 0x02, 0x0a, 0x04];
        assert_eq!(ok_fields(&section).len(), 1);
    }

    #[test]
    fn test_declared_length_past_end_is_truncated() {
        let section = [0x02, 0x01, 0x06, 0x09, 0x09, b'a', b'b'];
        let results: Vec<_> = decode_fields(&section).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(DecodeError::TruncatedField {
                offset: 3,
                declared: 9,
                available: 3,
            })
        );
    }

    #[test]
    fn test_missing_type_byte_is_truncated() {
        let section = [0x02, 0x01, 0x06, 0x05];
        let results: Vec<_> = decode_fields(&section).collect();
        assert_eq!(
            results.last(),
            Some(&Err(DecodeError::TruncatedField {
                offset: 3,
                declared: 5,
                available: 0,
            }))
        );
    }

    #[test]
    fn test_truncation_fuses_iterator() {
        let mut fields = decode_fields(&[0xff, 0x01]);
        assert!(matches!(
            fields.next(),
            Some(Err(DecodeError::TruncatedField { .. }))
        ));
        assert!(fields.next().is_none());
        assert!(fields.next().is_none());
    }

    #[test]
    fn test_invalid_utf8_skips_only_that_field() {
        let section = [0x03, 0x09, 0xff, 0xfe, 0x04, 0x08, b'C', b'a', b't'];
        let results: Vec<_> = decode_fields(&section).collect();
        assert_eq!(
            results[0],
            Err(DecodeError::InvalidEncoding {
                offset: 0,
                ad_type: 0x09,
            })
        );
        assert_eq!(results[1].as_ref().unwrap().local_name(), Some("Cat"));
    }

    #[test]
    fn test_invalid_utf8_in_raw_field_is_fine() {
        let section = [0x03, 0xff, 0xff, 0xfe];
        let fields = ok_fields(&section);
        assert_eq!(fields[0].payload(), &[0xffu8, 0xfe]);
    }

    #[test]
    fn test_length_one_has_empty_payload() {
        let section = [0x01, 0x09];
        let fields = ok_fields(&section);
        assert_eq!(fields[0].payload(), b"");
        assert_eq!(fields[0].local_name(), Some(""));
    }

    #[test]
    fn test_clone_restarts_from_same_point() {
        let section = [0x02, 0x01, 0x06, 0x03, 0x08, b'h', b'i'];
        let mut fields = decode_fields(&section);
        let snapshot = fields.clone();
        assert_eq!(fields.by_ref().count(), 2);
        assert_eq!(fields.count(), 0);
        assert_eq!(snapshot.count(), 2);
    }

    #[test]
    fn test_encode_round_trip() {
        let section = [
            0x02, 0x01, 0x06, // flags
            0x03, 0x03, 0xaa, 0xfe, // 16-bit service UUIDs
            0x05, 0x09, b'D', b'o', b'g', 0x00, // complete name, NUL padded
            0x02, 0x0a, 0xf4, // tx power
            0x05, 0xff, 0x4c, 0x00, 0x10, 0x05, // manufacturer data
        ];
        let fields = ok_fields(&section);
        assert_eq!(fields.len(), 5);
        assert_eq!(encode_fields(&fields), section);
    }

    #[test]
    fn test_encode_round_trip_with_terminator() {
        let section = [0x03, 0x08, b'h', b'i', 0x00];
        let mut encoded = encode_fields(&ok_fields(&section));
        encoded.push(0x00);
        assert_eq!(encoded, section);
    }

    #[test]
    fn test_display_diagnostic_form() {
        let section = [0x02, 0x01, 0x06, 0x04, 0x09, b'D', b'o', b'g'];
        let rendered: Vec<String> = ok_fields(&section)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, ["{02 01:06}", "{Dog}"]);
    }
}
