// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use super::DecodeError;

/// The seven primitive types an index entry may carry.
///
/// Discriminants are the on-wire type codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Kind {
    Int16 = 0x03,
    Int32 = 0x04,
    String = 0x06,
    Binary = 0x07,
    StringArray = 0x08,
    I18nString = 0x09,
}

impl Kind {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x03 => Kind::Int16,
            0x04 => Kind::Int32,
            0x06 => Kind::String,
            0x07 => Kind::Binary,
            0x08 => Kind::StringArray,
            0x09 => Kind::I18nString,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Only integer entries are aligned inside the data region. Some rpm
    /// consumers fail when integers are unaligned, others when anything
    /// else is.
    pub fn alignment(self) -> usize {
        match self {
            Kind::Int16 => 2,
            Kind::Int32 => 4,
            Kind::String | Kind::Binary | Kind::StringArray | Kind::I18nString => 1,
        }
    }
}

/// A decoded index entry payload.
///
/// Strings are stored without their wire NUL terminators; encoding puts
/// them back. Integer vectors mirror the wire element order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    String(String),
    Binary(Vec<u8>),
    StringArray(Vec<String>),
    I18nString(Vec<String>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Int16(_) => Kind::Int16,
            Value::Int32(_) => Kind::Int32,
            Value::String(_) => Kind::String,
            Value::Binary(_) => Kind::Binary,
            Value::StringArray(_) => Kind::StringArray,
            Value::I18nString(_) => Kind::I18nString,
        }
    }

    /// The wire `count` field: element count for everything except
    /// binary, where it is the total byte count.
    pub fn count(&self) -> usize {
        match self {
            Value::Int16(values) => values.len(),
            Value::Int32(values) => values.len(),
            Value::String(_) => 1,
            Value::Binary(bytes) => bytes.len(),
            Value::StringArray(values) => values.len(),
            Value::I18nString(values) => values.len(),
        }
    }

    pub(super) fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int16(values) => {
                for value in values {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            Value::Int32(values) => {
                for value in values {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            Value::String(value) => {
                out.extend_from_slice(value.as_bytes());
                out.push(0);
            }
            Value::Binary(bytes) => out.extend_from_slice(bytes),
            Value::StringArray(values) | Value::I18nString(values) => {
                for value in values {
                    out.extend_from_slice(value.as_bytes());
                    out.push(0);
                }
            }
        }
    }

    /// Slice one entry out of a header data region.
    pub(super) fn decode(
        kind: Kind,
        data: &[u8],
        offset: usize,
        count: usize,
    ) -> Result<Self, DecodeError> {
        match kind {
            Kind::Int16 => {
                let bytes = slice(data, offset, count * 2)?;
                Ok(Value::Int16(
                    bytes
                        .chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]))
                        .collect(),
                ))
            }
            Kind::Int32 => {
                let bytes = slice(data, offset, count * 4)?;
                Ok(Value::Int32(
                    bytes
                        .chunks_exact(4)
                        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                        .collect(),
                ))
            }
            Kind::String => Ok(Value::String(scan_string(data, offset)?.0)),
            Kind::Binary => Ok(Value::Binary(slice(data, offset, count)?.to_vec())),
            Kind::StringArray => Ok(Value::StringArray(scan_strings(data, offset, count)?)),
            Kind::I18nString => Ok(Value::I18nString(scan_strings(data, offset, count)?)),
        }
    }

    /// Scalar string view: plain strings directly, the first element of
    /// localised or array entries.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            Value::StringArray(values) | Value::I18nString(values) => {
                values.first().map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Int32(values) => values.first().copied(),
            _ => None,
        }
    }

    pub(crate) fn into_string(self) -> Option<String> {
        match self {
            Value::String(value) => Some(value),
            Value::StringArray(mut values) | Value::I18nString(mut values) => {
                if values.is_empty() {
                    None
                } else {
                    Some(values.remove(0))
                }
            }
            _ => None,
        }
    }

    pub(crate) fn into_strings(self) -> Option<Vec<String>> {
        match self {
            Value::StringArray(values) | Value::I18nString(values) => Some(values),
            Value::String(value) => Some(vec![value]),
            _ => None,
        }
    }

    pub(crate) fn into_u16s(self) -> Option<Vec<u16>> {
        match self {
            Value::Int16(values) => Some(values),
            _ => None,
        }
    }

    pub(crate) fn into_u32s(self) -> Option<Vec<u32>> {
        match self {
            Value::Int32(values) => Some(values),
            _ => None,
        }
    }
}

fn slice(data: &[u8], offset: usize, length: usize) -> Result<&[u8], DecodeError> {
    data.get(offset..offset + length)
        .ok_or(DecodeError::TruncatedHeader)
}

/// NUL terminated string starting at `offset`; returns the string and
/// the offset one past its terminator.
fn scan_string(data: &[u8], offset: usize) -> Result<(String, usize), DecodeError> {
    let rest = data.get(offset..).ok_or(DecodeError::TruncatedHeader)?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::TruncatedHeader)?;
    let value = String::from_utf8_lossy(&rest[..nul]).into_owned();
    Ok((value, offset + nul + 1))
}

fn scan_strings(data: &[u8], offset: usize, count: usize) -> Result<Vec<String>, DecodeError> {
    let mut values = Vec::with_capacity(count);
    let mut cursor = offset;
    for _ in 0..count {
        let (value, next) = scan_string(data, cursor)?;
        values.push(value);
        cursor = next;
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integers_roundtrip() {
        let value = Value::Int32(vec![1, 0xdead_beef, 3]);
        let mut data = vec![];
        value.encode_into(&mut data);
        assert_eq!(data.len(), 12);
        assert_eq!(Value::decode(Kind::Int32, &data, 0, 3).unwrap(), value);

        let value = Value::Int16(vec![0o755, 0o644]);
        let mut data = vec![];
        value.encode_into(&mut data);
        assert_eq!(Value::decode(Kind::Int16, &data, 0, 2).unwrap(), value);
    }

    #[test]
    fn string_array_roundtrip() {
        let value = Value::StringArray(vec!["one".into(), String::new(), "three".into()]);
        let mut data = vec![0xff]; // entries need not start the region
        value.encode_into(&mut data);
        assert_eq!(Value::decode(Kind::StringArray, &data, 1, 3).unwrap(), value);
    }

    #[test]
    fn unterminated_string_is_truncation() {
        let data = b"no terminator".to_vec();
        assert!(matches!(
            Value::decode(Kind::String, &data, 0, 1),
            Err(DecodeError::TruncatedHeader)
        ));
    }

    #[test]
    fn short_region_is_truncation() {
        let data = vec![0u8; 6];
        assert!(matches!(
            Value::decode(Kind::Int32, &data, 0, 2),
            Err(DecodeError::TruncatedHeader)
        ));
    }
}
