//! Accumulator for custom option values.
//!
//! Option messages (`FileOptions`, `FieldOptions`, ...) reserve field numbers
//! from 1000 upward for extensions. Those values are unknown when the schema
//! is decoded, so the translate phase records them raw here, keyed by field
//! number, and reinterprets them only when a typed accessor asks.
//!
//! Values are appended in wire order. Scalar reads scan backwards so the last
//! occurrence wins; message reads scan forwards and merge every payload.

use crate::error::{Error, Result};
use crate::wire::{read_fields, RawValue};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// First field number of the extension range declared by every options message
pub const FIRST_CUSTOM_OPTION_NUMBER: u32 = 1000;

/// A single stored option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Varint, fixed32 or fixed64 payload, widened to 64 bits
    Numeric(u64),
    /// Length-delimited payload
    Bytes(Bytes),
}

/// Custom option values captured from one options message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomOptions {
    values: BTreeMap<u32, Vec<OptionValue>>,
}

impl CustomOptions {
    /// Creates an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared read-only empty instance handed out for descriptors without options
    pub fn empty() -> &'static CustomOptions {
        static EMPTY: OnceLock<CustomOptions> = OnceLock::new();
        EMPTY.get_or_init(CustomOptions::default)
    }

    /// Scan a serialized options message and keep every extension-range field.
    ///
    /// Returns `None` when the message holds no custom options.
    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        let mut options = Self::new();
        for field in read_fields(data)? {
            if field.number < FIRST_CUSTOM_OPTION_NUMBER {
                continue;
            }
            match field.value {
                RawValue::Varint(value) | RawValue::Fixed64(value) => {
                    options.push_numeric(field.number, value)
                }
                RawValue::Fixed32(value) => options.push_numeric(field.number, u64::from(value)),
                RawValue::Bytes(bytes) => {
                    options.push_bytes(field.number, Bytes::copy_from_slice(bytes))
                }
                // Group-typed options are not representable in either discriminant
                RawValue::Group(_) => {}
            }
        }
        Ok((!options.is_empty()).then_some(options))
    }

    /// Append a numeric value for `number`
    pub fn push_numeric(&mut self, number: u32, value: u64) {
        self.values
            .entry(number)
            .or_default()
            .push(OptionValue::Numeric(value));
    }

    /// Append a byte payload for `number`
    pub fn push_bytes(&mut self, number: u32, value: impl Into<Bytes>) {
        self.values
            .entry(number)
            .or_default()
            .push(OptionValue::Bytes(value.into()));
    }

    /// Returns true if no option was captured
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field numbers with at least one stored value, ascending
    pub fn field_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.values.keys().copied()
    }

    /// Every value stored for `number`, in wire order
    pub fn values(&self, number: u32) -> &[OptionValue] {
        self.values.get(&number).map(Vec::as_slice).unwrap_or(&[])
    }

    fn last_numeric(&self, number: u32) -> Option<u64> {
        self.values(number).iter().rev().find_map(|value| match value {
            OptionValue::Numeric(n) => Some(*n),
            OptionValue::Bytes(_) => None,
        })
    }

    fn last_bytes(&self, number: u32) -> Option<&Bytes> {
        self.values(number).iter().rev().find_map(|value| match value {
            OptionValue::Bytes(b) => Some(b),
            OptionValue::Numeric(_) => None,
        })
    }

    /// Read a `bool` option: only a stored `1` is true
    pub fn try_get_bool(&self, number: u32) -> Option<bool> {
        self.last_numeric(number).map(|v| v == 1)
    }

    /// Read an `int32` option from the low 32 bits
    pub fn try_get_int32(&self, number: u32) -> Option<i32> {
        self.last_numeric(number).map(|v| v as u32 as i32)
    }

    /// Read an `int64` option
    pub fn try_get_int64(&self, number: u32) -> Option<i64> {
        self.last_numeric(number).map(|v| v as i64)
    }

    /// Read a `uint32` option from the low 32 bits
    pub fn try_get_uint32(&self, number: u32) -> Option<u32> {
        self.last_numeric(number).map(|v| v as u32)
    }

    /// Read a `uint64` option
    pub fn try_get_uint64(&self, number: u32) -> Option<u64> {
        self.last_numeric(number)
    }

    /// Read a zigzag-encoded `sint32` option
    pub fn try_get_sint32(&self, number: u32) -> Option<i32> {
        self.last_numeric(number).map(|v| decode_zigzag32(v as u32))
    }

    /// Read a zigzag-encoded `sint64` option
    pub fn try_get_sint64(&self, number: u32) -> Option<i64> {
        self.last_numeric(number).map(decode_zigzag64)
    }

    /// Read a `fixed32` option
    pub fn try_get_fixed32(&self, number: u32) -> Option<u32> {
        self.try_get_uint32(number)
    }

    /// Read a `fixed64` option
    pub fn try_get_fixed64(&self, number: u32) -> Option<u64> {
        self.try_get_uint64(number)
    }

    /// Read an `sfixed32` option
    pub fn try_get_sfixed32(&self, number: u32) -> Option<i32> {
        self.try_get_int32(number)
    }

    /// Read an `sfixed64` option
    pub fn try_get_sfixed64(&self, number: u32) -> Option<i64> {
        self.try_get_int64(number)
    }

    /// Read a `float` option from the low 32 bits
    pub fn try_get_float(&self, number: u32) -> Option<f32> {
        self.last_numeric(number).map(|v| f32::from_bits(v as u32))
    }

    /// Read a `double` option
    pub fn try_get_double(&self, number: u32) -> Option<f64> {
        self.last_numeric(number).map(f64::from_bits)
    }

    /// Read a `bytes` option
    pub fn try_get_bytes(&self, number: u32) -> Option<Bytes> {
        self.last_bytes(number).cloned()
    }

    /// Read a `string` option; payloads that are not UTF-8 read as absent
    pub fn try_get_string(&self, number: u32) -> Option<String> {
        self.last_bytes(number)
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(str::to_owned)
    }

    /// Read a message option, merging every stored payload in order
    pub fn try_get_message<M>(&self, number: u32) -> Result<Option<M>>
    where
        M: prost::Message + Default,
    {
        let mut message: Option<M> = None;
        for value in self.values(number) {
            if let OptionValue::Bytes(bytes) = value {
                message
                    .get_or_insert_with(M::default)
                    .merge(bytes.clone())
                    .map_err(|source| Error::OptionDecode { number, source })?;
            }
        }
        Ok(message)
    }
}

fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
