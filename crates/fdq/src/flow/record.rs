//! The `FlowRecord` binary layout  and the concrete codec that
//! supplements the opaque external flow-record library .
//!
//! Records are never parsed by the distributed-query core : every
//! module outside this file only ever calls `FlowRecord::get`/`set` tagged by
//! [`FieldId`]. This mirrors `rlike::data_frame::column::types`
//! fixed-width typed-slot idea, without the general column-store machinery.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable integer field-id enumeration . Values are part of the wire
/// format (used as `HashMap`/`Vec` indices and broadcast inside `FieldSet`),
/// so variants are append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldId {
    SrcAddr,
    DstAddr,
    SrcPort,
    DstPort,
    Protocol,
    TcpFlags,
    FirstSeen,
    LastSeen,
    Octets,
    Packets,
    AggregatedFlows,
}

impl FieldId {
    /// Fixed binary size of this field, in bytes ( "Each field has a
    /// fixed binary size known from the field-id").
    pub fn size(self) -> usize {
        match self {
            FieldId::SrcAddr | FieldId::DstAddr => 16, // IPv4-mapped IPv6, uniform width
            FieldId::SrcPort | FieldId::DstPort => 2,
            FieldId::Protocol | FieldId::TcpFlags => 1,
            FieldId::FirstSeen | FieldId::LastSeen => 8,
            FieldId::Octets | FieldId::Packets | FieldId::AggregatedFlows => 8,
        }
    }

    pub fn all() -> &'static [FieldId] {
        &[
            FieldId::SrcAddr,
            FieldId::DstAddr,
            FieldId::SrcPort,
            FieldId::DstPort,
            FieldId::Protocol,
            FieldId::TcpFlags,
            FieldId::FirstSeen,
            FieldId::LastSeen,
            FieldId::Octets,
            FieldId::Packets,
            FieldId::AggregatedFlows,
        ]
    }

    /// Whether this field is numeric and may legally carry a `sort`/aggregate
    /// role .
    pub fn is_numeric(self) -> bool {
        !matches!(self, FieldId::SrcAddr | FieldId::DstAddr)
    }
}

/// A single field value. All numeric fields are stored widened to `u64` so
/// that `aggregate-sum`/`min`/`max` can operate uniformly; addresses are kept
/// as raw bytes since they are never aggregated, only keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    Bytes16([u8; 16]),
    U64(u64),
}

impl FieldValue {
    pub fn as_u64(self) -> Option<u64> {
        match self {
            FieldValue::U64(v) => Some(v),
            FieldValue::Bytes16(_) => None,
        }
    }
}

/// An in-memory flow record: a dense map from field-id to value. The fixed
/// on-disk layout (see [`FlowRecord::decode`]/[`FlowRecord::encode`]) concatenates
/// fields in [`FieldId::all`] order at their fixed widths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    values: HashMap<FieldId, FieldValue>,
}

impl FlowRecord {
    pub fn new() -> Self {
        Self { values: HashMap::new() }
    }

    pub fn get(&self, field: FieldId) -> Option<FieldValue> {
        self.values.get(&field).copied()
    }

    pub fn set(&mut self, field: FieldId, value: FieldValue) {
        self.values.insert(field, value);
    }

    /// Concatenate the given fields' raw bytes into a key tuple, in the order
    /// given, for use as an `AggregationTable` hash key (
    /// "key-tuple (concatenation of key fields)").
    pub fn key_bytes(&self, fields: impl Iterator<Item = FieldId>) -> Vec<u8> {
        let mut out = Vec::new();
        for field in fields {
            match self.values.get(&field) {
                Some(FieldValue::Bytes16(b)) => out.extend_from_slice(b),
                Some(FieldValue::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
                None => out.extend(std::iter::repeat(0u8).take(field.size())),
            }
        }
        out
    }

    /// Decode one fixed-width record from `buf`, which must be exactly
    /// `FlowRecord::encoded_len()` bytes.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let mut values = HashMap::new();
        let mut offset = 0usize;
        for &field in FieldId::all() {
            let size = field.size();
            let slice = buf.get(offset..offset + size)?;
            let value = match field {
                FieldId::SrcAddr | FieldId::DstAddr => {
                    let mut b = [0u8; 16];
                    b.copy_from_slice(slice);
                    FieldValue::Bytes16(b)
                }
                _ => {
                    let mut b = [0u8; 8];
                    b[..size].copy_from_slice(slice);
                    FieldValue::U64(u64::from_le_bytes(b))
                }
            };
            values.insert(field, value);
            offset += size;
        }
        Some(Self { values })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::encoded_len());
        for &field in FieldId::all() {
            match self.values.get(&field) {
                Some(FieldValue::Bytes16(b)) => out.extend_from_slice(b),
                Some(FieldValue::U64(v)) => out.extend_from_slice(&v.to_le_bytes()[..field.size()]),
                None => out.extend(std::iter::repeat(0u8).take(field.size())),
            }
        }
        out
    }

    pub fn encoded_len() -> usize {
        FieldId::all().iter().map(|f| f.size()).sum()
    }
}

impl Default for FlowRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let mut rec = FlowRecord::new();
        rec.set(FieldId::Protocol, FieldValue::U64(6));
        rec.set(FieldId::Octets, FieldValue::U64(1500));
        rec.set(FieldId::SrcAddr, FieldValue::Bytes16([1; 16]));

        let encoded = rec.encode();
        assert_eq!(encoded.len(), FlowRecord::encoded_len());
        let decoded = FlowRecord::decode(&encoded).unwrap();
        assert_eq!(decoded.get(FieldId::Protocol), Some(FieldValue::U64(6)));
        assert_eq!(decoded.get(FieldId::Octets), Some(FieldValue::U64(1500)));
        assert_eq!(decoded.get(FieldId::SrcAddr), Some(FieldValue::Bytes16([1; 16])));
    }

    #[test]
    fn key_bytes_are_stable_for_same_key_fields() {
        let mut a = FlowRecord::new();
        a.set(FieldId::Protocol, FieldValue::U64(17));
        let mut b = FlowRecord::new();
        b.set(FieldId::Protocol, FieldValue::U64(17));
        b.set(FieldId::Octets, FieldValue::U64(999)); // not a key field, must not affect the key
        assert_eq!(
            a.key_bytes(std::iter::once(FieldId::Protocol)),
            b.key_bytes(std::iter::once(FieldId::Protocol))
        );
    }
}
