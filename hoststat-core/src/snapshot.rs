//! Metric snapshot and its wire encoding.
//!
//! A snapshot goes on the wire as a CBOR map keyed by field index
//! (`0` = cpu, `1` = mem, `2` = disk). A reading the sampler could not take
//! is left out of the map instead of being replaced by a sentinel, so a
//! consumer can tell "0 %" from "unavailable".
//!
//! Decoding skips keys it does not know and treats a missing key as an
//! absent reading. Newer collectors can therefore add fields without
//! breaking older viewers.

use minicbor::{Decode, Encode};

use crate::error::CodecError;

/// One sample of the three tracked metrics, each a percentage in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Encode, Decode)]
#[cbor(map)]
pub struct MetricSnapshot {
    #[n(0)]
    pub cpu: Option<f64>,
    #[n(1)]
    pub mem: Option<f64>,
    #[n(2)]
    pub disk: Option<f64>,
}

impl MetricSnapshot {
    pub fn new(cpu: Option<f64>, mem: Option<f64>, disk: Option<f64>) -> Self {
        Self { cpu, mem, disk }
    }

    /// True when every reading is absent.
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.mem.is_none() && self.disk.is_none()
    }

    fn readings(&self) -> [(&'static str, Option<f64>); 3] {
        [("cpu", self.cpu), ("mem", self.mem), ("disk", self.disk)]
    }

    /// Checks every present reading is a finite percentage.
    pub fn validate(&self) -> Result<(), CodecError> {
        for (field, value) in self.readings() {
            if let Some(value) = value {
                if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                    return Err(CodecError::OutOfRange { field, value });
                }
            }
        }
        Ok(())
    }
}

/// Encodes a snapshot. Fails only when a reading violates the percentage range.
pub fn encode(snapshot: &MetricSnapshot) -> Result<Vec<u8>, CodecError> {
    snapshot.validate()?;
    minicbor::to_vec(snapshot).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decodes a snapshot produced by [`encode`] or by a newer encoder. The
/// payload must be exactly one CBOR item.
pub fn decode(bytes: &[u8]) -> Result<MetricSnapshot, CodecError> {
    let mut decoder = minicbor::Decoder::new(bytes);
    let snapshot: MetricSnapshot = decoder
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if decoder.position() != bytes.len() {
        return Err(CodecError::Decode(format!(
            "{} trailing bytes after snapshot",
            bytes.len() - decoder.position()
        )));
    }
    snapshot.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// A later revision of the format with extra fields.
    #[derive(Encode)]
    #[cbor(map)]
    struct FutureSnapshot {
        #[n(0)]
        cpu: Option<f64>,
        #[n(1)]
        mem: Option<f64>,
        #[n(2)]
        disk: Option<f64>,
        #[n(3)]
        load: Option<f64>,
        #[n(4)]
        hostname: Option<String>,
    }

    /// An older or partial encoder that only knows about cpu.
    #[derive(Encode)]
    #[cbor(map)]
    struct CpuOnly {
        #[n(0)]
        cpu: Option<f64>,
    }

    #[test]
    fn test_partial_snapshot_scenario() {
        let snapshot = MetricSnapshot::new(Some(42.5), None, Some(10.0));
        let decoded = decode(&encode(&snapshot).unwrap()).unwrap();

        assert_eq!(decoded.cpu, Some(42.5));
        assert_eq!(decoded.mem, None);
        assert_eq!(decoded.disk, Some(10.0));
    }

    #[test]
    fn test_zero_is_not_absent() {
        let snapshot = MetricSnapshot::new(Some(0.0), None, Some(0.0));
        let decoded = decode(&encode(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded.cpu, Some(0.0));
        assert!(decoded.mem.is_none());
    }

    #[test]
    fn test_empty_snapshot_round_trips() {
        let snapshot = MetricSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(decode(&encode(&snapshot).unwrap()).unwrap(), snapshot);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let future = FutureSnapshot {
            cpu: Some(12.0),
            mem: Some(55.5),
            disk: None,
            load: Some(3.2),
            hostname: Some("db-01".to_string()),
        };
        let bytes = minicbor::to_vec(&future).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, MetricSnapshot::new(Some(12.0), Some(55.5), None));
    }

    #[test]
    fn test_missing_fields_decode_as_absent() {
        let bytes = minicbor::to_vec(&CpuOnly { cpu: Some(99.0) }).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.cpu, Some(99.0));
        assert!(decoded.mem.is_none());
        assert!(decoded.disk.is_none());
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(matches!(decode(&[]), Err(CodecError::Decode(_))));
        assert!(matches!(decode(&[0xff, 0x00, 0x13]), Err(CodecError::Decode(_))));
        assert!(matches!(decode(b"not cbor at all"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode(&MetricSnapshot::new(Some(42.5), None, None)).unwrap();
        bytes.extend_from_slice(&[0xff, 0xff]);
        assert!(matches!(decode(&bytes), Err(CodecError::Decode(_))));

        // Two snapshots back to back are not one snapshot either.
        let one = encode(&MetricSnapshot::new(Some(1.0), None, None)).unwrap();
        let doubled = [one.clone(), one].concat();
        assert!(matches!(decode(&doubled), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_out_of_range_readings() {
        let too_high = MetricSnapshot::new(Some(100.5), None, None);
        assert!(matches!(
            encode(&too_high),
            Err(CodecError::OutOfRange { field: "cpu", .. })
        ));

        let nan = MetricSnapshot::new(None, Some(f64::NAN), None);
        assert!(matches!(
            encode(&nan),
            Err(CodecError::OutOfRange { field: "mem", .. })
        ));

        // A peer that skips validation must still be caught on the way in.
        let bytes = minicbor::to_vec(&MetricSnapshot::new(None, None, Some(-1.0))).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::OutOfRange { field: "disk", .. })
        ));
    }

    fn reading() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![Just(None), (0.0..=100.0f64).prop_map(Some)]
    }

    proptest! {
        #[test]
        fn test_round_trip(cpu in reading(), mem in reading(), disk in reading()) {
            let snapshot = MetricSnapshot::new(cpu, mem, disk);
            let bytes = encode(&snapshot).unwrap();
            prop_assert_eq!(decode(&bytes).unwrap(), snapshot);
        }
    }
}
