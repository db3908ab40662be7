//! Native binary snapshot.
//!
//! Layout: 8-byte magic, little-endian `u32` format version, then the
//! bincode encoding of the whole [`PowerNet`] including attached results.
//! Snapshots are tied to this version of the model and are not an
//! interchange format.

use std::fs;
use std::path::Path;

use gridmate_core::{GridError, GridResult, PowerNet};

use crate::ImportResult;

const MAGIC: &[u8; 8] = b"GRIDMATE";
const SNAPSHOT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

pub fn encode_snapshot(net: &PowerNet) -> GridResult<Vec<u8>> {
    let payload = bincode::serialize(net)
        .map_err(|e| GridError::Parse(format!("encoding snapshot: {e}")))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_snapshot(bytes: &[u8]) -> GridResult<PowerNet> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(GridError::Parse(
            "not a gridmate binary snapshot (bad header)".to_string(),
        ));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != SNAPSHOT_VERSION {
        return Err(GridError::Parse(format!(
            "snapshot version {version} is not supported (expected {SNAPSHOT_VERSION})"
        )));
    }
    bincode::deserialize(&bytes[HEADER_LEN..])
        .map_err(|e| GridError::Parse(format!("decoding snapshot: {e}")))
}

pub fn read_snapshot(path: &Path) -> GridResult<ImportResult> {
    let bytes = fs::read(path)?;
    let network = decode_snapshot(&bytes)?;
    let diagnostics = network.validate();
    Ok(ImportResult {
        network,
        diagnostics,
    })
}

/// Writes a snapshot file. Tool-facing saves only produce JSON; snapshots
/// are written by embedding programs and test fixtures.
pub fn write_snapshot(net: &PowerNet, path: &Path) -> GridResult<()> {
    fs::write(path, encode_snapshot(net)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmate_core::{BusType, ElementKind};

    #[test]
    fn test_snapshot_keeps_counters_and_flags() {
        let mut net = PowerNet::new("snap", 60.0, 10.0);
        let a = net.create_bus("a", 110.0, BusType::Busbar, None).unwrap();
        let b = net.create_bus("b", 110.0, BusType::Busbar, None).unwrap();
        net.create_line(a, b, 12.0, "243-AL1/39-ST1A 110.0", None).unwrap();
        net.set_in_service(ElementKind::Line, 0, false).unwrap();
        let tmp = net.create_bus("tmp", 110.0, BusType::Node, None).unwrap();
        net.remove_element(ElementKind::Bus, tmp).unwrap();

        let back = decode_snapshot(&encode_snapshot(&net).unwrap()).unwrap();
        assert_eq!(back.counts(), net.counts());
        assert_eq!(back.f_hz, 60.0);
        assert!(!back.line.get(0).unwrap().in_service);
        assert_eq!(back.bus.next_index(), net.bus.next_index());
        assert_eq!(back.revision(), net.revision());
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        assert!(decode_snapshot(b"PK\x03\x04 zip file").is_err());
        assert!(decode_snapshot(b"").is_err());
        let mut bytes = encode_snapshot(&PowerNet::default()).unwrap();
        bytes[8] = 99;
        let err = decode_snapshot(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }
}
