//! Report-slave-id codec
//!
//! ```text
//! 0         1        2        3       6          10      11
//! +---------+--------+--------+-------+----------+-------+
//! | product | run    | type   | ver   | serial BE| fault |
//! +---------+--------+--------+-------+----------+-------+
//! ```

use serde::Serialize;

use crate::error::{LinkError, Result};

pub const SLAVE_ID_MIN_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
    Unknown,
}

impl From<u8> for RunState {
    fn from(indicator: u8) -> Self {
        match indicator {
            0xFF => RunState::Running,
            0x00 => RunState::Stopped,
            _ => RunState::Unknown,
        }
    }
}

/// Coordinator identity as reported by report-slave-id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaveId {
    pub product: u8,
    pub product_type: u8,
    pub run_state: RunState,
    pub version: String,
    /// Ten digit, zero padded
    pub serial: String,
    pub fault: String,
}

fn fault_string(code: u8) -> String {
    match code {
        0 => "None".to_string(),
        1 => "Radio Fault".to_string(),
        2 => "Network Fault".to_string(),
        3 => "Configuration Fault".to_string(),
        other => format!("Fault 0x{:02X}", other),
    }
}

pub fn decode_slave_id(data: &[u8]) -> Result<SlaveId> {
    if data.len() < SLAVE_ID_MIN_LEN {
        return Err(LinkError::length(
            "slave id",
            format!("at least {SLAVE_ID_MIN_LEN}"),
            data.len(),
        ));
    }

    let serial = u32::from_be_bytes([data[6], data[7], data[8], data[9]]);
    Ok(SlaveId {
        product: data[0],
        run_state: RunState::from(data[1]),
        product_type: data[2],
        version: format!("{}.{}.{}", data[3], data[4], data[5]),
        serial: format!("{:010}", serial),
        fault: fault_string(data[10]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_slave_id() {
        let data = [0x21, 0xFF, 0x02, 1, 4, 7, 0x00, 0x00, 0x30, 0x39, 0x00];
        let id = decode_slave_id(&data).unwrap();
        assert_eq!(id.product, 0x21);
        assert_eq!(id.run_state, RunState::Running);
        assert_eq!(id.product_type, 2);
        assert_eq!(id.version, "1.4.7");
        assert_eq!(id.serial, "0000012345");
        assert_eq!(id.fault, "None");
    }

    #[test]
    fn test_fault_strings() {
        let mut data = [0u8; SLAVE_ID_MIN_LEN];
        data[10] = 2;
        assert_eq!(decode_slave_id(&data).unwrap().fault, "Network Fault");
        data[10] = 0x7E;
        assert_eq!(decode_slave_id(&data).unwrap().fault, "Fault 0x7E");
        assert_eq!(decode_slave_id(&data).unwrap().run_state, RunState::Stopped);
    }

    #[test]
    fn test_short_payload_fails() {
        assert!(matches!(
            decode_slave_id(&[0; 10]),
            Err(LinkError::ProtocolLength { actual: 10, .. })
        ));
    }
}
