//! Device object codecs
//!
//! Pure encode/decode functions for every fixed-layout object the coordinator
//! exposes. No I/O and no state: decoding yields a fresh value, encoding a
//! fresh buffer.
//!
//! | Object           | Size                  | Notes                                  |
//! |------------------|-----------------------|----------------------------------------|
//! | factory record   | 20 bytes (or `[0x00]`)| `[0x00]` means unprogrammed            |
//! | connection table | n * 14 bytes          | only entries with the valid bit        |
//! | ping result      | >= 7 bytes            | shorter payloads mean "No Response"    |
//! | scan result      | >= 1 byte             | best channel then per-channel noise    |
//! | slave id         | >= 11 bytes           | report-slave-id payload                |

pub mod address;
pub mod connections;
pub mod factory;
pub mod ping;
pub mod scan;
pub mod slave_id;

pub use address::DeviceAddress;
pub use connections::{decode_connection_table, ConnectionEntry, ConnectionStatus, ENTRY_LEN};
pub use factory::{
    decode_factory_record, encode_factory_record, FactoryConfig, FactoryConfigInput,
    FACTORY_RECORD_LEN,
};
pub use ping::{decode_ping, encode_ping_request, LinkMetrics, PingResult, PING_MIN_LEN};
pub use scan::{decode_scan, encode_scan_request, ScanDuration, ScanResult, ScanType};
pub use slave_id::{decode_slave_id, RunState, SlaveId, SLAVE_ID_MIN_LEN};
