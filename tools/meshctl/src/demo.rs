//! Demo content for the simulated coordinator

use mesh_comlink::sim::SimulatedCoordinator;
use mesh_comlink::{ConnectionEntry, ConnectionStatus, DeviceAddress};

fn entry(short_address: u16, last_octet: u8, direct: bool) -> ConnectionEntry {
    ConnectionEntry {
        pan_id: 0x1A2B,
        short_address,
        address: DeviceAddress([0x00, 0x0D, 0x6F, 0x00, 0x0A, 0x5C, 0x11, last_octet]),
        status: ConnectionStatus {
            rx_on_when_idle: direct,
            direct_connection: direct,
            long_address_valid: true,
            short_address_valid: true,
            finish_join: true,
            is_family: false,
            is_valid: true,
        },
    }
}

/// Two joined nodes, one answering pings
pub fn seed(sim: &SimulatedCoordinator) {
    sim.add_connection(entry(0x0001, 0x01, true));
    sim.add_connection(entry(0x0002, 0x02, false));
    // result, rtt 42 (LE), fwd lqi/rssi, rev lqi/rssi
    sim.set_ping_reply(0x0001, vec![0x00, 0x2A, 0x00, 220, 0xC9, 210, 0xC4]);
    sim.set_register(0x0000, 0x0102);
}
