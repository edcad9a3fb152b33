//! Pipe interface loopback through `cat`.
//!
//! Run with: `cargo run -p meshprims --example pipe-loopback`

use std::time::Duration;

use meshprims::transport::{
    build_interface, inbound_channel, FailurePolicy, InterfaceConfig, PipeConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (inbound, frames) = inbound_channel();
    let config = InterfaceConfig::Pipe(PipeConfig::new("loopback", "cat").with_respawn_delay(1.0));
    let iface = build_interface(&config, inbound, FailurePolicy::Reconnect)?;

    for msg in ["hello", "mesh \u{7e} world", "bye"] {
        iface.send(msg.as_bytes())?;
        let frame = frames.recv_timeout(Duration::from_secs(2))?;
        println!(
            "{}: {}",
            frame.interface,
            String::from_utf8_lossy(frame.payload.as_ref())
        );
    }

    let stats = iface.stats();
    println!("rx={} tx={}", stats.rx_bytes, stats.tx_bytes);
    iface.shutdown();
    Ok(())
}
