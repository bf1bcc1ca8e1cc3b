// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Host runner for the Modbus node.
//!
//! Brings the node up against the smoltcp loopback stack, drives a scripted
//! sequence of link events, and lets the health timer run for a few periods.
//! Set `RUST_LOG` to adjust verbosity.

use anyhow::Result;

fn main() -> Result<()> {
    modbus_node::host::main()
}
