//! Wire-level building blocks: XDR codec, ONC RPC framing and dispatch,
//! Portmap and VXI-11 protocol types.

pub mod onc_rpc;
pub mod portmapper;
pub mod vxi11;
pub mod xdr;
