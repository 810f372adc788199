//! Pose as a Siglent arbitrary waveform generator on the local network so a
//! Siglent oscilloscope's built-in Bode plot feature can drive a third-party
//! generator.
//!
//! The scope finds its companion AWG via Portmap/Rpcbind on port 111 and
//! talks VXI-11 to it over TCP. This crate answers both: [`server`] carries
//! the responders and the two-port rotation the scope insists on, [`common`]
//! the XDR/ONC-RPC wire plumbing underneath, [`scpi`] the decoder for the
//! small Bode-sweep command vocabulary, and [`awg`] the contract a physical
//! generator driver has to satisfy. [`client`] plays the scope's role for
//! the integration tests.

pub mod awg;
pub mod client;
pub mod common;
pub mod scpi;
pub mod server;
