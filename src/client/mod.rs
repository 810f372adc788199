//! Minimal RPC clients playing the oscilloscope's role. The integration
//! tests drive the responders with these; they cover exactly the calls a
//! Siglent scope issues during a Bode sweep.

pub mod portmapper;
pub mod vxi11;
