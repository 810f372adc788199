//! VXI-11 core channel constants, see TCG VXI-11 Rev 1.0.

pub(crate) mod xdr;

/// VXI-11 core channel program number (395183)
pub const DEVICE_CORE: u32 = 0x0607AF;
/// VXI-11 core channel program version
pub const DEVICE_CORE_VERSION: u32 = 1;

/// VXI-11 async channel program number. The emulator advertises abort port 0
/// and never binds an async channel, but it answers an abort that arrives on
/// the core connection anyway.
pub const DEVICE_ASYNC: u32 = 0x0607B0;
pub(crate) const DEVICE_ABORT: u32 = 1;

// Core channel procedures
pub(crate) const CREATE_LINK: u32 = 10;
pub(crate) const DEVICE_WRITE: u32 = 11;
pub(crate) const DEVICE_READ: u32 = 12;
pub(crate) const DEVICE_READSTB: u32 = 13;
pub(crate) const DEVICE_TRIGGER: u32 = 14;
pub(crate) const DEVICE_CLEAR: u32 = 15;
pub(crate) const DEVICE_REMOTE: u32 = 16;
pub(crate) const DEVICE_LOCAL: u32 = 17;
pub(crate) const DEVICE_LOCK: u32 = 18;
pub(crate) const DEVICE_UNLOCK: u32 = 19;
pub(crate) const DEVICE_ENABLE_SRQ: u32 = 20;
pub(crate) const DEVICE_DOCMD: u32 = 22;
pub(crate) const DESTROY_LINK: u32 = 23;

/// DEVICE_READ reason bit: transfer ended because the device had no more
/// data. Every read this emulator answers is complete.
pub(crate) const READ_REASON_END: u32 = 0x04;

/// Initial VXI-11 core channel port. A Siglent scope resolves this via
/// Portmap before every session.
pub const VXI11_PORT_A: u16 = 9009;
/// Alternate core channel port the listener hops to between sessions.
pub const VXI11_PORT_B: u16 = 9010;
