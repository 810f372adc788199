//! Portmap/Rpcbind protocol constants, see
//! [RFC1833](https://datatracker.ietf.org/doc/html/rfc1833).

pub(crate) mod xdr;

/// Port used for portmapper/rpcbind, both TCP and UDP
pub const PORTMAPPER_PORT: u16 = 111;

/// Portmapper program number
pub(crate) const PORTMAPPER_PROG: u32 = 100000;
/// Oldest protocol version answered (the v2 portmap subset)
pub(crate) const PORTMAPPER_VERS_MIN: u32 = 2;
/// Newest protocol version answered; rpcbind v3/v4 GETADDR-era clients still
/// issue plain GETPORT, which is all the scope ever sends
pub(crate) const PORTMAPPER_VERS_MAX: u32 = 4;

pub const PORTMAPPER_PROT_TCP: u32 = 6;
pub const PORTMAPPER_PROT_UDP: u32 = 17;

/// Null procedure
pub(crate) const PMAPPROC_NULL: u32 = 0;
/// Getport procedure
pub(crate) const PMAPPROC_GETPORT: u32 = 3;
