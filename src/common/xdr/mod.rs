//! XDR implementation and types for the protocols this crate speaks

pub mod basic;

pub mod prelude {
    pub use super::basic::*;
    pub use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
}
