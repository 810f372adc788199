//! The contract between the SCPI dispatcher and a physical generator.
//!
//! Drivers vary wildly underneath (raw serial line protocols, USBTMC, SCPI
//! over TCP); the dispatcher only sees the operations below. Transport
//! failures surface as [`DriverError`] and are logged and swallowed by the
//! dispatcher so a flaky generator cannot take the RPC stack down with it.

use std::fmt;
use std::io;

pub mod dummy;
pub mod factory;

/// Channels the emulated Siglent front panel exposes. The Bode feature only
/// ever drives one, but BSWV state is kept per channel.
pub const CHANNELS: usize = 2;

/// Waveform shapes of the Siglent BSWV vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformType {
    Sine,
    Square,
    Ramp,
    Pulse,
    Noise,
    Dc,
    Arb,
}

impl WaveformType {
    pub(crate) fn from_mnemonic(s: &str) -> Option<Self> {
        Some(match s {
            "SINE" => Self::Sine,
            "SQUARE" => Self::Square,
            "RAMP" => Self::Ramp,
            "PULSE" => Self::Pulse,
            "NOISE" => Self::Noise,
            "DC" => Self::Dc,
            "ARB" => Self::Arb,
            _ => return None,
        })
    }

    pub(crate) fn mnemonic(&self) -> &'static str {
        match self {
            Self::Sine => "SINE",
            Self::Square => "SQUARE",
            Self::Ramp => "RAMP",
            Self::Pulse => "PULSE",
            Self::Noise => "NOISE",
            Self::Dc => "DC",
            Self::Arb => "ARB",
        }
    }
}

/// Output termination the scope selects before a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLoad {
    /// 50 Ω termination
    Ohm50,
    /// High impedance
    HighZ,
}

impl fmt::Display for OutputLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLoad::Ohm50 => write!(f, "50"),
            OutputLoad::HighZ => write!(f, "HZ"),
        }
    }
}

/// Last commanded state of one generator channel. This is what BSWV? reports
/// back to the scope; the driver may lag behind if the transport hiccups.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub waveform: WaveformType,
    /// Hz
    pub frequency: f64,
    /// Volts peak-to-peak
    pub amplitude: f64,
    /// Volts
    pub offset: f64,
    /// Degrees, 0..360
    pub phase: f64,
    pub load: OutputLoad,
    pub output_on: bool,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            waveform: WaveformType::Sine,
            frequency: 1_000.0,
            amplitude: 0.0,
            offset: 0.0,
            phase: 0.0,
            load: OutputLoad::HighZ,
            output_on: false,
        }
    }
}

/// A transport or protocol failure talking to the physical generator.
#[derive(Debug)]
pub enum DriverError {
    /// Underlying serial/TCP/USB transport failed
    Io(io::Error),
    /// Operation attempted before `connect` or after `disconnect`
    NotConnected,
    /// The generator rejected or cannot express the request
    Unsupported(&'static str),
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Io(err) => write!(f, "transport error: {}", err),
            DriverError::NotConnected => write!(f, "not connected"),
            DriverError::Unsupported(what) => write!(f, "unsupported by generator: {}", what),
        }
    }
}

impl std::error::Error for DriverError {}

/// Operations the dispatcher needs from a generator. Channels are 1-indexed
/// as on the instrument front panels.
///
/// Implementations should keep their own transport timeouts modest; a call
/// that blocks stalls the scope's sweep.
pub trait Awg {
    /// Acquire the transport. Called once at startup.
    fn connect(&mut self) -> Result<(), DriverError>;

    /// Release the transport. Called on every shutdown path.
    fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Place a channel in a known off, zero state.
    fn initialize_channel(&mut self, channel: usize) -> Result<(), DriverError>;

    fn set_output_load(&mut self, channel: usize, load: OutputLoad) -> Result<(), DriverError>;

    fn set_output_on(&mut self, channel: usize, on: bool) -> Result<(), DriverError>;

    fn set_waveform_type(
        &mut self,
        channel: usize,
        waveform: WaveformType,
    ) -> Result<(), DriverError>;

    fn set_frequency(&mut self, channel: usize, hz: f64) -> Result<(), DriverError>;

    fn set_amplitude(&mut self, channel: usize, vpp: f64) -> Result<(), DriverError>;

    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), DriverError>;

    fn set_phase(&mut self, channel: usize, degrees: f64) -> Result<(), DriverError>;
}
