//! Parser and dispatcher for the SCPI subset a Siglent scope emits while
//! driving a Bode sweep.
//!
//! The vocabulary is small and rigidly shaped: an optional `Cn:` channel
//! prefix, a mnemonic, then comma-separated `KEY,VALUE` pairs; several
//! commands may arrive joined by `;` in one DEVICE_WRITE. Unknown mnemonics
//! and keys are logged and skipped — a parse failure must never break the
//! sweep, the scope does not look at write errors.

use std::fmt;

use crate::awg::{Awg, ChannelState, DriverError, OutputLoad, WaveformType, CHANNELS};

/// Identification tuple sent after `IDN-SGLT-PRI,`. The scope accepts any
/// tuple that looks like a Siglent SDG family member.
const DEFAULT_ID: &str = "SDG1062X,SDG00000000000,1.01.01.33R1";

#[derive(Debug)]
pub enum ScpiError {
    UnknownCommand(String),
    UnknownChannel(usize),
    MissingValue(&'static str),
    BadNumber(String),
    BadWaveform(String),
}

impl fmt::Display for ScpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScpiError::UnknownCommand(cmd) => write!(f, "unknown command {:?}", cmd),
            ScpiError::UnknownChannel(ch) => write!(f, "no such channel C{}", ch),
            ScpiError::MissingValue(key) => write!(f, "missing value for {}", key),
            ScpiError::BadNumber(tok) => write!(f, "unparseable number {:?}", tok),
            ScpiError::BadWaveform(tok) => write!(f, "unknown waveform {:?}", tok),
        }
    }
}

impl std::error::Error for ScpiError {}

/// Parse a numeric token, tolerating the engineering suffixes the scope
/// appends. Multipliers apply where the suffix implies one.
fn parse_value(token: &str) -> Result<f64, ScpiError> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("KHZ", 1e3),
        ("MHZ", 1e6),
        ("HZ", 1.0),
        ("VPP", 1.0),
        ("V", 1.0),
        ("MS", 1e-3),
        ("US", 1e-6),
        ("NS", 1e-9),
        ("S", 1.0),
        ("%", 1.0),
    ];
    let token = token.trim();
    let (digits, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| token.strip_suffix(suffix).map(|d| (d.trim_end(), *mult)))
        .unwrap_or((token, 1.0));
    digits
        .parse::<f64>()
        .map(|v| v * multiplier)
        .map_err(|_| ScpiError::BadNumber(token.to_string()))
}

/// Split an optional `Cn:` prefix off a command; channel defaults to 1.
/// A prefix that is not a channel selector is left on the command and will
/// fall out as an unknown mnemonic.
fn split_channel(cmd: &str) -> (usize, &str) {
    if let Some((prefix, rest)) = cmd.split_once(':') {
        if let Some(digits) = prefix.strip_prefix('C') {
            if let Ok(n) = digits.parse::<usize>() {
                return (n, rest.trim_start());
            }
        }
    }
    (1, cmd)
}

/// Integer-looking floats print without a fraction so replies read like
/// Siglent firmware output ("FRQ,15000HZ" rather than "FRQ,15000.0HZ").
fn format_num(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn check(res: Result<(), DriverError>) {
    if let Err(err) = res {
        log::error!("AWG driver: {}", err);
    }
}

/// Owns the AWG driver and the per-channel state, and turns decoded SCPI
/// payloads into driver operations. Created once at startup; dropping it
/// disconnects the driver, whichever way the process goes down.
pub struct ScpiDispatcher {
    driver: Box<dyn Awg + Send>,
    channels: [ChannelState; CHANNELS],
    id: String,
}

impl ScpiDispatcher {
    pub fn new(driver: Box<dyn Awg + Send>) -> Self {
        Self::with_id(driver, DEFAULT_ID)
    }

    pub fn with_id(driver: Box<dyn Awg + Send>, id: &str) -> Self {
        Self {
            driver,
            channels: Default::default(),
            id: id.to_string(),
        }
    }

    /// Drive every channel to the known off, zero state.
    pub fn initialize(&mut self) {
        for ch in 1..=CHANNELS {
            check(self.driver.initialize_channel(ch));
        }
    }

    /// Last commanded state of a channel (1-indexed).
    pub fn channel(&self, channel: usize) -> &ChannelState {
        &self.channels[channel - 1]
    }

    /// Execute a full DEVICE_WRITE payload: `;`-joined commands apply left to
    /// right, and the response of the last query (if any) is returned.
    pub fn execute(&mut self, payload: &str) -> Option<String> {
        let mut response = None;
        for command in payload.split(';') {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            match self.execute_command(command) {
                Ok(Some(reply)) => response = Some(reply),
                Ok(None) => {}
                Err(err) => log::warn!("SCPI {:?}: {}", command, err),
            }
        }
        response
    }

    fn execute_command(&mut self, command: &str) -> Result<Option<String>, ScpiError> {
        let command = command.to_ascii_uppercase();
        let (channel, rest) = split_channel(&command);
        if channel == 0 || channel > CHANNELS {
            return Err(ScpiError::UnknownChannel(channel));
        }

        let (mnemonic, args) = match rest.split_once(char::is_whitespace) {
            Some((m, a)) => (m, a.trim()),
            None => (rest, ""),
        };

        match mnemonic {
            "IDN-SGLT-PRI?" => Ok(Some(format!("IDN-SGLT-PRI,{}", self.id))),
            "BSWV?" => Ok(Some(self.format_bswv(channel))),
            "BSWV" => {
                self.apply_bswv(channel, args)?;
                Ok(None)
            }
            "OUTP" => {
                self.apply_outp(channel, args)?;
                Ok(None)
            }
            _ => Err(ScpiError::UnknownCommand(mnemonic.to_string())),
        }
    }

    fn apply_bswv(&mut self, channel: usize, args: &str) -> Result<(), ScpiError> {
        let mut tokens = args.split(',').map(str::trim).filter(|t| !t.is_empty());
        while let Some(key) = tokens.next() {
            match key {
                "WVTP" => {
                    let value = tokens.next().ok_or(ScpiError::MissingValue("WVTP"))?;
                    let waveform = WaveformType::from_mnemonic(value)
                        .ok_or_else(|| ScpiError::BadWaveform(value.to_string()))?;
                    self.channels[channel - 1].waveform = waveform;
                    check(self.driver.set_waveform_type(channel, waveform));
                }
                "FRQ" => {
                    let hz = parse_value(tokens.next().ok_or(ScpiError::MissingValue("FRQ"))?)?;
                    self.channels[channel - 1].frequency = hz;
                    check(self.driver.set_frequency(channel, hz));
                }
                "AMP" => {
                    let vpp = parse_value(tokens.next().ok_or(ScpiError::MissingValue("AMP"))?)?;
                    self.channels[channel - 1].amplitude = vpp;
                    check(self.driver.set_amplitude(channel, vpp));
                }
                "OFST" => {
                    let volts =
                        parse_value(tokens.next().ok_or(ScpiError::MissingValue("OFST"))?)?;
                    self.channels[channel - 1].offset = volts;
                    check(self.driver.set_offset(channel, volts));
                }
                "PHSE" => {
                    let degrees =
                        parse_value(tokens.next().ok_or(ScpiError::MissingValue("PHSE"))?)?;
                    self.channels[channel - 1].phase = degrees;
                    check(self.driver.set_phase(channel, degrees));
                }
                // Not every generator can express duty cycle; the sweep does
                // not depend on it.
                "DUTY" => {
                    let _ = tokens.next();
                }
                other => {
                    log::debug!("BSWV: ignoring key {}", other);
                    let _ = tokens.next();
                }
            }
        }
        Ok(())
    }

    fn apply_outp(&mut self, channel: usize, args: &str) -> Result<(), ScpiError> {
        let mut tokens = args.split(',').map(str::trim).filter(|t| !t.is_empty());
        while let Some(token) = tokens.next() {
            match token {
                "ON" => {
                    self.channels[channel - 1].output_on = true;
                    check(self.driver.set_output_on(channel, true));
                }
                "OFF" => {
                    self.channels[channel - 1].output_on = false;
                    check(self.driver.set_output_on(channel, false));
                }
                "LOAD" => {
                    let load = match tokens.next().ok_or(ScpiError::MissingValue("LOAD"))? {
                        "50" => OutputLoad::Ohm50,
                        "HZ" => OutputLoad::HighZ,
                        other => {
                            log::debug!("OUTP: ignoring load {}", other);
                            continue;
                        }
                    };
                    self.channels[channel - 1].load = load;
                    check(self.driver.set_output_load(channel, load));
                }
                // Polarity is accepted but the sweep never inverts.
                "PLRT" => {
                    let _ = tokens.next();
                }
                other => log::debug!("OUTP: ignoring token {}", other),
            }
        }
        Ok(())
    }

    /// Format the BSWV? reply the way Siglent firmware does. The scope only
    /// glances at a few fields but the key order is load-bearing.
    fn format_bswv(&self, channel: usize) -> String {
        let state = &self.channels[channel - 1];
        let period = if state.frequency > 0.0 {
            1.0 / state.frequency
        } else {
            0.0
        };
        let high = state.offset + state.amplitude / 2.0;
        let low = state.offset - state.amplitude / 2.0;
        format!(
            "C{}:BSWV WVTP,{},FRQ,{}HZ,PRD,{}S,AMP,{}V,OFST,{}V,HLEV,{}V,LLEV,{}V,PHSE,{}",
            channel,
            state.waveform.mnemonic(),
            format_num(state.frequency),
            format_num(period),
            format_num(state.amplitude),
            format_num(state.offset),
            format_num(high),
            format_num(low),
            format_num(state.phase),
        )
    }
}

impl Drop for ScpiDispatcher {
    fn drop(&mut self) {
        if let Err(err) = self.driver.disconnect() {
            log::warn!("AWG driver disconnect: {}", err);
        }
    }
}
