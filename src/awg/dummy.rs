//! Driver that satisfies the contract without any hardware. Every operation
//! is logged and succeeds; useful for bring-up against a scope and for
//! exercising the RPC stack.

use super::{Awg, DriverError, OutputLoad, WaveformType};

#[derive(Debug, Default)]
pub struct DummyAwg;

impl DummyAwg {
    pub fn new() -> Self {
        Self
    }
}

impl Awg for DummyAwg {
    fn connect(&mut self) -> Result<(), DriverError> {
        log::info!("dummy: connect");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        log::info!("dummy: disconnect");
        Ok(())
    }

    fn initialize_channel(&mut self, channel: usize) -> Result<(), DriverError> {
        log::info!("dummy: initialize_channel({})", channel);
        Ok(())
    }

    fn set_output_load(&mut self, channel: usize, load: OutputLoad) -> Result<(), DriverError> {
        log::info!("dummy: set_output_load({}, {})", channel, load);
        Ok(())
    }

    fn set_output_on(&mut self, channel: usize, on: bool) -> Result<(), DriverError> {
        log::info!("dummy: set_output_on({}, {})", channel, on);
        Ok(())
    }

    fn set_waveform_type(
        &mut self,
        channel: usize,
        waveform: WaveformType,
    ) -> Result<(), DriverError> {
        log::info!("dummy: set_waveform_type({}, {})", channel, waveform.mnemonic());
        Ok(())
    }

    fn set_frequency(&mut self, channel: usize, hz: f64) -> Result<(), DriverError> {
        log::info!("dummy: set_frequency({}, {})", channel, hz);
        Ok(())
    }

    fn set_amplitude(&mut self, channel: usize, vpp: f64) -> Result<(), DriverError> {
        log::info!("dummy: set_amplitude({}, {})", channel, vpp);
        Ok(())
    }

    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), DriverError> {
        log::info!("dummy: set_offset({}, {})", channel, volts);
        Ok(())
    }

    fn set_phase(&mut self, channel: usize, degrees: f64) -> Result<(), DriverError> {
        log::info!("dummy: set_phase({}, {})", channel, degrees);
        Ok(())
    }
}
