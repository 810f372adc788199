//! Name-to-driver registry the CLI resolves its `driver_name` argument
//! against. Hardware drivers live out of tree; they register a constructor
//! here and get the transport settings the user passed on the command line.

use std::collections::BTreeMap;

use super::{dummy::DummyAwg, Awg, DriverError};

/// Transport settings handed to a driver constructor.
#[derive(Debug, Default, Clone)]
pub struct AwgSettings {
    /// Serial device path or VISA resource string; `None` for drivers that
    /// need no transport.
    pub port: Option<String>,
    /// Serial baud rate. Drivers with a fixed rate ignore it.
    pub baud: Option<u32>,
}

type Constructor = fn(&AwgSettings) -> Result<Box<dyn Awg + Send>, DriverError>;

pub struct AwgFactory {
    awgs: BTreeMap<&'static str, Constructor>,
}

impl AwgFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            awgs: BTreeMap::new(),
        };
        factory.add_awg("dummy", |_| Ok(Box::new(DummyAwg::new())));
        factory
    }

    pub fn add_awg(&mut self, short_name: &'static str, constructor: Constructor) {
        self.awgs.insert(short_name, constructor);
    }

    pub fn build(
        &self,
        short_name: &str,
        settings: &AwgSettings,
    ) -> Option<Result<Box<dyn Awg + Send>, DriverError>> {
        self.awgs.get(short_name).map(|ctor| ctor(settings))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.awgs.keys().copied()
    }
}

impl Default for AwgFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_is_registered() {
        let factory = AwgFactory::new();
        assert!(factory.names().any(|n| n == "dummy"));
        assert!(factory.build("dummy", &AwgSettings::default()).is_some());
    }

    #[test]
    fn unknown_name_is_rejected() {
        let factory = AwgFactory::new();
        assert!(factory.build("sdg9999x", &AwgSettings::default()).is_none());
    }
}
