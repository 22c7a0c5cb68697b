//! Key registry and access control on top of the iButton reader.

use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::drivers::ibutton::{IButton, Led};
use crate::error::Error;
use crate::onewire::{OneWireBus, Rom};

/// Fixed-capacity set of authorised keys.
pub struct KeyRegistry<const N: usize> {
    keys: Vec<Rom, N>,
}

impl<const N: usize> Default for KeyRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> KeyRegistry<N> {
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Fails with [`Error::InvalidArgument`] for a key already present and
    /// [`Error::Full`] at capacity.
    pub fn register(&mut self, rom: Rom) -> Result<(), Error> {
        if self.is_registered(&rom) {
            return Err(Error::InvalidArgument);
        }
        self.keys.push(rom).map_err(|_| Error::Full)
    }

    /// Returns whether the key was present.
    pub fn unregister(&mut self, rom: &Rom) -> bool {
        match self.keys.iter().position(|k| k == rom) {
            Some(i) => {
                self.keys.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, rom: &Rom) -> bool {
        self.keys.iter().any(|k| k == rom)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rom> {
        self.keys.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    Granted(Rom),
    Denied(Rom),
    /// Something answered but is not a readable key
    Unreadable,
    /// Nothing on the reader
    NoKey,
}

/// Reads the key on the reader and shows the verdict on the LEDs.
pub struct AccessControl<const N: usize> {
    registry: KeyRegistry<N>,
}

impl<const N: usize> AccessControl<N> {
    pub fn new(registry: KeyRegistry<N>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &KeyRegistry<N> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut KeyRegistry<N> {
        &mut self.registry
    }

    /// Green for a registered key, red for anything else on the reader,
    /// both off when the reader is empty.
    pub fn check<B, G, R>(&mut self, reader: &mut IButton<B, G, R>) -> Result<Access, Error<B::Error>>
    where
        B: OneWireBus,
        G: OutputPin,
        R: OutputPin,
    {
        let access = match reader.read_key() {
            Ok(rom) if self.registry.is_registered(&rom) => Access::Granted(rom),
            Ok(rom) => Access::Denied(rom),
            Err(Error::NoDevice) => Access::NoKey,
            Err(Error::InvalidDevice(_)) | Err(Error::Crc) => Access::Unreadable,
            Err(e) => return Err(e),
        };
        let (green, red) = match access {
            Access::Granted(_) => (true, false),
            Access::Denied(_) | Access::Unreadable => (false, true),
            Access::NoKey => (false, false),
        };
        reader.set_led(Led::Green, green)?;
        reader.set_led(Led::Red, red)?;
        if let Access::Denied(rom) = access {
            info!("iButton access denied, family 0x{:02X}", rom.family());
        }
        Ok(access)
    }
}
