//! iButton Click: DS1990A serial number key reader on 1-Wire, plus a
//! green and a red indicator LED.
//!
//! A DS1990A has no memory beyond its ROM, so reading a key is a presence
//! check and READ ROM. Family code 0x01 identifies the part.

use embedded_hal::digital::OutputPin;

use crate::error::Error;
use crate::onewire::{OneWireBus, Rom};

pub const DS1990A_FAMILY: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Led {
    Green,
    Red,
}

pub struct IButton<B, G, R> {
    bus: B,
    green: G,
    red: R,
}

impl<B, G, R> IButton<B, G, R>
where
    B: OneWireBus,
    G: OutputPin,
    R: OutputPin,
{
    /// LEDs start off.
    pub fn new(bus: B, mut green: G, mut red: R) -> Result<Self, Error<B::Error>> {
        green.set_low().map_err(Error::pin)?;
        red.set_low().map_err(Error::pin)?;
        Ok(Self { bus, green, red })
    }

    /// ROM of the key on the reader. [`Error::NoDevice`] without a key,
    /// [`Error::InvalidDevice`] with the family code for other 1-Wire parts.
    pub fn read_key(&mut self) -> Result<Rom, Error<B::Error>> {
        let rom = self.bus.read_rom()?;
        if rom.family() != DS1990A_FAMILY {
            debug!("1-Wire device family 0x{:02X} is not a key", rom.family());
            return Err(Error::InvalidDevice(rom.family()));
        }
        Ok(rom)
    }

    /// Something answers the reset pulse.
    pub fn key_present(&mut self) -> Result<bool, Error<B::Error>> {
        self.bus.reset().map_err(Error::Bus)
    }

    pub fn set_led(&mut self, led: Led, on: bool) -> Result<(), Error<B::Error>> {
        match led {
            Led::Green => self.green.set_state(on.into()).map_err(Error::pin),
            Led::Red => self.red.set_state(on.into()).map_err(Error::pin),
        }
    }

    pub fn release(self) -> (B, G, R) {
        (self.bus, self.green, self.red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, FakeOneWire, FakePin};

    fn reader(devices: Vec<FakeDevice>) -> (IButton<FakeOneWire, FakePin, FakePin>, FakePin, FakePin) {
        let (g, r) = (FakePin::new(), FakePin::new());
        let ib = IButton::new(FakeOneWire::new(devices), g.clone(), r.clone()).unwrap();
        (ib, g, r)
    }

    #[test]
    fn reads_ds1990a_rom() {
        let key = FakeDevice::new([0x01, 0x6B, 0x2A, 0x3C, 0x12, 0x00, 0x00]);
        let expected = Rom(key.rom);
        let (mut ib, _, _) = reader(vec![key]);
        assert!(ib.key_present().unwrap());
        assert_eq!(ib.read_key().unwrap(), expected);
    }

    #[test]
    fn no_key_on_reader() {
        let (mut ib, _, _) = reader(vec![]);
        assert!(!ib.key_present().unwrap());
        assert_eq!(ib.read_key(), Err(Error::NoDevice));
    }

    #[test]
    fn other_family_is_rejected() {
        let sensor = FakeDevice::new([0x28, 1, 2, 3, 4, 5, 6]);
        let (mut ib, _, _) = reader(vec![sensor]);
        assert_eq!(ib.read_key(), Err(Error::InvalidDevice(0x28)));
    }

    #[test]
    fn leds() {
        let (mut ib, g, r) = reader(vec![]);
        assert!(!g.is_set_high() && !r.is_set_high());
        ib.set_led(Led::Green, true).unwrap();
        assert!(g.is_set_high() && !r.is_set_high());
        ib.set_led(Led::Red, true).unwrap();
        ib.set_led(Led::Green, false).unwrap();
        assert!(!g.is_set_high() && r.is_set_high());
    }
}
