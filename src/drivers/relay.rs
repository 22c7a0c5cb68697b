//! Relay Click: two relays driven straight from GPIO (high = energized).

use embedded_hal::digital::OutputPin;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Relay {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayState {
    Off,
    On,
}

impl core::ops::Not for RelayState {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            RelayState::Off => RelayState::On,
            RelayState::On => RelayState::Off,
        }
    }
}

pub struct RelayClick<RL1, RL2> {
    rl1: RL1,
    rl2: RL2,
    states: [RelayState; 2],
}

impl<RL1: OutputPin, RL2: OutputPin> RelayClick<RL1, RL2> {
    /// Both relays start released.
    pub fn new(rl1: RL1, rl2: RL2) -> Result<Self, Error> {
        let mut relay = Self { rl1, rl2, states: [RelayState::Off; 2] };
        relay.all_off()?;
        Ok(relay)
    }

    pub fn set_relay(&mut self, relay: Relay, state: RelayState) -> Result<(), Error> {
        let on = state == RelayState::On;
        match relay {
            Relay::One => self.rl1.set_state(on.into()).map_err(Error::pin)?,
            Relay::Two => self.rl2.set_state(on.into()).map_err(Error::pin)?,
        }
        self.states[relay as usize] = state;
        Ok(())
    }

    /// Flip one relay; returns the new state.
    pub fn toggle(&mut self, relay: Relay) -> Result<RelayState, Error> {
        let next = !self.state(relay);
        self.set_relay(relay, next)?;
        Ok(next)
    }

    pub fn state(&self, relay: Relay) -> RelayState {
        self.states[relay as usize]
    }

    pub fn all_off(&mut self) -> Result<(), Error> {
        self.set_relay(Relay::One, RelayState::Off)?;
        self.set_relay(Relay::Two, RelayState::Off)
    }

    pub fn release(self) -> (RL1, RL2) {
        (self.rl1, self.rl2)
    }
}
