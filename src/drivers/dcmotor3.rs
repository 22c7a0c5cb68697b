//! DC Motor 3 Click: TB6549 full-bridge motor driver
//!
//! IN1/IN2 select the bridge mode, PWM sets the speed and SB low puts the
//! chip in standby (outputs high impedance, minimal current).
//!
//! | IN1 | IN2 | mode             |
//! |-----|-----|------------------|
//! |  H  |  L  | clockwise        |
//! |  L  |  H  | counterclockwise |
//! |  H  |  H  | short brake      |
//! |  L  |  L  | stop             |

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Clockwise,
    CounterClockwise,
    ShortBrake,
    Stop,
}

impl Mode {
    fn inputs(self) -> (bool, bool) {
        match self {
            Mode::Clockwise => (true, false),
            Mode::CounterClockwise => (false, true),
            Mode::ShortBrake => (true, true),
            Mode::Stop => (false, false),
        }
    }
}

pub struct DcMotor3<IN1, IN2, SB, PWM> {
    in1: IN1,
    in2: IN2,
    sb: SB,
    pwm: PWM,
    mode: Mode,
    speed: u8,
}

impl<IN1, IN2, SB, PWM> DcMotor3<IN1, IN2, SB, PWM>
where
    IN1: OutputPin,
    IN2: OutputPin,
    SB: OutputPin,
    PWM: SetDutyCycle,
{
    /// Starts stopped, out of standby, at zero speed.
    pub fn new(in1: IN1, in2: IN2, sb: SB, pwm: PWM) -> Result<Self, Error> {
        let mut motor = Self { in1, in2, sb, pwm, mode: Mode::Stop, speed: 0 };
        motor.set_speed_percent(0)?;
        motor.set_mode(Mode::Stop)?;
        motor.standby(false)?;
        Ok(motor)
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error> {
        let (a, b) = mode.inputs();
        self.in1.set_state(a.into()).map_err(Error::pin)?;
        self.in2.set_state(b.into()).map_err(Error::pin)?;
        self.mode = mode;
        debug!("TB6549 mode {}", mode as u8);
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_speed_percent(&mut self, percent: u8) -> Result<(), Error> {
        if percent > 100 {
            return Err(Error::InvalidArgument);
        }
        self.pwm.set_duty_cycle_percent(percent).map_err(Error::pin)?;
        self.speed = percent;
        Ok(())
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// `true` drives SB low (standby).
    pub fn standby(&mut self, enable: bool) -> Result<(), Error> {
        self.sb.set_state((!enable).into()).map_err(Error::pin)
    }

    pub fn release(self) -> (IN1, IN2, SB, PWM) {
        (self.in1, self.in2, self.sb, self.pwm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePin, FakePwm};

    struct Rig {
        in1: FakePin,
        in2: FakePin,
        sb: FakePin,
        pwm: FakePwm,
    }

    fn motor() -> (DcMotor3<FakePin, FakePin, FakePin, FakePwm>, Rig) {
        let rig = Rig { in1: FakePin::new(), in2: FakePin::new(), sb: FakePin::new(), pwm: FakePwm::new() };
        let m = DcMotor3::new(rig.in1.clone(), rig.in2.clone(), rig.sb.clone(), rig.pwm.clone()).unwrap();
        (m, rig)
    }

    #[test]
    fn starts_stopped_and_awake() {
        let (m, rig) = motor();
        assert_eq!(m.mode(), Mode::Stop);
        assert!(!rig.in1.is_set_high() && !rig.in2.is_set_high());
        assert!(rig.sb.is_set_high());
        assert_eq!(rig.pwm.duty(), 0);
    }

    #[test]
    fn mode_truth_table() {
        let (mut m, rig) = motor();
        for (mode, expected) in [
            (Mode::Clockwise, (true, false)),
            (Mode::CounterClockwise, (false, true)),
            (Mode::ShortBrake, (true, true)),
            (Mode::Stop, (false, false)),
        ] {
            m.set_mode(mode).unwrap();
            assert_eq!((rig.in1.is_set_high(), rig.in2.is_set_high()), expected);
        }
    }

    #[test]
    fn speed_maps_to_duty() {
        let (mut m, rig) = motor();
        m.set_speed_percent(75).unwrap();
        assert_eq!(rig.pwm.duty(), 750);
        assert_eq!(m.speed(), 75);
        assert_eq!(m.set_speed_percent(101), Err(Error::InvalidArgument));
        assert_eq!(m.speed(), 75);
    }

    #[test]
    fn standby_pulls_sb_low() {
        let (mut m, rig) = motor();
        m.standby(true).unwrap();
        assert!(!rig.sb.is_set_high());
        m.standby(false).unwrap();
        assert!(rig.sb.is_set_high());
    }
}
