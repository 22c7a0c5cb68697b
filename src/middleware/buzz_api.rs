//! Non-blocking buzzer patterns on top of [`Buzz`]: the caller ticks
//! [`BuzzController::update`] from its main loop with a monotonically
//! increasing loop counter and the controller switches the buzzer.

use embedded_hal::pwm::SetDutyCycle;

use crate::drivers::buzz::Buzz;
use crate::error::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternKind {
    /// On/off cycling (1 s on, 0.5 s off) with a slow loudness ramp
    Alarm,
    /// Long, short, short
    Ack,
}

struct Pattern {
    kind: PatternKind,
    start: u32,
    loops_per_sec: u32,
    long: u32,
    gap: u32,
    short: u32,
    total_loops: u32,
}

impl Pattern {
    fn alarm(now: u32, loops_per_sec: u32, seconds: u32) -> Self {
        Self {
            kind: PatternKind::Alarm,
            start: now,
            loops_per_sec,
            long: 0,
            gap: 0,
            short: 0,
            total_loops: loops_per_sec.saturating_mul(seconds),
        }
    }

    fn ack(now: u32, loops_per_sec: u32) -> Self {
        // 0.4 s, gap ~0.08 s, 0.1 s
        let long = loops_per_sec * 2 / 5;
        let gap = loops_per_sec / 12;
        let short = loops_per_sec / 10;
        Self { kind: PatternKind::Ack, start: now, loops_per_sec, long, gap, short, total_loops: long + 2 * (gap + short) }
    }

    /// Loudness in percent of the base duty, `None` for silence.
    fn level(&self, elapsed: u32) -> Option<u32> {
        match self.kind {
            PatternKind::Alarm => {
                let on = self.loops_per_sec;
                let cycle = on + self.loops_per_sec / 2;
                if elapsed % cycle >= on {
                    return None;
                }
                // Triangle between 40 and 100 %
                let span = 60;
                let pos = (elapsed / 4) % (2 * span);
                let rel = if pos < span { pos } else { 2 * span - pos };
                Some(40 + rel)
            }
            PatternKind::Ack => {
                let edges = [self.long, self.gap, self.short, self.gap, self.short];
                let mut end = 0;
                for (i, len) in edges.iter().enumerate() {
                    end += len;
                    if elapsed < end {
                        return if i % 2 == 0 { Some(100) } else { None };
                    }
                }
                None
            }
        }
    }
}

/// Owns no hardware; drives the buzzer passed to each call.
#[derive(Default)]
pub struct BuzzController {
    pattern: Option<Pattern>,
}

impl BuzzController {
    pub fn new() -> Self {
        Self { pattern: None }
    }

    pub fn start_alarm<C: SetDutyCycle>(&mut self, now: u32, loops_per_sec: u32, seconds: u32, buzz: &mut Buzz<C>) -> Result<(), Error> {
        if loops_per_sec < 2 {
            return Err(Error::InvalidArgument);
        }
        self.pattern = Some(Pattern::alarm(now, loops_per_sec, seconds));
        buzz.on()
    }

    pub fn start_ack<C: SetDutyCycle>(&mut self, now: u32, loops_per_sec: u32, buzz: &mut Buzz<C>) -> Result<(), Error> {
        if loops_per_sec < 12 {
            return Err(Error::InvalidArgument);
        }
        self.pattern = Some(Pattern::ack(now, loops_per_sec));
        buzz.on()
    }

    /// Advance the active pattern. Returns `true` on the tick it finishes.
    pub fn update<C: SetDutyCycle>(&mut self, now: u32, buzz: &mut Buzz<C>) -> Result<bool, Error> {
        let Some(p) = &self.pattern else {
            return Ok(false);
        };
        let elapsed = now.wrapping_sub(p.start);
        if elapsed >= p.total_loops {
            self.pattern = None;
            buzz.off()?;
            return Ok(true);
        }
        match p.level(elapsed) {
            Some(100) => buzz.on()?,
            Some(percent) => {
                buzz.on()?;
                let duty = buzz.base_duty() as u32 * percent / 100;
                buzz.set_raw_duty(duty as u16)?;
            }
            None => buzz.off()?,
        }
        Ok(false)
    }

    /// Silence immediately and drop the pattern.
    pub fn stop<C: SetDutyCycle>(&mut self, buzz: &mut Buzz<C>) -> Result<(), Error> {
        self.pattern = None;
        buzz.off()
    }

    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn active_pattern(&self) -> Option<PatternKind> {
        self.pattern.as_ref().map(|p| p.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePwm;

    const LPS: u32 = 100;

    fn buzz() -> (Buzz<FakePwm>, FakePwm) {
        let pwm = FakePwm::new();
        (Buzz::new(pwm.clone(), 50).unwrap(), pwm)
    }

    #[test]
    fn ack_is_long_short_short() {
        let (mut b, pwm) = buzz();
        let mut c = BuzzController::new();
        c.start_ack(1000, LPS, &mut b).unwrap();
        // long 40, gap 8, short 10, gap 8, short 10
        let mut trace = Vec::new();
        let mut finished_at = None;
        for t in 1000..1100 {
            if c.update(t, &mut b).unwrap() {
                finished_at = Some(t);
                break;
            }
            trace.push(pwm.duty() != 0);
        }
        assert_eq!(finished_at, Some(1076));
        let on_ticks = trace.iter().filter(|&&on| on).count();
        assert_eq!(on_ticks, 60);
        assert!(trace[..40].iter().all(|&on| on));
        assert!(trace[40..48].iter().all(|&on| !on));
        assert!(trace[48..58].iter().all(|&on| on));
        assert_eq!(pwm.duty(), 0);
        assert!(!c.is_active());
    }

    #[test]
    fn alarm_cycles_then_stops() {
        let (mut b, pwm) = buzz();
        let mut c = BuzzController::new();
        c.start_alarm(0, LPS, 3, &mut b).unwrap();
        assert_eq!(c.active_pattern(), Some(PatternKind::Alarm));

        c.update(0, &mut b).unwrap();
        // Ramp starts at 40 % of the 500 base duty
        assert_eq!(pwm.duty(), 200);
        c.update(120, &mut b).unwrap();
        assert_eq!(pwm.duty(), 0);
        c.update(150, &mut b).unwrap();
        assert!(pwm.duty() > 0);
        assert!(pwm.duty() <= b.base_duty());

        assert!(!c.update(299, &mut b).unwrap());
        assert!(c.update(300, &mut b).unwrap());
        assert_eq!(pwm.duty(), 0);
        assert!(!c.update(301, &mut b).unwrap());
    }

    #[test]
    fn stop_silences() {
        let (mut b, pwm) = buzz();
        let mut c = BuzzController::new();
        c.start_alarm(0, LPS, 10, &mut b).unwrap();
        c.stop(&mut b).unwrap();
        assert_eq!(pwm.duty(), 0);
        assert_eq!(c.active_pattern(), None);
    }

    #[test]
    fn too_slow_loop_is_rejected() {
        let (mut b, _) = buzz();
        let mut c = BuzzController::new();
        assert_eq!(c.start_ack(0, 5, &mut b), Err(Error::InvalidArgument));
        assert!(!c.is_active());
    }
}
