//! Motor bridge over four `embedded-hal` PWM channels.
//!
//! Wire the channels to the DRV8833 inputs AIN1, AIN2, BIN1 and BIN2.
//! Run them at 250 Hz; the duty values in the motor's waveform table are
//! already inverted for the driver's active-low inputs.

use embedded_hal::pwm::SetDutyCycle;

use crate::traits::PhaseDriver;

/// Failed write on one bridge channel (0 = A1 … 3 = B2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseError {
    /// Index of the channel that failed.
    pub channel: u8,
}

/// DRV8833 inputs driven by four PWM channels.
///
/// # Example
///
/// ```ignore
/// use cake_layout::hal::PwmPhases;
/// use cake_layout::motor::LinearMotor;
///
/// // channels from your HAL, e.g. four slices of one PWM timer
/// let phases = PwmPhases::new(a1, a2, b1, b2);
/// let motor = LinearMotor::new(phases);
/// ```
pub struct PwmPhases<A1, A2, B1, B2> {
    a1: A1,
    a2: A2,
    b1: B1,
    b2: B2,
}

impl<A1, A2, B1, B2> PwmPhases<A1, A2, B1, B2>
where
    A1: SetDutyCycle,
    A2: SetDutyCycle,
    B1: SetDutyCycle,
    B2: SetDutyCycle,
{
    /// Takes ownership of the four channels.
    pub fn new(a1: A1, a2: A2, b1: B1, b2: B2) -> Self {
        Self { a1, a2, b1, b2 }
    }

    /// Returns the channels.
    pub fn release(self) -> (A1, A2, B1, B2) {
        (self.a1, self.a2, self.b1, self.b2)
    }
}

fn write<C: SetDutyCycle>(channel: &mut C, duty: u16, index: u8) -> Result<(), PhaseError> {
    channel
        .set_duty_cycle_fraction(duty, u16::MAX)
        .map_err(|_| PhaseError { channel: index })
}

impl<A1, A2, B1, B2> PhaseDriver for PwmPhases<A1, A2, B1, B2>
where
    A1: SetDutyCycle,
    A2: SetDutyCycle,
    B1: SetDutyCycle,
    B2: SetDutyCycle,
{
    type Error = PhaseError;

    fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), PhaseError> {
        write(&mut self.a1, duties[0], 0)?;
        write(&mut self.a2, duties[1], 1)?;
        write(&mut self.b1, duties[2], 2)?;
        write(&mut self.b2, duties[3], 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockServo;
    use crate::motor::PWM_TABLE;

    #[test]
    fn duties_scale_to_channel_range() {
        let mut phases =
            PwmPhases::new(MockServo::new(), MockServo::new(), MockServo::new(), MockServo::new());
        phases.set_duties([65535, 0, 32768, 65535]).unwrap();

        let (a1, a2, b1, b2) = phases.release();
        // MockServo full scale is 20000
        assert_eq!(a1.duty, 20_000);
        assert_eq!(a2.duty, 0);
        assert_eq!(b1.duty, 10_000);
        assert_eq!(b2.duty, 20_000);
    }

    #[test]
    fn failure_names_the_channel() {
        let mut b1 = MockServo::new();
        b1.fail = true;
        let mut phases = PwmPhases::new(MockServo::new(), MockServo::new(), b1, MockServo::new());
        assert_eq!(
            phases.set_duties(PWM_TABLE[0]),
            Err(PhaseError { channel: 2 })
        );
    }
}
