//! Hardware abstraction traits: flash primitives, the reset-surviving backup
//! register, and debounced line sampling.

use embedded_hal::digital::v2::InputPin;

use crate::config::{DEBOUNCE_AGREEMENT_PCT, DEBOUNCE_SAMPLES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    EraseFailed,
    ProgramFailed,
    Locked,
}

/// Low-level flash access. Erase and program are atomic per call and report
/// success or failure; the coordinator never retries them.
pub trait FlashBank {
    /// Read flash content. Addresses outside the device read as erased.
    fn read(&self, addr: u32, buf: &mut [u8]);

    fn unlock(&mut self);

    fn lock(&mut self);

    /// Bulk-erase one physical sector by index into the geometry table.
    fn erase_sector(&mut self, index: usize) -> Result<(), FlashError>;

    /// Program one 32-bit word. The destination must be erased.
    fn program_word(&mut self, addr: u32, word: u32) -> Result<(), FlashError>;
}

/// A 32-bit register that survives system reset (RTC backup register).
pub trait BackupRegister {
    fn read(&self) -> u32;
    fn write(&mut self, value: u32);
}

/// Read one little-endian word from flash.
pub fn read_u32<F: FlashBank>(flash: &F, addr: u32) -> u32 {
    let mut bytes = [0u8; 4];
    flash.read(addr, &mut bytes);
    u32::from_le_bytes(bytes)
}

/// Majority-vote debounce: sample the line and require better than 90%
/// agreement. "Held" reads high.
pub fn line_held<P: InputPin>(pin: &P) -> bool {
    let mut vote = 0u32;
    for _ in 0..DEBOUNCE_SAMPLES {
        if matches!(pin.is_high(), Ok(true)) {
            vote += 1;
        }
    }
    vote * 100 > DEBOUNCE_SAMPLES * DEBOUNCE_AGREEMENT_PCT
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction};

    fn samples(high: usize, low: usize) -> PinMock {
        let mut t = vec![Transaction::get(State::High); high];
        t.extend(vec![Transaction::get(State::Low); low]);
        PinMock::new(&t)
    }

    #[test]
    fn unanimous_press_is_held() {
        let mut pin = samples(200, 0);
        assert!(line_held(&pin));
        pin.done();
    }

    #[test]
    fn released_line_is_not_held() {
        let mut pin = samples(0, 200);
        assert!(!line_held(&pin));
        pin.done();
    }

    #[test]
    fn noise_below_threshold_is_rejected() {
        // 181/200 clears the 90% bar, 180/200 does not.
        let mut pin = samples(181, 19);
        assert!(line_held(&pin));
        pin.done();

        let mut pin = samples(180, 20);
        assert!(!line_held(&pin));
        pin.done();
    }
}
