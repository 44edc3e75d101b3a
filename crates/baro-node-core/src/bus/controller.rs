//! Register-level controller seam
//!
//! Models a TWI peripheral the way AVR-class hardware exposes it: a command
//! is started by writing the control register, completion is signalled by the
//! interrupt flag, and the outcome is read back as a status code.

/// TWI status codes (upper five bits of the status register).
pub mod status {
    /// START condition transmitted
    pub const START: u8 = 0x08;
    /// Repeated START condition transmitted
    pub const REPEATED_START: u8 = 0x10;
    /// SLA+W transmitted, ACK received
    pub const SLA_W_ACK: u8 = 0x18;
    /// SLA+W transmitted, NACK received
    pub const SLA_W_NACK: u8 = 0x20;
    /// Data byte transmitted, ACK received
    pub const DATA_W_ACK: u8 = 0x28;
    /// Data byte transmitted, NACK received
    pub const DATA_W_NACK: u8 = 0x30;
    /// Arbitration lost
    pub const ARBITRATION_LOST: u8 = 0x38;
    /// SLA+R transmitted, ACK received
    pub const SLA_R_ACK: u8 = 0x40;
    /// SLA+R transmitted, NACK received
    pub const SLA_R_NACK: u8 = 0x48;
    /// Data byte received, ACK returned
    pub const DATA_R_ACK: u8 = 0x50;
    /// Data byte received, NACK returned
    pub const DATA_R_NACK: u8 = 0x58;
    /// No relevant state information
    pub const NO_INFO: u8 = 0xF8;
    /// Illegal START or STOP
    pub const BUS_ERROR: u8 = 0x00;
}

/// A single controller operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwiCommand {
    /// Generate a START (repeated START when the bus is already held)
    Start,
    /// Generate a STOP
    Stop,
    /// Shift out one byte (address or data)
    Transmit(u8),
    /// Shift in one byte and answer with ACK (`true`) or NACK (`false`)
    Receive { ack: bool },
}

/// Hardware access for one TWI controller.
///
/// Implementations only touch registers (or pins). Waiting and status
/// validation belong to the engine.
pub trait TwiController {
    /// Enable the peripheral and configure the bit rate.
    fn enable(&mut self);

    /// Start `command`. Clears the interrupt flag until it completes.
    fn issue(&mut self, command: TwiCommand);

    /// `true` once the last START, Transmit or Receive has completed.
    fn interrupt_flag(&mut self) -> bool;

    /// `true` while a STOP is still being generated.
    fn stop_pending(&mut self) -> bool;

    /// Current status code, prescaler bits masked out.
    fn status(&mut self) -> u8;

    /// Last received byte.
    fn data(&mut self) -> u8;
}

/// Poll `ready` at most `budget` times.
///
/// Returns `true` as soon as `ready` does. Never blocks longer than the
/// budget, and never retries the operation being waited on.
pub fn spin_until(budget: u16, mut ready: impl FnMut() -> bool) -> bool {
    (0..budget).any(|_| ready())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_until_stops_at_first_success() {
        let mut polls = 0;
        let ready = spin_until(250, || {
            polls += 1;
            polls == 3
        });
        assert!(ready);
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_spin_until_respects_budget() {
        let mut polls = 0;
        let ready = spin_until(250, || {
            polls += 1;
            false
        });
        assert!(!ready);
        assert_eq!(polls, 250);
    }

    #[test]
    fn test_spin_until_zero_budget_never_polls() {
        let mut polls = 0;
        assert!(!spin_until(0, || {
            polls += 1;
            true
        }));
        assert_eq!(polls, 0);
    }
}
