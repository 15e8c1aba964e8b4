//! Boot decision logic. Priority order: override button, warm-boot signature
//! in the battery-backed register, then image validation.

use embedded_hal::digital::v2::InputPin;

use crate::config::{BoardConfig, STACK_POINTER_BASE, STACK_POINTER_MASK};
use crate::hal::{line_held, read_u32, BackupRegister, FlashBank};

/// Warm-boot request: stay in the update agent on the next reset.
pub const AGENT_SIGNATURE: u32 = 0x71A2_1877;

/// Warm-boot request: boot straight into the application on the next reset.
pub const APP_SIGNATURE: u32 = 0x24A2_2D12;

/// Why the application image cannot be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFault {
    /// The vector table slot still reads as erased flash.
    ErasedFlash,
    /// The initial stack pointer is not a plausible RAM address.
    BadStackPointer,
    /// The reset handler address falls outside flash.
    BadEntryPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    /// The override line was held through the debounce window.
    ButtonOverride,
    /// The previous session asked to come back to the agent.
    SignatureStay,
    /// No jump is possible; the agent must stay resident and expose the
    /// virtual volume so a working image can be loaded.
    ImageInvalid(ImageFault),
    /// Transfer control to the application. The target wrapper must clear
    /// pending interrupts, load the stack pointer and branch to the entry;
    /// the transition does not return.
    Jump {
        stack_pointer: u32,
        entry: u32,
        /// Set when the jump was requested by signature rather than decided
        /// by the normal policy.
        forced: bool,
    },
}

/// Validate the application vector table and return (initial SP, entry).
/// Word 0 must be a word-aligned RAM address, word 1 must land inside flash.
pub fn validate_image<F: FlashBank>(flash: &F, cfg: &BoardConfig) -> Result<(u32, u32), ImageFault> {
    let stack_pointer = read_u32(flash, cfg.app_load_address);
    let entry = read_u32(flash, cfg.app_load_address + 4);

    if stack_pointer == 0xFFFF_FFFF {
        return Err(ImageFault::ErasedFlash);
    }
    if stack_pointer & STACK_POINTER_MASK != STACK_POINTER_BASE {
        return Err(ImageFault::BadStackPointer);
    }
    if entry < cfg.app_load_address || entry >= cfg.flash.end() {
        return Err(ImageFault::BadEntryPoint);
    }
    Ok((stack_pointer, entry))
}

/// Decide the boot path. The warm-boot signature is consumed, so a request
/// only influences a single reset; a jump outcome locks the flash controller
/// first.
pub fn decide<F, B, P>(cfg: &BoardConfig, flash: &mut F, backup: &mut B, button: &P) -> BootDecision
where
    F: FlashBank,
    B: BackupRegister,
    P: InputPin,
{
    let signature = backup.read();
    if signature == AGENT_SIGNATURE || signature == APP_SIGNATURE {
        backup.write(0);
    }

    // The entry line outranks everything, including a pending app-boot
    // request.
    if line_held(button) {
        debug!("override button held, staying resident");
        return BootDecision::ButtonOverride;
    }

    if signature == APP_SIGNATURE {
        return match validate_image(flash, cfg) {
            Ok((stack_pointer, entry)) => {
                flash.lock();
                BootDecision::Jump {
                    stack_pointer,
                    entry,
                    forced: true,
                }
            }
            Err(fault) => BootDecision::ImageInvalid(fault),
        };
    }

    if signature == AGENT_SIGNATURE {
        return BootDecision::SignatureStay;
    }

    match validate_image(flash, cfg) {
        Ok((stack_pointer, entry)) => {
            flash.lock();
            BootDecision::Jump {
                stack_pointer,
                entry,
                forced: false,
            }
        }
        Err(fault) => {
            warning!("application image rejected");
            BootDecision::ImageInvalid(fault)
        }
    }
}

/// Ask for the update agent on the next reset. Called from application
/// context before triggering a system reset.
pub fn request_agent<B: BackupRegister>(backup: &mut B) {
    backup.write(AGENT_SIGNATURE);
}

/// Ask for a direct application start on the next reset.
pub fn request_app_boot<B: BackupRegister>(backup: &mut B) {
    backup.write(APP_SIGNATURE);
}
