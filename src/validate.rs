use crate::ConfigRecord;
use crate::raw::MODULE_LENGTH;
use crate::record::{BROADCAST_ADDRESS, INVALID_ADDRESS};
#[cfg(feature = "defmt")]
use defmt::warn;

/// A problem found in a configuration record. The display string is the line reported to the
/// diagnostics sink.
#[derive(strum::IntoStaticStr, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Violation {
    #[strum(to_string = "The board's address is invalid.")]
    AddressInvalid,

    /// Does not make the record invalid.
    #[strum(to_string = "Warning: The board's address is the broadcast address.")]
    AddressIsBroadcast,

    /// The physical LED `index` is driven by zero or more than one logical LED.
    #[strum(to_string = "The LED permutation is invalid.")]
    PermutationInvalid { index: u8 },

    /// The logical LED `led` has a colour outside the legal set.
    #[strum(to_string = "The LED color is invalid.")]
    ColorInvalid { led: u8 },
}

impl Violation {
    /// Warnings are reported but do not invalidate the record.
    pub fn is_warning(&self) -> bool {
        matches!(self, Violation::AddressIsBroadcast)
    }

    pub fn message(&self) -> &'static str {
        self.into()
    }
}

/// Receives one line per violation found by [`config_valid`].
pub trait Diagnostics {
    fn report(&mut self, line: &str);
}

impl<F: FnMut(&str)> Diagnostics for F {
    fn report(&mut self, line: &str) {
        self(line)
    }
}

/// Discards all diagnostics.
pub struct Silent;

impl Diagnostics for Silent {
    fn report(&mut self, _line: &str) {}
}

/// Forwards diagnostics to the defmt logger.
#[cfg(feature = "defmt")]
pub struct DefmtDiagnostics;

#[cfg(feature = "defmt")]
impl Diagnostics for DefmtDiagnostics {
    fn report(&mut self, line: &str) {
        warn!("{}", line);
    }
}

/// Checks the semantic invariants of `record` and returns whether it may be used.
///
/// Every check runs regardless of earlier failures so that all problems are reported in one go,
/// one line per problem. A broadcast address is reported but keeps the record valid.
pub fn config_valid<D: Diagnostics + ?Sized>(record: &ConfigRecord, diagnostics: &mut D) -> bool {
    let mut valid = true;
    record.for_each_violation(|violation| {
        diagnostics.report(violation.message());
        if !violation.is_warning() {
            valid = false;
        }
    });
    valid
}

impl ConfigRecord {
    pub fn is_valid(&self) -> bool {
        config_valid(self, &mut Silent)
    }

    /// Calls `f` for every violation, in the order address, permutation, colour.
    pub fn for_each_violation<F: FnMut(Violation)>(&self, mut f: F) {
        if self.my_address == INVALID_ADDRESS {
            f(Violation::AddressInvalid);
        }
        if self.my_address == BROADCAST_ADDRESS {
            f(Violation::AddressIsBroadcast);
        }

        // Entries outside [0, MODULE_LENGTH) are not counted, they leave some index unseen.
        let mut seen = [0u8; MODULE_LENGTH];
        for &physical in &self.physical_led {
            if let Some(count) = seen.get_mut(physical as usize) {
                *count = count.saturating_add(1);
            }
        }
        for (index, &count) in seen.iter().enumerate() {
            if count != 1 {
                f(Violation::PermutationInvalid { index: index as u8 });
            }
        }

        for (led, color) in self.led_color.iter().enumerate() {
            if color.legal().is_none() {
                f(Violation::ColorInvalid { led: led as u8 });
            }
        }
    }

    /// Collects the violations into `out` and returns how many were found. Violations that do not
    /// fit into `out` are counted but dropped.
    pub fn violations(&self, out: &mut [Option<Violation>]) -> usize {
        let mut found = 0;
        self.for_each_violation(|violation| {
            if let Some(slot) = out.get_mut(found) {
                *slot = Some(violation);
            }
            found += 1;
        });
        found
    }
}
