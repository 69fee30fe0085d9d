//! The two archive units of an installation and their lifecycle.

use std::fmt;

/// One of the two archives making up an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Game executables and libraries.
    Binaries,
    /// Game data (maps, models, sounds).
    Data,
}

impl Unit {
    /// File name the archive is downloaded to inside the install directory.
    pub fn archive_name(&self) -> &'static str {
        match self {
            Self::Binaries => "binaries.zip",
            Self::Data => "data.zip",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Binaries => "binaries",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a unit within one run.
///
/// ```text
/// Pending -> Downloading -> Verified -> Extracting -> Installed
///     \___________\____________\___________\______-> Failed | Cancelled
/// ```
///
/// A cached archive goes from `Pending` straight to `Verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitState {
    #[default]
    Pending,
    Downloading,
    Verified,
    Extracting,
    Installed,
    Failed,
    Cancelled,
}

impl UnitState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Installed | Self::Failed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` follows the lifecycle graph.
    pub fn can_transition_to(&self, next: UnitState) -> bool {
        use UnitState::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (Pending, Downloading)
                | (Pending, Verified)
                | (Downloading, Verified)
                | (Verified, Extracting)
                | (Extracting, Installed)
                | (_, Failed)
                | (_, Cancelled)
        )
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Verified => "verified",
            Self::Extracting => "extracting",
            Self::Installed => "installed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub unit: Unit,
    pub from: UnitState,
    pub to: UnitState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archive cannot go from {} to {}",
            self.unit, self.from, self.to
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// States of both units for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStates {
    binaries: UnitState,
    data: UnitState,
}

impl UnitStates {
    pub fn get(&self, unit: Unit) -> UnitState {
        match unit {
            Unit::Binaries => self.binaries,
            Unit::Data => self.data,
        }
    }

    /// Apply a transition, rejecting moves outside the lifecycle graph.
    pub fn transition(&mut self, unit: Unit, to: UnitState) -> Result<(), InvalidTransition> {
        let slot = match unit {
            Unit::Binaries => &mut self.binaries,
            Unit::Data => &mut self.data,
        };

        if !slot.can_transition_to(to) {
            return Err(InvalidTransition {
                unit,
                from: *slot,
                to,
            });
        }

        *slot = to;
        Ok(())
    }

    /// Whether both units reached [`UnitState::Installed`].
    pub fn all_installed(&self) -> bool {
        self.binaries == UnitState::Installed && self.data == UnitState::Installed
    }

    /// Mark every unit that has not finished with `to` (failed or cancelled).
    pub fn finish_open(&mut self, to: UnitState) {
        for slot in [&mut self.binaries, &mut self.data] {
            if !slot.is_terminal() {
                *slot = to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_names() {
        assert_eq!(Unit::Binaries.archive_name(), "binaries.zip");
        assert_eq!(Unit::Data.archive_name(), "data.zip");
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut states = UnitStates::default();
        for next in [
            UnitState::Downloading,
            UnitState::Verified,
            UnitState::Extracting,
            UnitState::Installed,
        ] {
            states.transition(Unit::Data, next).unwrap();
        }
        assert_eq!(states.get(Unit::Data), UnitState::Installed);
        assert_eq!(states.get(Unit::Binaries), UnitState::Pending);
    }

    #[test]
    fn test_all_installed_needs_both_units() {
        let mut states = UnitStates::default();
        for next in [UnitState::Verified, UnitState::Extracting, UnitState::Installed] {
            states.transition(Unit::Binaries, next).unwrap();
        }
        assert!(!states.all_installed());

        for next in [UnitState::Verified, UnitState::Extracting, UnitState::Installed] {
            states.transition(Unit::Data, next).unwrap();
        }
        assert!(states.all_installed());
    }

    #[test]
    fn test_cached_archive_skips_download() {
        assert!(UnitState::Pending.can_transition_to(UnitState::Verified));
    }

    #[test]
    fn test_rejects_out_of_order_transition() {
        let mut states = UnitStates::default();
        let err = states
            .transition(Unit::Binaries, UnitState::Extracting)
            .unwrap_err();
        assert_eq!(err.from, UnitState::Pending);
        assert_eq!(err.to, UnitState::Extracting);
        assert_eq!(states.get(Unit::Binaries), UnitState::Pending);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut states = UnitStates::default();
        states.transition(Unit::Binaries, UnitState::Failed).unwrap();
        assert!(states
            .transition(Unit::Binaries, UnitState::Downloading)
            .is_err());
        assert!(states
            .transition(Unit::Binaries, UnitState::Cancelled)
            .is_err());
    }

    #[test]
    fn test_finish_open_leaves_installed_alone() {
        let mut states = UnitStates::default();
        states.transition(Unit::Binaries, UnitState::Verified).unwrap();
        states.transition(Unit::Binaries, UnitState::Extracting).unwrap();
        states.transition(Unit::Binaries, UnitState::Installed).unwrap();
        states.transition(Unit::Data, UnitState::Downloading).unwrap();

        states.finish_open(UnitState::Cancelled);

        assert_eq!(states.get(Unit::Binaries), UnitState::Installed);
        assert_eq!(states.get(Unit::Data), UnitState::Cancelled);
    }
}
