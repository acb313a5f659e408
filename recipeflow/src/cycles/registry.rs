//! Mode → cycle lookup table.

use std::collections::{BTreeMap, HashSet};

use crate::core::{Goal, Mode};
use crate::errors::{RegistryValidationError, ViolationInfo};

/// One legal ordered sequence of goals for a mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle {
    /// The mode the cycle belongs to.
    pub mode: Mode,
    /// The goals, in execution order.
    pub goals: Vec<Goal>,
}

impl Cycle {
    /// Returns the prefix ending at `goal`, if the cycle contains it.
    #[must_use]
    pub fn prefix_for(&self, goal: Goal) -> Option<Vec<Goal>> {
        self.goals
            .iter()
            .position(|g| *g == goal)
            .map(|idx| self.goals[..=idx].to_vec())
    }

    /// Returns true if the cycle contains `goal`.
    #[must_use]
    pub fn contains(&self, goal: Goal) -> bool {
        self.goals.contains(&goal)
    }
}

/// Registry of the cycles valid under each mode.
///
/// Built once at startup and then only read. Registration order is kept, so
/// lookups are deterministic even when an invalid registration lets a goal
/// appear in more than one cycle of a mode: the first registered cycle wins.
#[derive(Debug, Clone, Default)]
pub struct CycleRegistry {
    cycles: BTreeMap<Mode, Vec<Cycle>>,
}

impl CycleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the registry with the standard cycles of the load-test pipeline.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register(
                Mode::FromPastRequests,
                [
                    Goal::ExtractSessions,
                    Goal::BuildWorkloadModel,
                    Goal::BuildLoadTest,
                    Goal::ExecuteLoadTest,
                ],
            )
            .register(
                Mode::FromPastSessions,
                [Goal::BuildWorkloadModel, Goal::BuildLoadTest, Goal::ExecuteLoadTest],
            )
            .register(
                Mode::FromForecast,
                [
                    Goal::ExtractSessions,
                    Goal::BuildBehaviorMix,
                    Goal::Forecast,
                    Goal::BuildLoadTest,
                    Goal::ExecuteLoadTest,
                ],
            );
        registry
    }

    /// Appends a cycle to the mode's cycle set.
    ///
    /// The "goal in at most one cycle per mode" invariant is not checked
    /// here; call [`CycleRegistry::validate`] once all cycles are registered.
    pub fn register(&mut self, mode: Mode, goals: impl IntoIterator<Item = Goal>) -> &mut Self {
        let cycle = Cycle {
            mode,
            goals: goals.into_iter().collect(),
        };
        self.cycles.entry(mode).or_default().push(cycle);
        self
    }

    /// Checks every registration and reports all violations at once.
    ///
    /// # Errors
    ///
    /// Returns `RegistryValidationError` if a cycle is empty, repeats a goal,
    /// or shares a goal with another cycle of the same mode.
    pub fn validate(&self) -> Result<(), RegistryValidationError> {
        let mut violations = Vec::new();

        for (mode, cycles) in &self.cycles {
            let mut owner: BTreeMap<Goal, usize> = BTreeMap::new();

            for (idx, cycle) in cycles.iter().enumerate() {
                if cycle.goals.is_empty() {
                    violations.push(
                        ViolationInfo::new(
                            "REGISTRY-EMPTY-CYCLE",
                            format!("cycle #{idx} of mode '{mode}' has no goals"),
                        )
                        .with_context_entry("mode", mode.as_str()),
                    );
                    continue;
                }

                let mut seen = HashSet::new();
                for goal in &cycle.goals {
                    if !seen.insert(*goal) {
                        violations.push(
                            ViolationInfo::new(
                                "REGISTRY-REPEATED-GOAL",
                                format!("cycle #{idx} of mode '{mode}' lists goal '{goal}' twice"),
                            )
                            .with_context_entry("mode", mode.as_str())
                            .with_context_entry("goal", goal.as_str()),
                        );
                        continue;
                    }

                    if let Some(first) = owner.get(goal) {
                        violations.push(
                            ViolationInfo::new(
                                "REGISTRY-DUPLICATE-GOAL",
                                format!(
                                    "goal '{goal}' appears in cycles #{first} and #{idx} of mode '{mode}'"
                                ),
                            )
                            .with_fix_hint("A goal may belong to at most one cycle per mode; split the mode or drop one cycle.")
                            .with_context_entry("mode", mode.as_str())
                            .with_context_entry("goal", goal.as_str()),
                        );
                    } else {
                        owner.insert(*goal, idx);
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(RegistryValidationError::new(violations))
        }
    }

    /// Returns the steps needed to reach `goal` under `mode`.
    ///
    /// The result is the prefix of the first registered cycle containing
    /// `goal`, up to and including `goal`.
    #[must_use]
    pub fn cycle_prefix_for(&self, mode: Mode, goal: Goal) -> Option<Vec<Goal>> {
        self.cycles
            .get(&mode)?
            .iter()
            .find_map(|cycle| cycle.prefix_for(goal))
    }

    /// Returns all cycles registered for `mode`.
    #[must_use]
    pub fn all_cycles(&self, mode: Mode) -> &[Cycle] {
        self.cycles.get(&mode).map_or(&[], Vec::as_slice)
    }

    /// Returns every mode with at least one cycle containing `goal`.
    #[must_use]
    pub fn modes_containing(&self, goal: Goal) -> Vec<Mode> {
        self.cycles
            .iter()
            .filter(|(_, cycles)| cycles.iter().any(|c| c.contains(goal)))
            .map(|(mode, _)| *mode)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_mode_registry() -> CycleRegistry {
        let mut registry = CycleRegistry::new();
        registry
            .register(
                Mode::FromPastRequests,
                [Goal::ExtractSessions, Goal::BuildWorkloadModel, Goal::BuildLoadTest],
            )
            .register(Mode::FromPastSessions, [Goal::BuildWorkloadModel]);
        registry
    }

    #[test]
    fn test_prefix_lookup_across_modes() {
        let registry = two_mode_registry();

        assert_eq!(
            registry.cycle_prefix_for(Mode::FromPastRequests, Goal::BuildWorkloadModel),
            Some(vec![Goal::ExtractSessions, Goal::BuildWorkloadModel])
        );
        assert_eq!(
            registry.cycle_prefix_for(Mode::FromPastSessions, Goal::BuildWorkloadModel),
            Some(vec![Goal::BuildWorkloadModel])
        );

        let mut modes = registry.modes_containing(Goal::BuildWorkloadModel);
        modes.sort();
        assert_eq!(modes, vec![Mode::FromPastRequests, Mode::FromPastSessions]);
    }

    #[test]
    fn test_prefix_length_matches_position() {
        let registry = CycleRegistry::standard();

        for mode in Mode::ALL {
            for cycle in registry.all_cycles(mode) {
                for (idx, goal) in cycle.goals.iter().enumerate() {
                    let prefix = registry.cycle_prefix_for(mode, *goal).unwrap();
                    assert_eq!(prefix.len(), idx + 1);
                    assert_eq!(prefix.last(), Some(goal));
                    assert_eq!(prefix, cycle.goals[..=idx].to_vec());
                }
            }
        }
    }

    #[test]
    fn test_prefix_not_found() {
        let registry = two_mode_registry();
        assert_eq!(
            registry.cycle_prefix_for(Mode::FromPastSessions, Goal::ExtractSessions),
            None
        );
        assert_eq!(registry.cycle_prefix_for(Mode::FromForecast, Goal::Forecast), None);
        assert!(registry.modes_containing(Goal::Forecast).is_empty());
    }

    #[test]
    fn test_modes_containing_matches_registrations() {
        let registry = CycleRegistry::standard();

        for goal in Goal::ALL {
            let expected: Vec<Mode> = Mode::ALL
                .into_iter()
                .filter(|m| registry.all_cycles(*m).iter().any(|c| c.contains(goal)))
                .collect();
            let mut actual = registry.modes_containing(goal);
            actual.sort();
            let mut expected = expected;
            expected.sort();
            assert_eq!(actual, expected, "goal {goal}");
        }
    }

    #[test]
    fn test_standard_registry_is_valid() {
        assert!(CycleRegistry::standard().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_duplicate_goal() {
        let mut registry = CycleRegistry::new();
        registry
            .register(Mode::FromForecast, [Goal::ExtractSessions, Goal::Forecast])
            .register(Mode::FromForecast, [Goal::BuildBehaviorMix, Goal::Forecast]);

        let err = registry.validate().unwrap_err();
        assert_eq!(err.codes(), vec!["REGISTRY-DUPLICATE-GOAL"]);

        // first registration wins on lookup
        assert_eq!(
            registry.cycle_prefix_for(Mode::FromForecast, Goal::Forecast),
            Some(vec![Goal::ExtractSessions, Goal::Forecast])
        );
    }

    #[test]
    fn test_validate_reports_empty_and_repeated() {
        let mut registry = CycleRegistry::new();
        registry
            .register(Mode::FromPastSessions, Vec::new())
            .register(
                Mode::FromPastRequests,
                [Goal::ExtractSessions, Goal::ExtractSessions],
            );

        let err = registry.validate().unwrap_err();
        let mut codes = err.codes();
        codes.sort_unstable();
        assert_eq!(codes, vec!["REGISTRY-EMPTY-CYCLE", "REGISTRY-REPEATED-GOAL"]);
    }

    #[test]
    fn test_all_cycles_unknown_mode_is_empty() {
        let registry = CycleRegistry::new();
        assert!(registry.all_cycles(Mode::FromForecast).is_empty());
    }
}
