//! Turning an order into the steps that still have to run.

use tracing::debug;

use crate::core::{Goal, LinkBundle, Mode};
use crate::cycles::CycleRegistry;
use crate::errors::NoCycleError;
use crate::recipe::Order;

/// The steps chosen for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Mode the cycle was taken from.
    pub mode: Mode,
    /// Leading goals whose output was already available.
    pub satisfied: Vec<Goal>,
    /// Goals left to run, in order. Empty when everything was available.
    pub remaining: Vec<Goal>,
}

impl Plan {
    /// Returns true if nothing has to be dispatched.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Picks the mode an order runs in.
///
/// An explicit mode is used as is. Otherwise the first mode (in mode order)
/// whose cycles reach the goal and whose required input the order already
/// carries wins; failing that, the first mode reaching the goal at all.
pub fn select_mode(registry: &CycleRegistry, order: &Order) -> Result<Mode, NoCycleError> {
    if let Some(mode) = order.mode {
        return Ok(mode);
    }

    let candidates = registry.modes_containing(order.goal);
    candidates
        .iter()
        .copied()
        .find(|mode| order.source.has(mode.required_input()))
        .or_else(|| candidates.first().copied())
        .ok_or_else(|| NoCycleError::new(order.goal, None))
}

/// Computes the plan for `order`.
///
/// `available` holds every link known before the first dispatch (the
/// order's own source, possibly enriched from the artifact cache). Leading
/// goals whose produced link is already in it are skipped; skipping stops
/// at the first goal that still has to run.
pub fn plan_order(registry: &CycleRegistry, order: &Order, available: &LinkBundle) -> Result<Plan, NoCycleError> {
    let mode = select_mode(registry, order)?;
    let prefix = registry
        .cycle_prefix_for(mode, order.goal)
        .ok_or_else(|| NoCycleError::new(order.goal, Some(mode)))?;

    let skip = prefix
        .iter()
        .take_while(|goal| available.has(goal.produces()))
        .count();
    let (satisfied, remaining) = prefix.split_at(skip);

    debug!(
        order_id = %order.order_id,
        mode = %mode,
        satisfied = ?satisfied,
        remaining = ?remaining,
        "Planned order"
    );

    Ok(Plan {
        mode,
        satisfied: satisfied.to_vec(),
        remaining: remaining.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LinkField;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_explicit_mode() {
        let registry = CycleRegistry::standard();
        let order = Order::new("o", "shop", Goal::BuildLoadTest).with_mode(Mode::FromPastSessions);

        let plan = plan_order(&registry, &order, &order.source).unwrap();
        assert_eq!(plan.mode, Mode::FromPastSessions);
        assert_eq!(plan.remaining, vec![Goal::BuildWorkloadModel, Goal::BuildLoadTest]);
        assert!(plan.satisfied.is_empty());
    }

    #[test]
    fn test_mode_chosen_from_available_input() {
        let registry = CycleRegistry::standard();

        let from_sessions = Order::new("o", "shop", Goal::BuildLoadTest)
            .with_source(LinkBundle::new().with(LinkField::SessionLogs, "s/1"));
        assert_eq!(select_mode(&registry, &from_sessions).unwrap(), Mode::FromPastSessions);

        let from_requests = Order::new("o", "shop", Goal::BuildLoadTest)
            .with_source(LinkBundle::new().with(LinkField::MeasurementData, "md/1"));
        assert_eq!(select_mode(&registry, &from_requests).unwrap(), Mode::FromPastRequests);

        let no_input = Order::new("o", "shop", Goal::BuildLoadTest);
        assert_eq!(select_mode(&registry, &no_input).unwrap(), Mode::FromPastRequests);

        let forecast = Order::new("o", "shop", Goal::Forecast)
            .with_source(LinkBundle::new().with(LinkField::MeasurementData, "md/1"));
        assert_eq!(select_mode(&registry, &forecast).unwrap(), Mode::FromForecast);
    }

    #[test]
    fn test_unreachable_goal() {
        let registry = CycleRegistry::standard();

        let order = Order::new("o", "shop", Goal::Forecast).with_mode(Mode::FromPastSessions);
        let err = plan_order(&registry, &order, &order.source).unwrap_err();
        assert_eq!(err.mode, Some(Mode::FromPastSessions));

        let empty = CycleRegistry::new();
        let order = Order::new("o", "shop", Goal::Forecast);
        let err = plan_order(&empty, &order, &order.source).unwrap_err();
        assert_eq!(err.goal, Goal::Forecast);
        assert_eq!(err.mode, None);
    }

    #[test]
    fn test_leading_available_goals_are_skipped() {
        let registry = CycleRegistry::standard();
        let order = Order::new("o", "shop", Goal::ExecuteLoadTest).with_mode(Mode::FromPastRequests);
        let available = LinkBundle::new()
            .with(LinkField::MeasurementData, "md/1")
            .with(LinkField::SessionLogs, "s/1")
            .with(LinkField::LoadTest, "lt/1");

        let plan = plan_order(&registry, &order, &available).unwrap();
        assert_eq!(plan.satisfied, vec![Goal::ExtractSessions]);
        assert_eq!(
            plan.remaining,
            vec![Goal::BuildWorkloadModel, Goal::BuildLoadTest, Goal::ExecuteLoadTest]
        );
    }

    #[test]
    fn test_fully_available() {
        let registry = CycleRegistry::standard();
        let order = Order::new("o", "shop", Goal::BuildWorkloadModel).with_mode(Mode::FromPastSessions);
        let available = LinkBundle::new().with(LinkField::WorkloadModel, "wm/1");

        let plan = plan_order(&registry, &order, &available).unwrap();
        assert!(plan.is_satisfied());
        assert_eq!(plan.satisfied, vec![Goal::BuildWorkloadModel]);
    }
}
