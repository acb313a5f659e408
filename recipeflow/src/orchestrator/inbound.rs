//! Messages the orchestrator accepts from a relay.

use serde::{Deserialize, Serialize};

use crate::errors::RecipeflowError;
use crate::messages::{OrderId, StepReport};
use crate::recipe::Order;

/// One inbound message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// A new order.
    Order(Order),
    /// A step report from a transformation service.
    Report(StepReport),
    /// Cancellation of a live order.
    #[serde(rename_all = "camelCase")]
    Cancel {
        /// The order to cancel.
        order_id: OrderId,
    },
}

impl InboundMessage {
    /// Parses one JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, RecipeflowError> {
        serde_json::from_str(line.trim())
            .map_err(|e| RecipeflowError::Malformed(format!("inbound message: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Goal, LinkField};

    #[test]
    fn test_parse_order() {
        let line = r#"{"type": "order", "orderId": "o-1", "tag": "shop", "goal": "build-load-test",
            "source": {"measurementDataLink": "md/1"}, "testingContext": ["cart"]}"#;

        let InboundMessage::Order(order) = InboundMessage::from_json_line(line).unwrap() else {
            panic!("expected an order");
        };
        assert_eq!(order.order_id.as_str(), "o-1");
        assert_eq!(order.goal, Goal::BuildLoadTest);
        assert!(order.source.has(LinkField::MeasurementData));
        assert!(order.testing_context.contains("cart"));
    }

    #[test]
    fn test_parse_report_and_cancel() {
        let report = InboundMessage::from_json_line(
            r#"{"type": "report", "taskId": "r.0", "successful": true, "result": {"sessionLogsLink": "s/1"}}"#,
        )
        .unwrap();
        assert!(matches!(report, InboundMessage::Report(ref r) if r.task_id.index == 0));

        let cancel = InboundMessage::from_json_line(r#"{"type": "cancel", "orderId": "o-1"}"#).unwrap();
        assert_eq!(
            cancel,
            InboundMessage::Cancel {
                order_id: OrderId::new("o-1")
            }
        );
    }

    #[test]
    fn test_malformed_line() {
        let err = InboundMessage::from_json_line(r#"{"type": "unknown"}"#).unwrap_err();
        assert!(matches!(err, RecipeflowError::Malformed(_)));
    }
}
