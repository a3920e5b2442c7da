//! Bottom-up summarization of an object tree.

use tracing::error;

use super::ObjectRef;
use crate::error::{AggregationError, Problem};
use crate::state::WeightTable;

/// Summarize `root` and everything below it, members before their parents.
///
/// An object whose states are missing from `weights` keeps its previous
/// summary and is annotated with [`Problem::Aggregation`]. Its siblings and
/// ancestors are still summarized. All errors found are returned.
pub fn summarize_tree(root: &ObjectRef, weights: &WeightTable) -> Vec<AggregationError> {
    let mut errors = Vec::new();
    summarize_into(root, weights, &mut errors);
    errors
}

fn summarize_into(object: &ObjectRef, weights: &WeightTable, errors: &mut Vec<AggregationError>) {
    let members = object.borrow().members().to_vec();
    for member in &members {
        summarize_into(member, weights, errors);
    }

    let mut object = object.borrow_mut();
    if let Err(err) = object.refresh_summary(weights) {
        error!(object = %object.label(), error = %err, "state aggregation failed");
        object.set_problem(Problem::Aggregation(err.clone()));
        errors.push(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StateRecord;
    use crate::object::MonitoredObject;
    use pretty_assertions::assert_eq;

    fn host(name: &str, state: &str) -> ObjectRef {
        let mut host = MonitoredObject::host("live_1", name);
        host.set_state(StateRecord::host(name, state).with_output(&format!("{name} is {state}")));
        host.into_ref()
    }

    #[test]
    fn test_map_takes_worst_member() {
        let root = MonitoredObject::map("overview")
            .with_member(host("web01", "UP"))
            .with_member(host("web02", "DOWN"))
            .with_member(host("web03", "UNREACHABLE"))
            .into_ref();

        let errors = summarize_tree(&root, &WeightTable::default());
        assert!(errors.is_empty());

        let root = root.borrow();
        assert_eq!(root.summary_state(), Some("DOWN"));
        assert_eq!(
            root.summary_output(),
            "web01 is UP; web02 is DOWN; web03 is UNREACHABLE"
        );
    }

    #[test]
    fn test_nested_maps() {
        let inner = MonitoredObject::map("dc1")
            .with_member(host("db01", "DOWN"))
            .into_ref();
        let root = MonitoredObject::map("world")
            .with_member(host("web01", "UP"))
            .with_member(inner)
            .into_ref();

        summarize_tree(&root, &WeightTable::default());
        assert_eq!(root.borrow().summary_state(), Some("DOWN"));
    }

    #[test]
    fn test_aggregation_error_is_isolated() {
        let broken = host("web02", "MELTED");
        let root = MonitoredObject::map("overview")
            .with_member(host("web01", "WARNING"))
            .with_member(broken.clone())
            .into_ref();
        let errors = summarize_tree(&root, &WeightTable::default());

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            broken.borrow().problem(),
            Some(Problem::Aggregation(AggregationError::UnknownState { .. }))
        ));
        // The broken member never got a summary state, so the parent skips it.
        assert_eq!(root.borrow().summary_state(), Some("WARNING"));
    }

    #[test]
    fn test_empty_map_is_error() {
        let root = MonitoredObject::map("empty").into_ref();
        summarize_tree(&root, &WeightTable::default());
        assert_eq!(root.borrow().summary_state(), Some("ERROR"));
    }
}
