//! Request queue and grouped execution.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::dispatch::{self, Annotation, Entries, Payload};
use super::{OptionMask, QueryKind, QueueKey};
use crate::backend::{BackendAdapter, BackendRegistry};
use crate::config::{EngineConfig, DEFAULT_QUERY_TIMEOUT};
use crate::error::{BackendError, Problem};
use crate::object::ObjectRef;

/// Everything that makes two requested keys share one backend call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct GroupKey {
    backend_id: String,
    kind: QueryKind,
    options: OptionMask,
}

/// Outcome of one [`QueryBatcher::execute`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Grouped backend calls issued.
    pub calls: usize,
    /// Groups that failed as a whole (init, query, timeout, unsupported).
    pub failed_groups: usize,
    /// Objects annotated as not existing in their backend.
    pub missing_objects: usize,
    /// Objects annotated with a backend error.
    pub annotated_objects: usize,
}

impl ExecutionReport {
    /// Whether every queued object received data.
    pub fn is_clean(&self) -> bool {
        self.failed_groups == 0 && self.missing_objects == 0
    }
}

/// Collects state requests from objects and answers them with as few
/// backend calls as possible.
///
/// The queue is an owned value: independent batchers do not share anything,
/// and [`QueryBatcher::execute`] always leaves the queue empty.
#[derive(Debug)]
pub struct QueryBatcher {
    queue: BTreeMap<GroupKey, Entries>,
    timeout: Duration,
}

impl Default for QueryBatcher {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT),
        }
    }
}

impl QueryBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new().with_timeout(config.query_timeout())
    }

    /// Time a single grouped call may take before its group counts as failed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue `kind` for each of `objects`. Objects with the same queue key
    /// share one requested key; enqueuing the same object twice is a no-op.
    pub fn enqueue(&mut self, objects: &[ObjectRef], kind: QueryKind) {
        for object in objects {
            let key = QueueKey::for_object(&object.borrow(), kind);
            let group = GroupKey {
                backend_id: key.backend_id,
                kind: key.kind,
                options: key.options,
            };
            let waiting = self
                .queue
                .entry(group)
                .or_default()
                .entry(key.object_key)
                .or_default();
            if !waiting.iter().any(|queued| Rc::ptr_eq(queued, object)) {
                waiting.push(Rc::clone(object));
            }
        }
    }

    /// Queue every query `root` and its configured members need.
    pub fn enqueue_tree(&mut self, root: &ObjectRef) {
        let (kinds, members) = {
            let object = root.borrow();
            (object.required_queries(), object.members().to_vec())
        };
        for kind in kinds {
            self.enqueue(std::slice::from_ref(root), kind);
        }
        for member in &members {
            self.enqueue_tree(member);
        }
    }

    /// Number of distinct requested keys.
    pub fn len(&self) -> usize {
        self.queue.values().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of backend calls the next [`QueryBatcher::execute`] would issue.
    pub fn pending_calls(&self) -> usize {
        self.queue.len()
    }

    pub fn contains(&self, key: &QueueKey) -> bool {
        let group = GroupKey {
            backend_id: key.backend_id.clone(),
            kind: key.kind,
            options: key.options,
        };
        self.queue
            .get(&group)
            .is_some_and(|entries| entries.contains_key(&key.object_key))
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Run one backend call per queued group and write the answers back.
    ///
    /// Calls for different groups run concurrently. A group that cannot be
    /// answered annotates its objects with the error and does not affect
    /// other groups. Results are written back before any failure, so a
    /// failure from this run is never cleared by another group's success.
    pub async fn execute(&mut self, registry: &BackendRegistry) -> ExecutionReport {
        let queue = std::mem::take(&mut self.queue);
        let mut report = ExecutionReport::default();
        let mut failures: Vec<(Entries, BackendError)> = Vec::new();
        let mut dispatched = Vec::new();
        let mut calls = Vec::new();

        for (group, entries) in queue {
            let adapter = match registry.get(&group.backend_id) {
                Ok(adapter) => adapter,
                Err(err) => {
                    failures.push((entries, err));
                    continue;
                }
            };

            let feature = group.kind.feature();
            if !adapter.supports(feature) {
                let err = BackendError::Unsupported {
                    backend_id: group.backend_id.clone(),
                    feature: feature.to_string(),
                };
                failures.push((entries, err));
                continue;
            }

            debug!(
                backend = %group.backend_id,
                kind = %group.kind,
                options = %group.options,
                keys = entries.len(),
                "dispatching grouped query"
            );
            let keys: Vec<String> = entries.keys().cloned().collect();
            calls.push(call(adapter, group.clone(), keys, self.timeout));
            dispatched.push((group, entries));
        }

        report.calls = calls.len();
        let results = join_all(calls).await;

        let mut annotations: Vec<Annotation> = Vec::new();
        for ((group, entries), result) in dispatched.into_iter().zip(results) {
            match result {
                Ok(payload) => {
                    let missing = dispatch::apply(&group.backend_id, group.kind, entries, payload);
                    annotations.extend(missing);
                }
                Err(err) => failures.push((entries, err)),
            }
        }

        for (objects, problem) in annotations {
            report.missing_objects += objects.len();
            for object in objects {
                object.borrow_mut().set_problem(problem.clone());
            }
        }

        for (entries, err) in failures {
            warn!(backend = %err.backend_id(), error = %err, "backend query failed");
            report.failed_groups += 1;
            for object in entries.into_values().flatten() {
                object.borrow_mut().set_problem(Problem::Backend(err.clone()));
                report.annotated_objects += 1;
            }
        }

        info!(
            calls = report.calls,
            failed_groups = report.failed_groups,
            missing_objects = report.missing_objects,
            annotated_objects = report.annotated_objects,
            "query batch executed"
        );
        report
    }
}

/// One grouped backend call, bounded by `timeout`.
async fn call(
    adapter: Arc<dyn BackendAdapter>,
    group: GroupKey,
    keys: Vec<String>,
    timeout: Duration,
) -> Result<Payload, BackendError> {
    let fetch = dispatch::fetch(adapter.as_ref(), group.kind, group.options, &keys);
    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(payload)) => Ok(payload),
        Ok(Err(source)) => Err(BackendError::query(&group.backend_id, source)),
        Err(_) => Err(BackendError::Timeout {
            backend_id: group.backend_id,
            timeout,
        }),
    }
}
