//! One backend call per group and the write-back of its answer.

use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::warn;

use super::{OptionMask, QueryKind, BY_HOST_NAME};
use crate::backend::{BackendAdapter, CountsMap, StateMap, StateRecord};
use crate::error::{AdapterError, Problem};
use crate::object::{MonitoredObject, ObjectRef};
use crate::state::StateCounts;

/// Answer of one grouped call.
pub(crate) enum Payload {
    States(StateMap),
    Counts(CountsMap),
    /// Host group members plus the service counts of each member host.
    Hosts {
        hosts: StateMap,
        service_counts: CountsMap,
    },
}

/// Requested keys of a group mapped to the objects waiting on them.
pub(crate) type Entries = BTreeMap<String, Vec<ObjectRef>>;

/// Issue the backend call for `kind` covering all `keys`.
pub(crate) async fn fetch(
    adapter: &dyn BackendAdapter,
    kind: QueryKind,
    options: OptionMask,
    keys: &[String],
) -> Result<Payload, AdapterError> {
    let filters = kind.filters();
    match kind {
        QueryKind::HostState => adapter
            .fetch_host_state(keys, options, filters)
            .await
            .map(Payload::States),
        QueryKind::ServiceState
        | QueryKind::HostMemberDetails
        | QueryKind::ServicegroupMemberDetails => adapter
            .fetch_service_state(keys, options, filters)
            .await
            .map(Payload::States),
        QueryKind::HostMemberState => adapter
            .fetch_host_state_counts(keys, options, filters)
            .await
            .map(Payload::Counts),
        QueryKind::HostgroupMemberState => adapter
            .fetch_hostgroup_state_counts(keys, options, filters)
            .await
            .map(Payload::Counts),
        QueryKind::ServicegroupMemberState => adapter
            .fetch_servicegroup_state_counts(keys, options, filters)
            .await
            .map(Payload::Counts),
        QueryKind::HostgroupMemberDetails => {
            let hosts = adapter.fetch_host_state(keys, options, filters).await?;
            let names: Vec<String> = hosts
                .values()
                .flatten()
                .map(|host| host.host_name.clone())
                .unique()
                .sorted()
                .collect();

            let service_counts = if names.is_empty() {
                CountsMap::new()
            } else {
                adapter
                    .fetch_host_state_counts(&names, options, &BY_HOST_NAME)
                    .await
                    .unwrap_or_else(|err| {
                        warn!(error = %err, "service counts of group members unavailable");
                        CountsMap::new()
                    })
            };
            Ok(Payload::Hosts {
                hosts,
                service_counts,
            })
        }
    }
}

/// Objects and the problem to attach to them once every success is written.
pub(crate) type Annotation = (Vec<ObjectRef>, Problem);

fn missing(key: &str, kind: QueryKind, objects: Vec<ObjectRef>) -> Annotation {
    warn!(object = key, kind = %kind, "object does not exist in backend");
    let problem = Problem::Missing {
        object: key.to_string(),
        kind: kind.as_str().to_string(),
    };
    (objects, problem)
}

/// Member objects for `parent`, one per record, configured like the parent.
fn build_members(
    backend_id: &str,
    parent: &ObjectRef,
    records: &[StateRecord],
) -> Vec<ObjectRef> {
    let config = parent.borrow().config().clone();
    records
        .iter()
        .map(|record| MonitoredObject::from_record(backend_id, record, &config).into_ref())
        .collect()
}

/// Write a successful answer back onto every waiting object. Keys the
/// backend did not know are returned as [`Problem::Missing`] annotations.
pub(crate) fn apply(
    backend_id: &str,
    kind: QueryKind,
    entries: Entries,
    payload: Payload,
) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    match payload {
        Payload::States(mut states) => {
            for (key, objects) in entries {
                let records = states.remove(&key);
                match (kind, records) {
                    (QueryKind::HostState | QueryKind::ServiceState, Some(records)) => {
                        match records.into_iter().next() {
                            Some(record) => {
                                for object in &objects {
                                    object.borrow_mut().set_state(record.clone());
                                }
                            }
                            None => annotations.push(missing(&key, kind, objects)),
                        }
                    }
                    (
                        QueryKind::HostMemberDetails | QueryKind::ServicegroupMemberDetails,
                        Some(records),
                    ) => {
                        for object in &objects {
                            let members = build_members(backend_id, object, &records);
                            object.borrow_mut().set_members(members);
                        }
                    }
                    (_, None) if kind.tolerates_missing() => {
                        for object in &objects {
                            object.borrow_mut().set_members(Vec::new());
                        }
                    }
                    _ => annotations.push(missing(&key, kind, objects)),
                }
            }
        }
        Payload::Counts(mut counts) => {
            for (key, objects) in entries {
                match counts.remove(&key) {
                    Some(found) => {
                        for object in &objects {
                            object.borrow_mut().set_state_counts(found.clone());
                        }
                    }
                    None if kind.tolerates_missing() => {
                        for object in &objects {
                            object.borrow_mut().set_state_counts(StateCounts::new());
                        }
                    }
                    None => annotations.push(missing(&key, kind, objects)),
                }
            }
        }
        Payload::Hosts {
            mut hosts,
            service_counts,
        } => {
            for (key, objects) in entries {
                let Some(records) = hosts.remove(&key) else {
                    annotations.push(missing(&key, kind, objects));
                    continue;
                };
                for object in &objects {
                    let members = build_members(backend_id, object, &records);
                    for member in &members {
                        let mut member = member.borrow_mut();
                        let counts = service_counts.get(member.name()).cloned();
                        if let Some(counts) = counts {
                            member.set_state_counts(counts);
                        }
                    }
                    object.borrow_mut().set_members(members);
                }
            }
        }
    }
    annotations
}
