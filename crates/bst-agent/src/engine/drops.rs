//! Congestion drop counters.

use std::cmp::Reverse;

use bst_common::asic::{AsicCapabilities, port_from_notation, port_to_notation};
use bst_common::models::{
    DROP_COUNT_RANGE, DropCounterParams, DropRequestType, ParamError, QueueType,
};
use bst_common::report::{DropEntry, DropReport};

use crate::silicon::{Silicon, SiliconError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    All,
    List(Vec<u32>),
}

/// A validated drop-counter query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropRequest {
    pub kind: DropRequestType,
    pub count: u32,
    pub ports: PortSelection,
    pub queue_type: Option<QueueType>,
    pub queues: Vec<u32>,
}

pub fn validate(
    params: &DropCounterParams,
    caps: &AsicCapabilities,
) -> Result<DropRequest, ParamError> {
    let raw_kind = params
        .request_type
        .as_deref()
        .ok_or(ParamError::Missing("request-type"))?;
    let kind: DropRequestType = raw_kind.parse().map_err(|_| ParamError::Invalid {
        key: "request-type",
        value: raw_kind.to_string(),
    })?;
    let rp = &params.request_params;

    let count = match rp.count {
        Some(count) if DROP_COUNT_RANGE.contains(&count) => Some(count),
        Some(count) => {
            return Err(ParamError::OutOfRange {
                key: "count",
                value: count.into(),
                min: (*DROP_COUNT_RANGE.start()).into(),
                max: (*DROP_COUNT_RANGE.end()).into(),
            });
        }
        None => None,
    };

    let ports = rp
        .port_list
        .as_deref()
        .map(|list| parse_ports(list, caps))
        .transpose()?;

    let queue_type = rp
        .queue_type
        .as_deref()
        .map(|raw| {
            raw.parse::<QueueType>().map_err(|_| ParamError::Invalid {
                key: "queue-type",
                value: raw.to_string(),
            })
        })
        .transpose()?;

    let needs_count = matches!(
        kind,
        DropRequestType::TopDrops | DropRequestType::TopPortQueueDrops
    );
    let needs_ports = matches!(
        kind,
        DropRequestType::PortDrops | DropRequestType::PortQueueDrops
    );
    let needs_queue_type = matches!(
        kind,
        DropRequestType::TopPortQueueDrops | DropRequestType::PortQueueDrops
    );

    if needs_count && count.is_none() {
        return Err(ParamError::Missing("count"));
    }
    if needs_ports && ports.is_none() {
        return Err(ParamError::Missing("port-list"));
    }
    if needs_queue_type && queue_type.is_none() {
        return Err(ParamError::Missing("queue-type"));
    }

    let mut queues = Vec::new();
    if kind == DropRequestType::PortQueueDrops {
        let list = rp.queue_list.as_ref().ok_or(ParamError::Missing("queue-list"))?;
        let extent = queue_type.map_or(0, |qt| caps.queues_per_port(qt));
        for queue in list {
            if *queue >= extent {
                return Err(ParamError::OutOfRange {
                    key: "queue-list",
                    value: (*queue).into(),
                    min: 0,
                    max: u64::from(extent.saturating_sub(1)),
                });
            }
            queues.push(*queue);
        }
    }

    Ok(DropRequest {
        kind,
        count: count.unwrap_or(*DROP_COUNT_RANGE.end()),
        ports: ports.unwrap_or(PortSelection::All),
        queue_type,
        queues,
    })
}

fn parse_ports(list: &[String], caps: &AsicCapabilities) -> Result<PortSelection, ParamError> {
    if list.len() == 1 && list[0] == "all" {
        return Ok(PortSelection::All);
    }
    let invalid = |raw: &str| ParamError::Invalid {
        key: "port-list",
        value: raw.to_string(),
    };
    let mut ports = Vec::with_capacity(list.len());
    for raw in list {
        let port = port_from_notation(raw).ok_or_else(|| invalid(raw))?;
        if port > caps.num_ports {
            return Err(invalid(raw));
        }
        ports.push(port);
    }
    Ok(PortSelection::List(ports))
}

fn queue_types(queue_type: Option<QueueType>) -> Vec<QueueType> {
    match queue_type {
        Some(QueueType::All) | None => vec![QueueType::Ucast, QueueType::Mcast],
        Some(qt) => vec![qt],
    }
}

/// Read the counters a request asks for. `top-*` results are sorted by
/// drops, highest first, and contain only ports or queues that dropped.
pub fn collect(req: &DropRequest, silicon: &mut dyn Silicon) -> Result<DropReport, SiliconError> {
    let caps = silicon.capabilities().clone();
    let ports: Vec<u32> = match &req.ports {
        PortSelection::All => (1..=caps.num_ports).collect(),
        PortSelection::List(list) => list.clone(),
    };
    let limit = req.count as usize;

    let data = match req.kind {
        DropRequestType::TopDrops => {
            let mut totals = Vec::new();
            for port in 1..=caps.num_ports {
                let drops = silicon.port_drops(port)?;
                if drops > 0 {
                    totals.push((port, drops));
                }
            }
            totals.sort_by_key(|(_, drops)| Reverse(*drops));
            totals.truncate(limit);
            totals
                .into_iter()
                .map(|(port, drops)| DropEntry::Port {
                    port: port_to_notation(port),
                    data: drops,
                })
                .collect()
        }
        DropRequestType::TopPortQueueDrops => {
            let mut queues = Vec::new();
            for port in 1..=caps.num_ports {
                for qt in queue_types(req.queue_type) {
                    for queue in 0..caps.queues_per_port(qt) {
                        let drops = silicon.queue_drops(port, qt, queue)?;
                        if drops > 0 {
                            queues.push((port, qt, queue, drops));
                        }
                    }
                }
            }
            queues.sort_by_key(|(_, _, _, drops)| Reverse(*drops));
            queues.truncate(limit);
            queues
                .into_iter()
                .map(|(port, queue_type, queue, drops)| DropEntry::PortQueue {
                    port: port_to_notation(port),
                    queue_type,
                    data: vec![(queue, drops)],
                })
                .collect()
        }
        DropRequestType::PortDrops => ports
            .iter()
            .map(|port| {
                Ok(DropEntry::Port {
                    port: port_to_notation(*port),
                    data: silicon.port_drops(*port)?,
                })
            })
            .collect::<Result<Vec<_>, SiliconError>>()?,
        DropRequestType::PortQueueDrops => {
            let mut entries = Vec::new();
            for port in &ports {
                for qt in queue_types(req.queue_type) {
                    let extent = caps.queues_per_port(qt);
                    let mut data = Vec::new();
                    for queue in req.queues.iter().filter(|q| **q < extent) {
                        data.push((*queue, silicon.queue_drops(*port, qt, *queue)?));
                    }
                    entries.push(DropEntry::PortQueue {
                        port: port_to_notation(*port),
                        queue_type: qt,
                        data,
                    });
                }
            }
            entries
        }
    };

    Ok(DropReport {
        report_type: req.kind,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silicon::SimulatedAsic;

    fn params(json: serde_json::Value) -> DropCounterParams {
        serde_json::from_value(json).unwrap()
    }

    fn asic() -> SimulatedAsic {
        let mut asic = SimulatedAsic::quiescent(AsicCapabilities::trident2());
        asic.inject_drops(2, QueueType::Ucast, 0, 40);
        asic.inject_drops(7, QueueType::Ucast, 3, 90);
        asic.inject_drops(7, QueueType::Mcast, 1, 5);
        asic.inject_drops(9, QueueType::Mcast, 2, 60);
        asic
    }

    #[test]
    fn required_keys_per_request_type() {
        let caps = AsicCapabilities::trident2();
        let err = validate(&params(serde_json::json!({ "request-type": "top-drops" })), &caps);
        assert_eq!(err.unwrap_err(), ParamError::Missing("count"));

        let err = validate(
            &params(serde_json::json!({
                "request-type": "port-queue-drops",
                "request-params": { "port-list": ["1"], "queue-type": "ucast" }
            })),
            &caps,
        );
        assert_eq!(err.unwrap_err(), ParamError::Missing("queue-list"));

        let err = validate(
            &params(serde_json::json!({
                "request-type": "top-drops",
                "request-params": { "count": 65 }
            })),
            &caps,
        );
        assert!(matches!(err.unwrap_err(), ParamError::OutOfRange { key: "count", .. }));

        let err = validate(&params(serde_json::json!({ "request-type": "most-drops" })), &caps);
        assert!(matches!(err.unwrap_err(), ParamError::Invalid { key: "request-type", .. }));
    }

    #[test]
    fn port_list_accepts_all_or_valid_ports() {
        let caps = AsicCapabilities::trident2();
        let req = validate(
            &params(serde_json::json!({
                "request-type": "port-drops",
                "request-params": { "port-list": ["all"] }
            })),
            &caps,
        )
        .unwrap();
        assert_eq!(req.ports, PortSelection::All);

        let err = validate(
            &params(serde_json::json!({
                "request-type": "port-drops",
                "request-params": { "port-list": ["1", "200"] }
            })),
            &caps,
        );
        assert!(matches!(err.unwrap_err(), ParamError::Invalid { key: "port-list", .. }));
    }

    #[test]
    fn top_drops_sorted_descending() {
        let caps = AsicCapabilities::trident2();
        let mut asic = asic();
        let req = validate(
            &params(serde_json::json!({
                "request-type": "top-drops",
                "request-params": { "count": 2 }
            })),
            &caps,
        )
        .unwrap();
        let report = collect(&req, &mut asic).unwrap();
        let peaks: Vec<u64> = report.data.iter().map(DropEntry::peak).collect();
        assert_eq!(peaks, vec![95, 60]);
    }

    #[test]
    fn top_port_queue_drops_by_queue_type() {
        let caps = AsicCapabilities::trident2();
        let mut asic = asic();
        let req = validate(
            &params(serde_json::json!({
                "request-type": "top-port-queue-drops",
                "request-params": { "count": 10, "queue-type": "mcast" }
            })),
            &caps,
        )
        .unwrap();
        let report = collect(&req, &mut asic).unwrap();
        assert_eq!(
            report.data,
            vec![
                DropEntry::PortQueue {
                    port: "9".into(),
                    queue_type: QueueType::Mcast,
                    data: vec![(2, 60)],
                },
                DropEntry::PortQueue {
                    port: "7".into(),
                    queue_type: QueueType::Mcast,
                    data: vec![(1, 5)],
                },
            ]
        );
    }

    #[test]
    fn port_queue_drops_lists_requested_queues() {
        let caps = AsicCapabilities::trident2();
        let mut asic = asic();
        let req = validate(
            &params(serde_json::json!({
                "request-type": "port-queue-drops",
                "request-params": {
                    "port-list": ["7"], "queue-type": "ucast", "queue-list": [2, 3]
                }
            })),
            &caps,
        )
        .unwrap();
        let report = collect(&req, &mut asic).unwrap();
        assert_eq!(report.report_type, DropRequestType::PortQueueDrops);
        assert_eq!(
            report.data,
            vec![DropEntry::PortQueue {
                port: "7".into(),
                queue_type: QueueType::Ucast,
                data: vec![(2, 0), (3, 90)],
            }]
        );
    }
}
