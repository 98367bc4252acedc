//! `configure-bst-thresholds` validation.

use bst_common::asic::port_from_notation;
use bst_common::models::{ParamError, ThresholdParams};
use bst_common::realm::{IndexKey, Realm};
use bst_common::snapshot::{Counters, Index};

use super::report::{Scale, default_thresholds};

/// A validated threshold change, in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdUpdate {
    pub realm: Realm,
    pub index: Index,
    /// `(counter position, bytes)` for each supplied threshold.
    pub values: Vec<(usize, u64)>,
}

impl ThresholdUpdate {
    /// Fold the update into the entry's current thresholds (defaults when
    /// the entry was never configured).
    pub fn merge_into(&self, current: Option<&Counters>, scale: &Scale<'_>) -> Counters {
        let mut entry = current
            .copied()
            .unwrap_or_else(|| default_thresholds(scale.caps(), self.realm));
        for (position, bytes) in &self.values {
            entry[*position] = *bytes;
        }
        entry
    }
}

pub fn validate(
    params: &ThresholdParams,
    scale: &Scale<'_>,
) -> Result<ThresholdUpdate, ParamError> {
    let caps = scale.caps();
    let name = params.realm.as_deref().ok_or(ParamError::Missing("realm"))?;
    let realm: Realm = name.parse().map_err(|_| ParamError::Invalid {
        key: "realm",
        value: name.to_string(),
    })?;

    let mut positions = [0u32; 2];
    for (slot, key) in positions.iter_mut().zip(realm.index_keys()) {
        let value = index_param(params, *key)?;
        if !caps.index_in_range(realm, *key, value) {
            let extent = u64::from(caps.index_extent(realm, *key));
            let (min, max) = match key {
                IndexKey::Port => (1, extent),
                _ => (0, extent.saturating_sub(1)),
            };
            return Err(ParamError::OutOfRange {
                key: key.as_str(),
                value: value.into(),
                min,
                max,
            });
        }
        *slot = value;
    }

    let mut values = Vec::new();
    for (position, counter) in realm.counters().iter().enumerate() {
        if let Some(value) = params.counter_threshold(*counter) {
            let bytes = scale.threshold_to_bytes(realm, counter.threshold_key(), value)?;
            values.push((position, bytes));
        }
    }
    if values.is_empty() {
        return Err(ParamError::Missing(realm.counters()[0].threshold_key()));
    }

    Ok(ThresholdUpdate {
        realm,
        index: Index::new(positions[0], positions[1]),
        values,
    })
}

fn index_param(params: &ThresholdParams, key: IndexKey) -> Result<u32, ParamError> {
    let missing = ParamError::Missing(key.as_str());
    match key {
        IndexKey::Port => {
            let raw = params.port.as_deref().ok_or(missing)?;
            port_from_notation(raw).ok_or_else(|| ParamError::Invalid {
                key: "port",
                value: raw.to_string(),
            })
        }
        IndexKey::PriorityGroup => params.priority_group.ok_or(missing),
        IndexKey::ServicePool => params.service_pool.ok_or(missing),
        IndexKey::Queue => params.queue.ok_or(missing),
        IndexKey::QueueGroup => params.queue_group.ok_or(missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bst_common::asic::AsicCapabilities;
    use bst_common::models::FeatureConfig;

    fn params(json: serde_json::Value) -> ThresholdParams {
        serde_json::from_value(json).unwrap()
    }

    fn cells_feature() -> FeatureConfig {
        FeatureConfig {
            stat_units_in_cells: true,
            ..FeatureConfig::default()
        }
    }

    #[test]
    fn device_threshold() {
        let caps = AsicCapabilities::trident2();
        let scale = Scale::new(&cells_feature(), &caps);
        let update = validate(
            &params(serde_json::json!({ "realm": "device", "threshold": 4000 })),
            &scale,
        )
        .unwrap();
        assert_eq!(update.realm, Realm::Device);
        assert_eq!(update.index, Index::DEVICE);
        assert_eq!(update.values, vec![(0, 4000 * 208)]);
    }

    #[test]
    fn port_priority_group_needs_one_counter() {
        let caps = AsicCapabilities::trident2();
        let scale = Scale::new(&cells_feature(), &caps);
        let update = validate(
            &params(serde_json::json!({
                "realm": "ingress-port-priority-group",
                "port": "5",
                "priority-group": 7,
                "um-headroom-threshold": 100
            })),
            &scale,
        )
        .unwrap();
        assert_eq!(update.index, Index::new(5, 7));
        assert_eq!(update.values, vec![(1, 100 * 208)]);

        let err = validate(
            &params(serde_json::json!({
                "realm": "ingress-port-priority-group",
                "port": "5",
                "priority-group": 7
            })),
            &scale,
        )
        .unwrap_err();
        assert_eq!(err, ParamError::Missing("um-share-threshold"));
    }

    #[test]
    fn missing_and_invalid_indices() {
        let caps = AsicCapabilities::trident2();
        let scale = Scale::new(&cells_feature(), &caps);

        let err = validate(
            &params(serde_json::json!({ "realm": "egress-uc-queue", "uc-threshold": 10 })),
            &scale,
        )
        .unwrap_err();
        assert_eq!(err, ParamError::Missing("queue"));

        let err = validate(
            &params(serde_json::json!({
                "realm": "egress-cpu-queue", "queue": 8, "cpu-threshold": 10
            })),
            &scale,
        )
        .unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { key: "queue", max: 7, .. }));

        let err = validate(
            &params(serde_json::json!({
                "realm": "ingress-port-service-pool",
                "port": "101",
                "service-pool": 0,
                "um-share-threshold": 10
            })),
            &scale,
        )
        .unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { key: "port", min: 1, max: 100, .. }));
    }

    #[test]
    fn unknown_realm() {
        let caps = AsicCapabilities::trident2();
        let scale = Scale::new(&cells_feature(), &caps);
        let err = validate(
            &params(serde_json::json!({ "realm": "egress-bogus", "threshold": 1 })),
            &scale,
        )
        .unwrap_err();
        assert!(matches!(err, ParamError::Invalid { key: "realm", .. }));
    }

    #[test]
    fn merge_keeps_other_counters_at_default() {
        let caps = AsicCapabilities::trident2();
        let scale = Scale::new(&cells_feature(), &caps);
        let update = validate(
            &params(serde_json::json!({
                "realm": "egress-service-pool",
                "service-pool": 2,
                "mc-share-threshold": 64
            })),
            &scale,
        )
        .unwrap();
        let merged = update.merge_into(None, &scale);
        assert_eq!(merged, [caps.total_cells * 208, 64 * 208, 0, 0]);
    }
}
