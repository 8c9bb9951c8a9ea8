//! Health differ: per-origin online/offline transition detection
//!
//! The API gives origins no stable identifier, so each one is keyed as
//! `poolId/<name | address | index>`. Reordering or renaming origins between
//! polls misattributes transitions; that is accepted behaviour.

use std::collections::HashMap;
use std::fmt;

use crate::api::{Origin, Pool};

/// Healthy, unhealthy, or not yet known
pub type TriState = Option<bool>;

/// Origin key → tri-state health from one successful poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    origins: HashMap<String, TriState>,
}

impl HealthSnapshot {
    pub fn get(&self, key: &str) -> Option<TriState> {
        self.origins.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Online,
    Offline,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Online => write!(f, "online"),
            Transition::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub kind: Transition,
    pub origin_key: String,
    pub pool_name: String,
    pub origin_label: String,
}

/// Synthesized identity of the `index`-th origin of `pool_id`
pub fn origin_key(pool_id: &str, origin: &Origin, index: usize) -> String {
    match origin.label() {
        Some(label) => format!("{}/{}", pool_id, label),
        None => format!("{}/{}", pool_id, index),
    }
}

/// Compare `pools` against `previous`.
///
/// Returns the transitions in pool/origin order and the snapshot that
/// replaces `previous`. With `first_load` set no events are emitted.
pub fn diff(
    previous: &HealthSnapshot,
    pools: &[Pool],
    first_load: bool,
) -> (Vec<TransitionEvent>, HealthSnapshot) {
    let mut events = Vec::new();
    let mut next = HealthSnapshot::default();

    for pool in pools {
        for (index, origin) in pool.origins.iter().enumerate() {
            let key = origin_key(&pool.id, origin, index);
            let current = origin.healthy;

            if !first_load {
                if let (Some(Some(before)), Some(now)) = (previous.get(&key), current) {
                    if before != now {
                        events.push(TransitionEvent {
                            kind: if now { Transition::Online } else { Transition::Offline },
                            origin_key: key.clone(),
                            pool_name: pool.name.clone(),
                            origin_label: origin
                                .label()
                                .map(str::to_string)
                                .unwrap_or_else(|| format!("#{}", index)),
                        });
                    }
                }
            }

            next.origins.insert(key, current);
        }
    }

    (events, next)
}
