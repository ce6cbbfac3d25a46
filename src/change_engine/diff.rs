//! Accumulates per-op `OpEffect`s into the `Diff` returned from an apply
//! (spec §3, §4.4).

use std::collections::HashMap;

use super::ops::OpEffect;
use crate::model::{Diff, DiffUpdate, NodeRef};

#[derive(Default)]
pub struct DiffBuilder {
    added: Vec<NodeRef>,
    removed: Vec<NodeRef>,
    updated: HashMap<String, (u32, Vec<String>)>,
}

impl DiffBuilder {
    pub fn record(&mut self, day_number: u32, effect: OpEffect) {
        for id in effect.added {
            self.added.push(NodeRef { id, day: day_number });
        }
        for id in effect.removed {
            self.removed.push(NodeRef { id, day: day_number });
        }
        for (id, fields) in effect.updated {
            let entry = self.updated.entry(id).or_insert_with(|| (day_number, Vec::new()));
            entry.0 = day_number;
            for field in fields {
                if !entry.1.contains(&field) {
                    entry.1.push(field);
                }
            }
        }
    }

    pub fn build(self) -> Diff {
        Diff {
            added: self.added,
            removed: self.removed,
            updated: self
                .updated
                .into_iter()
                .map(|(id, (_, fields))| DiffUpdate { id, fields })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_groups_effects_by_kind() {
        let mut builder = DiffBuilder::default();
        builder.record(
            1,
            OpEffect {
                added: vec!["n1".to_string()],
                removed: vec![],
                updated: vec![],
            },
        );
        builder.record(
            1,
            OpEffect {
                added: vec![],
                removed: vec!["n2".to_string()],
                updated: vec![],
            },
        );
        let diff = builder.build();
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.updated.is_empty());
    }
}
