//! Prompt and mask merge: key union, local wins.

use std::collections::BTreeMap;

use snapsync_types::{MaskState, PromptState};

use super::{DomainMerge, MergeContext};

fn union_local_wins<V: Clone>(
    local: &BTreeMap<String, V>,
    remote: &BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    let mut merged = remote.clone();
    merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

impl DomainMerge for PromptState {
    fn merge(local: &Self, remote: &Self, _ctx: &MergeContext) -> Self {
        PromptState {
            prompts: union_local_wins(&local.prompts, &remote.prompts),
            extra: local.extra.clone(),
        }
    }
}

impl DomainMerge for MaskState {
    fn merge(local: &Self, remote: &Self, _ctx: &MergeContext) -> Self {
        MaskState {
            masks: union_local_wins(&local.masks, &remote.masks),
            extra: local.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsync_types::{Mask, Prompt};

    #[test]
    fn prompt_union_prefers_local_on_collision() {
        let local = PromptState::from_prompts([Prompt::new("a", "local a", "1")]);
        let remote = PromptState::from_prompts([
            Prompt::new("a", "remote a", "2"),
            Prompt::new("b", "remote b", "3"),
        ]);

        let merged = PromptState::merge(&local, &remote, &MergeContext::at(0));

        assert_eq!(merged.prompts.len(), 2);
        assert_eq!(merged.prompts["a"].content, "1");
        assert_eq!(merged.prompts["b"].content, "3");
    }

    #[test]
    fn prompt_merge_with_empty_remote_is_identity() {
        let local = PromptState::from_prompts([Prompt::new("a", "t", "c")]);
        let merged = PromptState::merge(&local, &PromptState::default(), &MergeContext::at(0));
        assert_eq!(merged, local);
    }

    #[test]
    fn mask_union_prefers_local_on_collision() {
        let local = MaskState::from_masks([Mask::new("m1", "Local Writer")]);
        let remote = MaskState::from_masks([
            Mask::new("m1", "Remote Writer"),
            Mask::new("m2", "Translator"),
        ]);

        let merged = MaskState::merge(&local, &remote, &MergeContext::at(0));

        assert_eq!(merged.masks["m1"].name, "Local Writer");
        assert_eq!(merged.masks["m2"].name, "Translator");
    }
}
