use std::collections::BTreeSet;

use super::model::{ChannelId, Recording};

// ---------------------------------------------------------------------------
// Display selection: which channels the viewer plots
// ---------------------------------------------------------------------------

/// Selected original channel ids. Ids that no longer exist in the recording
/// are dropped by [`prune`]; an empty set shows nothing.
pub type ChannelSelection = BTreeSet<ChannelId>;

/// Initial selection after a load: the first channel only, or every channel
/// when `select_all` is set.
pub fn init_selection(recording: &Recording, select_all: bool) -> ChannelSelection {
    let mapping = recording.channel_mapping();
    if select_all {
        mapping.iter().copied().collect()
    } else {
        mapping.first().copied().into_iter().collect()
    }
}

/// Flip one channel in or out of the selection.
pub fn toggle(selection: &mut ChannelSelection, id: ChannelId) {
    if !selection.remove(&id) {
        selection.insert(id);
    }
}

/// Forget ids that are not part of the recording any more.
pub fn prune(selection: &mut ChannelSelection, recording: &Recording) {
    selection.retain(|id| recording.index_of(*id).is_some());
}

/// Current column indices of the selected channels, in column order.
pub fn visible_indices(recording: &Recording, selection: &ChannelSelection) -> Vec<usize> {
    recording
        .channel_mapping()
        .iter()
        .enumerate()
        .filter(|(_, id)| selection.contains(id))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::edit::delete_channels;
    use crate::data::model::RawRecording;
    use ndarray::Array2;

    fn recording(cols: usize) -> Recording {
        let raw = RawRecording::from_samples(Array2::zeros((10, cols)), 10.0).unwrap();
        Recording::new(raw).unwrap()
    }

    #[test]
    fn init_selects_first_or_all() {
        let rec = recording(3);
        assert_eq!(init_selection(&rec, false), [ChannelId(0)].into());
        assert_eq!(init_selection(&rec, true).len(), 3);
    }

    #[test]
    fn toggle_adds_and_removes() {
        let mut sel = ChannelSelection::new();
        toggle(&mut sel, ChannelId(2));
        assert!(sel.contains(&ChannelId(2)));
        toggle(&mut sel, ChannelId(2));
        assert!(sel.is_empty());
    }

    #[test]
    fn indices_follow_the_mapping_after_deletion() {
        let rec = recording(4);
        let mut sel: ChannelSelection = [ChannelId(1), ChannelId(3)].into();
        let rec = delete_channels(&rec, &[ChannelId(1)]).unwrap();
        prune(&mut sel, &rec);
        assert_eq!(sel, [ChannelId(3)].into());
        assert_eq!(visible_indices(&rec, &sel), vec![2]);
    }
}
