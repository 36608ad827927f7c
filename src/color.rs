use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use ephys_panda::ChannelId;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Channel colours
// ---------------------------------------------------------------------------

/// Colour per original channel id, fixed at load so a channel keeps its
/// colour when others are deleted.
#[derive(Debug, Clone, Default)]
pub struct ChannelColors {
    mapping: BTreeMap<ChannelId, Color32>,
}

impl ChannelColors {
    pub fn new(channels: &[ChannelId]) -> Self {
        let mapping = channels
            .iter()
            .copied()
            .zip(generate_palette(channels.len()))
            .collect();
        Self { mapping }
    }

    pub fn color_for(&self, id: ChannelId) -> Color32 {
        self.mapping.get(&id).copied().unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colours_are_distinct_and_stable_per_id() {
        let ids = [ChannelId(0), ChannelId(1), ChannelId(2)];
        let colors = ChannelColors::new(&ids);
        assert_ne!(colors.color_for(ChannelId(0)), colors.color_for(ChannelId(1)));
        assert_eq!(colors.color_for(ChannelId(7)), Color32::GRAY);
    }
}
