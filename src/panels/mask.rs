use serde::Serialize;

/// Horizontal span of one panel, in percent of screen width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanelRegion {
    pub start: f64,
    pub width: f64,
}

impl PanelRegion {
    pub fn end(&self) -> f64 {
        self.start + self.width
    }
}

/// The three screen regions the video shows through. Everything outside
/// them stays transparent so the base scoreboard remains visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaskRegions {
    pub left: PanelRegion,
    pub center: PanelRegion,
    pub right: PanelRegion,
}

impl MaskRegions {
    /// Hand-tuned stops measured against the physical wall. Not evenly
    /// spaced; the projector keystone shifts the center and right
    /// cutouts.
    pub fn calibrated() -> Self {
        MaskRegions {
            left: PanelRegion {
                start: 5.0,
                width: 25.0,
            },
            center: PanelRegion {
                start: 38.5,
                width: 23.5,
            },
            right: PanelRegion {
                start: 71.0,
                width: 23.0,
            },
        }
    }

    /// Derive evenly spaced regions from a panel width and gap, with the
    /// whole strip centered on screen.
    pub fn from_layout(width_pct: f64, gap_pct: f64) -> Self {
        let total = 3.0 * width_pct + 2.0 * gap_pct;
        let start = (100.0 - total) / 2.0;
        let step = width_pct + gap_pct;
        MaskRegions {
            left: PanelRegion {
                start,
                width: width_pct,
            },
            center: PanelRegion {
                start: start + step,
                width: width_pct,
            },
            right: PanelRegion {
                start: start + 2.0 * step,
                width: width_pct,
            },
        }
    }

    pub fn regions(&self) -> [PanelRegion; 3] {
        [self.left, self.center, self.right]
    }

    /// CSS `mask-image` value: opaque (white) over each panel region,
    /// transparent everywhere else.
    pub fn mask_css(&self) -> String {
        let mut stops = vec!["transparent 0%".to_string()];
        for region in self.regions() {
            let start = region.start;
            let end = region.end();
            stops.push(format!("transparent {}%", start));
            stops.push(format!("white {}%", start));
            stops.push(format!("white {}%", end));
            stops.push(format!("transparent {}%", end));
        }
        stops.push("transparent 100%".to_string());
        format!("linear-gradient(to right, {})", stops.join(", "))
    }
}

impl Default for MaskRegions {
    fn default() -> Self {
        MaskRegions::calibrated()
    }
}
