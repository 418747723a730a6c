//! Render statistics collection
//!
//! Per-frame counters for profiling and tests: draw calls per pass,
//! shadow tiles actually re-rendered, light counts after culling and
//! atlas pressure. The pipeline fills a collector while it runs; hosts
//! read the finished stats after the frame.

use serde::{Deserialize, Serialize};

/// Statistics of one rendered frame
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RenderStats {
    /// Frame number these stats belong to
    pub frame: u64,

    /// Total draw calls issued
    pub draw_calls: u32,

    /// Draw calls per pass (label, count)
    pub draws_per_pass: Vec<(String, u32)>,

    /// Shadow tiles re-rendered this frame
    pub shadow_tiles_rendered: u32,

    /// Lights attached to the manager
    pub lights_total: u32,

    /// Lights surviving the visibility test
    pub lights_visible: u32,

    /// Occupied fraction of the shadow atlas (0-1)
    pub atlas_utilization: f32,

    /// Antialiasing subpasses executed
    pub aa_subpasses: u32,
}

impl RenderStats {
    /// Draw calls recorded for one pass label
    pub fn draws_in_pass(&self, label: &str) -> u32 {
        self.draws_per_pass
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Accumulates statistics while a frame renders
#[derive(Debug, Default)]
pub struct StatsCollector {
    current: RenderStats,
    last: RenderStats,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset counters for a new frame
    pub fn begin_frame(&mut self, frame: u64) {
        self.current = RenderStats {
            frame,
            ..Default::default()
        };
    }

    /// Count one draw in a pass
    pub fn record_draw(&mut self, pass: &str) {
        self.current.draw_calls += 1;
        if let Some(entry) = self
            .current
            .draws_per_pass
            .iter_mut()
            .find(|(name, _)| name == pass)
        {
            entry.1 += 1;
        } else {
            self.current.draws_per_pass.push((pass.into(), 1));
        }
    }

    /// Count one shadow tile re-render
    pub fn record_shadow_tile(&mut self) {
        self.current.shadow_tiles_rendered += 1;
    }

    /// Count one antialiasing subpass
    pub fn record_aa_subpass(&mut self) {
        self.current.aa_subpasses += 1;
    }

    /// Store light counts after culling
    pub fn set_light_counts(&mut self, total: u32, visible: u32) {
        self.current.lights_total = total;
        self.current.lights_visible = visible;
    }

    /// Store the atlas occupancy fraction
    pub fn set_atlas_utilization(&mut self, utilization: f32) {
        self.current.atlas_utilization = utilization;
    }

    /// Finish the frame and keep its stats as `last`
    pub fn end_frame(&mut self) -> &RenderStats {
        self.last = core::mem::take(&mut self.current);
        &self.last
    }

    /// Stats of the most recently finished frame
    pub fn last(&self) -> &RenderStats {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_pass_counting() {
        let mut collector = StatsCollector::new();
        collector.begin_frame(1);
        collector.record_draw("shadow");
        collector.record_draw("shadow");
        collector.record_draw("main");

        let stats = collector.end_frame();
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.draws_in_pass("shadow"), 2);
        assert_eq!(stats.draws_in_pass("main"), 1);
        assert_eq!(stats.draws_in_pass("post"), 0);
    }

    #[test]
    fn test_frame_reset() {
        let mut collector = StatsCollector::new();
        collector.begin_frame(1);
        collector.record_shadow_tile();
        collector.end_frame();

        collector.begin_frame(2);
        let stats = collector.end_frame();
        assert_eq!(stats.frame, 2);
        assert_eq!(stats.shadow_tiles_rendered, 0);
    }

    #[test]
    fn test_stats_serialization() {
        let mut collector = StatsCollector::new();
        collector.begin_frame(7);
        collector.record_draw("main");
        collector.set_light_counts(10, 6);
        let stats = collector.end_frame().clone();

        let json = serde_json::to_string(&stats).unwrap();
        let restored: RenderStats = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.frame, 7);
        assert_eq!(restored.lights_visible, 6);
    }
}
