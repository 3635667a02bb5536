use std::path::Path;

use brickbatch_render::PackStats;

/// One submitted frame.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FrameRecord {
    pub index: u32,
    /// A materialization ran before this frame.
    pub packed: bool,
    pub draw_calls: u32,
    /// Draws the executor actually issued (line-fill draws may be skipped).
    pub issued: u32,
    pub instances_drawn: u32,
    pub instances_skipped: u32,
    pub state_changes: u32,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PackSummary {
    pub active_parts: usize,
    pub vertices: u32,
    pub indices: u32,
    pub materials: u32,
    pub bytes: u64,
    pub elapsed_ms: f64,
}

impl From<&PackStats> for PackSummary {
    fn from(stats: &PackStats) -> Self {
        Self {
            active_parts: stats.active_parts,
            vertices: stats.totals.vertices,
            indices: stats.totals.indices,
            materials: stats.totals.materials,
            bytes: stats.bytes,
            elapsed_ms: stats.elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Everything the viewer prints after a run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Report {
    pub adapter: String,
    pub model: String,
    pub status: String,
    pub instances: usize,
    pub parts: usize,
    pub pack: Option<PackSummary>,
    pub frames: Vec<FrameRecord>,
    pub skipped_frames: u32,
}

/// Save a report as pretty JSON.
pub fn save_report(path: &Path, report: &Report) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Format a report as a markdown summary.
pub fn format_markdown(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Model `{}` ({}): {} instances, {} distinct parts on {}\n\n",
        report.model, report.status, report.instances, report.parts, report.adapter
    ));
    if let Some(pack) = &report.pack {
        out.push_str(&format!(
            "Packed {} parts: {} vertices, {} indices, {} materials, {} bytes in {:.2} ms\n\n",
            pack.active_parts,
            pack.vertices,
            pack.indices,
            pack.materials,
            pack.bytes,
            pack.elapsed_ms
        ));
    }

    out.push_str("| Frame | Packed | Draws | Issued | Drawn | Skipped | State changes | Time (ms) |\n");
    out.push_str("|-------|--------|-------|--------|-------|---------|---------------|-----------|\n");
    for f in &report.frames {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {:.2} |\n",
            f.index,
            if f.packed { "yes" } else { "" },
            f.draw_calls,
            f.issued,
            f.instances_drawn,
            f.instances_skipped,
            f.state_changes,
            f.elapsed_ms,
        ));
    }
    if report.skipped_frames > 0 {
        out.push_str(&format!("\n{} frames skipped\n", report.skipped_frames));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> Report {
        Report {
            adapter: "test".to_string(),
            model: "model.ron".to_string(),
            status: "Success".to_string(),
            instances: 2,
            parts: 1,
            pack: Some(PackSummary {
                active_parts: 1,
                vertices: 4,
                indices: 14,
                materials: 0,
                bytes: 104,
                elapsed_ms: 0.5,
            }),
            frames: vec![FrameRecord {
                index: 0,
                packed: true,
                draw_calls: 4,
                issued: 4,
                instances_drawn: 2,
                instances_skipped: 0,
                state_changes: 3,
                elapsed_ms: 1.25,
            }],
            skipped_frames: 1,
        }
    }

    #[test]
    fn test_markdown_lists_frames() {
        let text = format_markdown(&report());
        assert!(text.contains("| 0 | yes | 4 | 4 | 2 | 0 | 3 | 1.25 |"));
        assert!(text.contains("Packed 1 parts: 4 vertices, 14 indices"));
        assert!(text.contains("1 frames skipped"));
    }

    #[test]
    fn test_report_json_roundtrip() {
        let json = serde_json::to_string(&report()).expect("serialize");
        let back: Report = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.frames.len(), 1);
        assert_eq!(back.pack.map(|p| p.bytes), Some(104));
    }
}
