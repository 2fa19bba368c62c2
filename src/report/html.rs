//! HTML report generation with D3.js visualizations

use crate::dashboard::DashboardView;
use crate::error::Result;
use std::io::Write;

/// Stylesheet shared with the interactive UI.
pub const STYLE: &str = include_str!("dashboard.css");

/// Chart drawing shared with the interactive UI.
pub const CHARTS_JS: &str = include_str!("charts.js");

pub fn write<W: Write>(writer: &mut W, view: &DashboardView) -> Result<()> {
    let json_data = embed_json(view)?;
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M");
    let frames = view.selection.frames;

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herdscope · {title}</title>
    <script src="https://d3js.org/d3.v7.min.js"></script>
    <style>
{style}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <div class="logo">Herdscope</div>
            <div class="subtitle">{title} · frames {frame_min}–{frame_max} · generated {generated}</div>
        </div>

        <div class="stats" id="stats"></div>

        <div class="card">
            <div class="card-title">Filtered detections</div>
            <div id="data-table"></div>
        </div>

        <div class="card">
            <div class="card-title">Summary by subject and action</div>
            <div id="summary-table"></div>
        </div>

        <div class="charts">
            <div class="card">
                <div class="card-title">Frames per action and subject</div>
                <div id="bar-chart"></div>
            </div>
            <div class="card">
                <div class="card-title">Share of time per action</div>
                <div id="pie-chart"></div>
            </div>
        </div>

        <div class="card">
            <div class="card-title">Actions over time</div>
            <div id="timeline-chart"></div>
        </div>

        <div class="footer">Generated by Herdscope</div>
    </div>

    <div class="tooltip" id="tooltip"></div>

    <script>
{charts}
    const data = {json_data};
    renderView(data);
    </script>
</body>
</html>
"#,
        title = escape_html(&view.source),
        style = STYLE,
        charts = CHARTS_JS,
        frame_min = frames.min,
        frame_max = frames.max,
        generated = generated,
        json_data = json_data,
    )?;

    Ok(())
}

/// Serialize the view for a `<script>` block.
///
/// `</` is escaped so a label containing `</script>` cannot end the block.
pub fn embed_json(view: &DashboardView) -> Result<String> {
    Ok(serde_json::to_string(view)?.replace("</", "<\\/"))
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::render_with;
    use crate::filter::FilterParams;
    use crate::pipeline::Pipeline;

    fn html_for(csv: &str, name: &str) -> String {
        let ds = Pipeline::new().load_bytes(csv.as_bytes(), name).unwrap();
        let view = render_with(&ds, &FilterParams::default());
        let mut buf = Vec::new();
        write(&mut buf, &view).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ==========================================================================
    // PAGE STRUCTURE
    // ==========================================================================

    #[test]
    fn test_page_has_every_section() {
        let html = html_for("frame,id,x1,y1,x2,y2,accion\n0,1,1,1,2,2,pie\n", "t.csv");
        for id in ["stats", "data-table", "summary-table", "bar-chart", "pie-chart", "timeline-chart"] {
            assert!(html.contains(&format!("id=\"{}\"", id)), "missing #{}", id);
        }
        assert!(html.contains("renderView(data);"));
    }

    #[test]
    fn test_sections_in_presentation_order() {
        let html = html_for("frame,id,x1,y1,x2,y2,accion\n0,1,1,1,2,2,pie\n", "t.csv");
        let pos = |id: &str| html.find(&format!("id=\"{}\"", id)).unwrap();
        assert!(pos("data-table") < pos("summary-table"));
        assert!(pos("summary-table") < pos("bar-chart"));
        assert!(pos("bar-chart") < pos("pie-chart"));
        assert!(pos("pie-chart") < pos("timeline-chart"));
    }

    #[test]
    fn test_chart_functions_defined() {
        for f in ["function drawBarChart(", "function drawPieChart(", "function drawTimeline(", "function renderView("] {
            assert!(CHARTS_JS.contains(f), "charts.js should define {}", f);
        }
    }

    #[test]
    fn test_empty_view_draws_placeholders() {
        assert!(CHARTS_JS.contains("placeholder(el, 'No data')"));
        let html = html_for("frame,id,x1,y1,x2,y2,accion\n", "empty.csv");
        assert!(html.contains("\"rows\":[]"));
    }

    // ==========================================================================
    // ESCAPING
    // ==========================================================================

    #[test]
    fn test_script_tag_in_label_is_escaped() {
        let html = html_for(
            "frame,id,x1,y1,x2,y2,accion\n0,1,1,1,2,2,</script><b>x\n",
            "t.csv",
        );
        let script = html.split("const data = ").nth(1).unwrap();
        let data_line = script.lines().next().unwrap();
        assert!(!data_line.contains("</script>"));
        assert!(data_line.contains("<\\/script>"));
    }

    #[test]
    fn test_title_is_escaped() {
        let html = html_for("frame,id,x1,y1,x2,y2,accion\n", "<corral>.csv");
        assert!(html.contains("&lt;corral&gt;.csv"));
    }
}
