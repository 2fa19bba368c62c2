//! CSV report: the per-subject, per-action summary table

use crate::dashboard::DashboardView;
use crate::error::Result;
use std::io::Write;

pub const HEADER: [&str; 5] = ["id", "accion", "frames", "duracion_seg", "porcentaje"];

pub fn write<W: Write>(writer: &mut W, view: &DashboardView) -> Result<()> {
    let mut out = ::csv::Writer::from_writer(writer);
    out.write_record(HEADER)?;

    for r in &view.summary.rows {
        out.write_record([
            r.subject_id.to_string(),
            r.action.clone(),
            r.frame_count.to_string(),
            format!("{:.2}", r.duration_seconds),
            format!("{:.2}", r.percentage),
        ])?;
    }

    out.flush()?;
    Ok(())
}
