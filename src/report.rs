use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets};

/// One refinement step of the iterated QR solve.
#[derive(Debug, Clone)]
pub struct RefinementReport {
    pub iteration: usize,
    pub residual_norm: f64,
    pub relative_residual: f64,
    pub correction_norm: f64,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

pub trait Reporter {
    fn on_iteration(&mut self, report: &RefinementReport);
    fn on_finish(&mut self) {}
}

pub struct StdoutReporter {
    rows: Vec<RefinementReport>,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }
}

impl Default for StdoutReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for StdoutReporter {
    fn on_iteration(&mut self, report: &RefinementReport) {
        self.rows.push(report.clone());
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if !log::log_enabled!(log::Level::Info) {
            println!();
        }
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("iter").set_alignment(CellAlignment::Right),
            Cell::new("residual").set_alignment(CellAlignment::Right),
            Cell::new("relative").set_alignment(CellAlignment::Right),
            Cell::new("correction").set_alignment(CellAlignment::Right),
        ]);
        for row in &self.rows {
            table.add_row(vec![
                Cell::new(row.iteration).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4e}", row.residual_norm)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4e}", row.relative_residual))
                    .set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.1e}", row.correction_norm))
                    .set_alignment(CellAlignment::Right),
            ]);
        }

        for line in table.to_string().lines() {
            emit_line(line);
        }
        self.rows.clear();
    }
}
