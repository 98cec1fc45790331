//! Terminal presentation

mod dashboard;
mod text_panel;

pub use dashboard::{panel_title, run_dashboard, DashboardOptions};
pub use text_panel::{panel_rows, render_panel, PanelRow};
