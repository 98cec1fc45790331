//! Plain-text rendering of the air-quality panel

use crate::core::{MetricStore, PollStatus};
use openair_core::{MetricKind, Reading, SeverityBand, MISSING_VALUE_PLACEHOLDER};
use openair_types::Color;

/// One metric row as shown on the panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub kind: MetricKind,
    pub label: &'static str,
    pub value: String,
    /// `None` until the metric has been read
    pub band: Option<SeverityBand>,
}

impl PanelRow {
    fn new(kind: MetricKind, reading: Option<Reading>) -> Self {
        match reading {
            Some(reading) => Self {
                kind,
                label: kind.label(),
                value: reading.formatted,
                band: Some(reading.band),
            },
            None => Self {
                kind,
                label: kind.label(),
                value: MISSING_VALUE_PLACEHOLDER.to_string(),
                band: None,
            },
        }
    }
}

/// Visible rows in display order
pub fn panel_rows(store: &MetricStore) -> Vec<PanelRow> {
    store
        .visible_kinds()
        .into_iter()
        .map(|kind| PanelRow::new(kind, store.get(kind)))
        .collect()
}

/// Lines for a terminal front end: title, status, then one per visible metric
///
/// With `colored` set, read rows get a 24-bit ANSI background in their band
/// colour.
pub fn render_panel(
    title: &str,
    status: PollStatus,
    store: &MetricStore,
    colored: bool,
) -> Vec<String> {
    let mut lines = vec![title.to_string(), format!("  {}", status.message())];

    for row in panel_rows(store) {
        let band = row.band.map(|band| band.label()).unwrap_or_default();
        let text = format!("  {:<9}{:>12}  {}", row.label, row.value, band);
        let line = match row.band {
            Some(band) if colored => paint(&text, band.color()),
            _ => text.trim_end().to_string(),
        };
        lines.push(line);
    }

    lines
}

fn paint(text: &str, color: Color) -> String {
    // Terminals have no alpha, blend onto black instead
    let (r, g, b, a) = color.to_rgba8();
    let blend = |c: u8| (c as u16 * a as u16 / 255) as u8;
    format!(
        "\x1b[48;2;{};{};{}m{}\x1b[0m",
        blend(r),
        blend(g),
        blend(b),
        text.trim_end()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(readings: &[(MetricKind, f64, &str, SeverityBand)]) -> MetricStore {
        let store = MetricStore::new();
        for (kind, raw, formatted, band) in readings {
            store.update(Reading::new(*kind, *raw, formatted.to_string(), *band, "acc"));
        }
        store
    }

    #[test]
    fn test_unset_metrics_show_placeholder() {
        let store = store_with(&[(MetricKind::Co2, 612.0, "612 ppm", SeverityBand::Normal)]);
        let lines = render_panel("Living Room", PollStatus::Polling, &store, false);

        assert_eq!(lines.len(), 2 + MetricKind::ALL.len());
        assert_eq!(lines[0], "Living Room");
        assert_eq!(lines[1], "  Live");
        assert_eq!(lines[2], "  CO2           612 ppm  normal");
        assert_eq!(lines[3], "  PM2.5              --");
    }

    #[test]
    fn test_hidden_metrics_are_not_rendered() {
        let store = store_with(&[(MetricKind::Pm2_5, 60.0, "60 µg/m³", SeverityBand::Critical)]);
        store.set_visible(MetricKind::Pm2_5, false);
        store.set_visible(MetricKind::Humidity, false);

        let rows = panel_rows(&store);
        let kinds: Vec<_> = rows.iter().map(|row| row.kind).collect();
        assert_eq!(
            kinds,
            vec![MetricKind::Co2, MetricKind::Voc, MetricKind::No2, MetricKind::Temperature]
        );
        assert!(rows.iter().all(|row| row.band.is_none()));
    }

    #[test]
    fn test_status_line_follows_poll_status() {
        let store = MetricStore::new();
        let lines = render_panel(
            "No Accessory Selected",
            PollStatus::NoAccessorySelected,
            &store,
            false,
        );
        assert_eq!(lines[1], "  No Accessory Selected");
    }

    #[test]
    fn test_colored_rows_use_band_color() {
        let store = store_with(&[(MetricKind::Voc, 120.0, "120 µg/m³", SeverityBand::Critical)]);
        let lines = render_panel("Office", PollStatus::Polling, &store, true);

        let voc = &lines[4];
        let (_, _, _, alpha) = SeverityBand::Critical.color().to_rgba8();
        assert!(voc.starts_with(&format!("\x1b[48;2;{};", alpha)), "{:?}", voc);
        assert!(voc.contains("TVOC"));
        assert!(voc.ends_with("\x1b[0m"));
        // Unset rows stay plain
        assert_eq!(lines[2], "  CO2                --");
    }
}
