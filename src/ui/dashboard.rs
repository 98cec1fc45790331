//! Redraw loop feeding the text panel to an output stream

use super::text_panel::render_panel;
use crate::core::{AccessorySelection, MetricStore, PollLoop};
use anyhow::Result;
use log::debug;
use openair_core::NO_ACCESSORY_SELECTED;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// Quiet period after a change before the panel is redrawn
const RENDER_SETTLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Return after this many renders
    pub max_renders: Option<u64>,
    pub colored: bool,
    /// Redraw at least this often, even when nothing changed
    pub refresh: Duration,
}

/// Panel title for the current selection
pub fn panel_title(selection: &AccessorySelection) -> String {
    match selection.current() {
        Some(_) => selection.accessory_label(),
        None => NO_ACCESSORY_SELECTED.to_string(),
    }
}

/// Redraw the panel on store changes, status changes and every refresh
/// period until `shutdown` resolves or `max_renders` is reached
///
/// Returns the number of renders.
pub async fn run_dashboard<W, S>(
    poll_loop: &PollLoop,
    selection: &AccessorySelection,
    store: &MetricStore,
    options: &DashboardOptions,
    out: &mut W,
    shutdown: S,
) -> Result<u64>
where
    W: Write,
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let store_tx = tx.clone();
    // Send errors only mean the loop below has already returned
    let store_token = store.subscribe(move |_event| {
        let _ = store_tx.send(());
    });
    let status_token = poll_loop.subscribe_status(move |_status| {
        let _ = tx.send(());
    });

    let mut refresh =
        tokio::time::interval_at(Instant::now() + RENDER_SETTLE, options.refresh);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut renders = 0u64;
    let result: Result<()> = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            changed = rx.recv() => {
                if changed.is_none() {
                    break Ok(());
                }
                // Let the rest of the tick's reads land before drawing
                tokio::time::sleep(RENDER_SETTLE).await;
                while rx.try_recv().is_ok() {}
            }
            _ = refresh.tick() => {}
        }

        let title = panel_title(selection);
        let lines = render_panel(&title, poll_loop.status(), store, options.colored);
        if let Err(e) = lines
            .iter()
            .try_for_each(|line| writeln!(out, "{}", line))
            .and_then(|()| writeln!(out))
        {
            break Err(e.into());
        }

        renders += 1;
        if options.max_renders.is_some_and(|max| renders >= max) {
            debug!("Rendered {} times, stopping", renders);
            break Ok(());
        }
    };

    store.unsubscribe(store_token);
    poll_loop.unsubscribe_status(status_token);
    result.map(|()| renders)
}
