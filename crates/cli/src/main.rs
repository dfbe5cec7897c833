mod config;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use bridge::ModuleHost;
use observer::{IntersectionEntry, Rect, VisibilityTrigger};
use page::Document;
use tracing::info;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cwd = std::env::current_dir().context("cannot resolve working directory")?;
    let config = Config::load(&cwd)?;

    let page = Arc::new(Mutex::new(Document::new()));
    let mut host = ModuleHost::new()?;
    let Some(mut session) = host.start(&config.module, page.clone()).await else {
        anyhow::bail!("guest module failed to start; see log for details");
    };

    let mut trigger = VisibilityTrigger::new(
        page.clone(),
        config.viewport_rect(),
        config.observer_options(),
    );
    info!(cards = trigger.observed_count(), "observing marked elements");

    // One synthetic layout pass: stack the cards down the page and scroll
    // them all through the viewport once.
    let entries: Vec<IntersectionEntry> = {
        let doc = page.lock().expect("page mutex poisoned");
        doc.elements_with_class(&config.marker_class)
            .into_iter()
            .enumerate()
            .map(|(i, target)| IntersectionEntry {
                target,
                bounds: Rect::new(40.0, 40.0 + 220.0 * i as f64, 480.0, 200.0),
            })
            .collect()
    };
    trigger.report(&mut session, &entries);

    for line in session.console() {
        println!("guest: {line}");
    }
    Ok(())
}
