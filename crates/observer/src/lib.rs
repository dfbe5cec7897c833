//! Visibility trigger.
//!
//! Watches a set of marked page elements and fires the guest's visibility
//! callback exactly once per element the first time it intersects the
//! viewport. The embedder supplies element bounds (it owns layout); the
//! trigger owns the threshold/margin policy and the at-most-once guarantee.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use page::{Document, NodeId};

pub const DEFAULT_MARKER_CLASS: &str = "base-card";

const ATTR_ID: &str = "data-card-id";
const ATTR_NAME: &str = "data-card-name";
const ATTR_PATH: &str = "data-card-path";

/// Callbacks a running guest module exposes for card events. Implemented by
/// the bridge session; the trigger never holds the module instance itself.
pub trait CardCallbacks {
    /// Whether the guest registered a visibility callback at all. When it
    /// hasn't, firings are dropped rather than queued.
    fn visible_registered(&self) -> bool;

    fn card_visible(&mut self, id: &str, name: &str, path: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    fn expand(&self, margin: f64) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    fn intersection_area(&self, other: &Rect) -> f64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        (right - left).max(0.0) * (bottom - top).max(0.0)
    }
}

/// One element's position as reported by the embedder's layout pass.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionEntry {
    pub target: NodeId,
    pub bounds: Rect,
}

#[derive(Debug, Clone)]
pub struct ObserverOptions {
    pub marker_class: String,
    /// Minimum visible fraction of the element before the callback fires.
    pub threshold: f64,
    /// Viewport is expanded by this much on every side before testing.
    pub margin: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            threshold: 0.1,
            margin: 10.0,
        }
    }
}

pub struct VisibilityTrigger {
    page: Arc<Mutex<Document>>,
    viewport: Rect,
    options: ObserverOptions,
    observed: HashSet<NodeId>,
}

impl VisibilityTrigger {
    /// Enrolls every element currently carrying the marker class.
    pub fn new(page: Arc<Mutex<Document>>, viewport: Rect, options: ObserverOptions) -> Self {
        let observed = {
            let doc = page.lock().expect("page mutex poisoned");
            doc.elements_with_class(&options.marker_class)
                .into_iter()
                .collect()
        };
        Self {
            page,
            viewport,
            options,
            observed,
        }
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Enroll an element added after construction.
    pub fn observe(&mut self, id: NodeId) {
        self.observed.insert(id);
    }

    /// Feed one batch of layout reports. Each observed element crossing the
    /// visibility threshold leaves observation permanently, whether or not
    /// its callback ran or succeeded.
    pub fn report<C: CardCallbacks>(&mut self, sink: &mut C, entries: &[IntersectionEntry]) {
        let viewport = self.viewport.expand(self.options.margin);
        for entry in entries {
            if !self.observed.contains(&entry.target) {
                continue;
            }
            let area = entry.bounds.area();
            if area <= 0.0 {
                continue;
            }
            let ratio = viewport.intersection_area(&entry.bounds) / area;
            if ratio < self.options.threshold {
                continue;
            }

            // Unobserve before dispatch so a re-entrant report cannot fire twice.
            self.observed.remove(&entry.target);

            let attrs = self.card_attrs(entry.target);
            let Some((id, name, path)) = attrs else {
                tracing::warn!(node = entry.target.index(), "visible element no longer in page");
                continue;
            };

            if !sink.visible_registered() {
                tracing::warn!(card = %id, "visibility callback not registered yet; dropping event");
                continue;
            }
            if let Err(err) = sink.card_visible(&id, &name, &path) {
                tracing::warn!(card = %id, error = %err, "visibility callback failed");
            }
        }
    }

    fn card_attrs(&self, id: NodeId) -> Option<(String, String, String)> {
        let doc = self.page.lock().expect("page mutex poisoned");
        if !doc.contains(id) {
            return None;
        }
        let read = |name: &str| {
            doc.attribute(id, name)
                .ok()
                .flatten()
                .unwrap_or_default()
                .to_string()
        };
        Some((read(ATTR_ID), read(ATTR_NAME), read(ATTR_PATH)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        registered: bool,
        calls: Vec<(String, String, String)>,
        fail: bool,
    }

    impl CardCallbacks for Recorder {
        fn visible_registered(&self) -> bool {
            self.registered
        }

        fn card_visible(&mut self, id: &str, name: &str, path: &str) -> anyhow::Result<()> {
            self.calls.push((id.into(), name.into(), path.into()));
            if self.fail {
                anyhow::bail!("guest callback rejected the card");
            }
            Ok(())
        }
    }

    fn page_with_card(id: &str, name: &str, path: &str) -> (Arc<Mutex<Document>>, NodeId) {
        let mut doc = Document::new();
        let card = doc.create_element("article").unwrap();
        doc.set_attribute(card, "class", DEFAULT_MARKER_CLASS).unwrap();
        doc.set_attribute(card, ATTR_ID, id).unwrap();
        doc.set_attribute(card, ATTR_NAME, name).unwrap();
        doc.set_attribute(card, ATTR_PATH, path).unwrap();
        let body = doc.body();
        doc.append_child(body, card).unwrap();
        (Arc::new(Mutex::new(doc)), card)
    }

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 1280.0, 800.0)
    }

    fn fully_visible(target: NodeId) -> IntersectionEntry {
        IntersectionEntry {
            target,
            bounds: Rect::new(100.0, 100.0, 300.0, 200.0),
        }
    }

    #[test]
    fn fires_once_with_card_attributes() {
        let (page, card) = page_with_card("42", "Intro", "/intro");
        let mut trigger =
            VisibilityTrigger::new(page, viewport(), ObserverOptions::default());
        let mut sink = Recorder {
            registered: true,
            ..Recorder::default()
        };
        trigger.report(&mut sink, &[fully_visible(card)]);
        assert_eq!(
            sink.calls,
            vec![("42".into(), "Intro".into(), "/intro".into())]
        );
        assert_eq!(trigger.observed_count(), 0);
    }

    #[test]
    fn reentering_viewport_does_not_refire() {
        let (page, card) = page_with_card("1", "a", "/a");
        let mut trigger =
            VisibilityTrigger::new(page, viewport(), ObserverOptions::default());
        let mut sink = Recorder {
            registered: true,
            ..Recorder::default()
        };
        trigger.report(&mut sink, &[fully_visible(card)]);
        trigger.report(&mut sink, &[fully_visible(card)]);
        assert_eq!(sink.calls.len(), 1);
    }

    #[test]
    fn below_threshold_stays_observed() {
        let (page, card) = page_with_card("1", "a", "/a");
        let mut trigger =
            VisibilityTrigger::new(page, viewport(), ObserverOptions::default());
        let mut sink = Recorder {
            registered: true,
            ..Recorder::default()
        };
        // 5% of the element inside the (expanded) viewport
        let barely = IntersectionEntry {
            target: card,
            bounds: Rect::new(1280.0 - 10.0, 0.0, 400.0, 200.0),
        };
        trigger.report(&mut sink, &[barely]);
        assert!(sink.calls.is_empty());
        assert_eq!(trigger.observed_count(), 1);
    }

    #[test]
    fn margin_admits_elements_just_outside() {
        let (page, card) = page_with_card("1", "a", "/a");
        let mut trigger =
            VisibilityTrigger::new(page, viewport(), ObserverOptions::default());
        let mut sink = Recorder {
            registered: true,
            ..Recorder::default()
        };
        // fully outside the viewport, but a 10px strip falls inside the margin
        let edge = IntersectionEntry {
            target: card,
            bounds: Rect::new(0.0, 800.0, 300.0, 50.0),
        };
        trigger.report(&mut sink, &[edge]);
        assert_eq!(sink.calls.len(), 1);
    }

    #[test]
    fn unregistered_callback_drops_event_but_unobserves() {
        let (page, card) = page_with_card("1", "a", "/a");
        let mut trigger =
            VisibilityTrigger::new(page, viewport(), ObserverOptions::default());
        let mut sink = Recorder::default();
        trigger.report(&mut sink, &[fully_visible(card)]);
        assert!(sink.calls.is_empty());
        assert_eq!(trigger.observed_count(), 0);
        // registering later does not resurrect the dropped event
        sink.registered = true;
        trigger.report(&mut sink, &[fully_visible(card)]);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn callback_failure_still_unobserves() {
        let (page, card) = page_with_card("1", "a", "/a");
        let mut trigger =
            VisibilityTrigger::new(page, viewport(), ObserverOptions::default());
        let mut sink = Recorder {
            registered: true,
            fail: true,
            ..Recorder::default()
        };
        trigger.report(&mut sink, &[fully_visible(card)]);
        assert_eq!(sink.calls.len(), 1);
        assert_eq!(trigger.observed_count(), 0);
    }

    #[test]
    fn unmarked_elements_are_not_enrolled() {
        let mut doc = Document::new();
        let plain = doc.create_element("div").unwrap();
        let body = doc.body();
        doc.append_child(body, plain).unwrap();
        let trigger = VisibilityTrigger::new(
            Arc::new(Mutex::new(doc)),
            viewport(),
            ObserverOptions::default(),
        );
        assert_eq!(trigger.observed_count(), 0);
    }
}
