//! Properties Manager
//!
//! Owns the current selection and keeps a property sheet for it. Sheets are
//! built on tokio's blocking pool and come back through a channel; the owner
//! calls [`PropertiesManager::process_pending`] (or awaits
//! [`PropertiesManager::sync`]) to present them.
//!
//! Only a sheet whose generation matches the current selection is ever
//! presented. A selection change while a sheet is being built makes the
//! builder stop early, and anything it had already sent is discarded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::cancel::SelectionCounter;
use super::panel::{generate, NodeSnapshot, PropertiesStyle, PropertySheet};
use crate::config::PropertiesConfig;

pub struct PropertiesManager {
    runtime: Handle,
    style: PropertiesStyle,
    selection: Arc<Vec<NodeSnapshot>>,
    counter: SelectionCounter,

    sender: mpsc::UnboundedSender<PropertySheet>,
    receiver: mpsc::UnboundedReceiver<PropertySheet>,
    tasks: Vec<JoinHandle<()>>,

    /// Number of builders still running.
    active: Arc<AtomicUsize>,

    /// The last presented sheet, readable from any thread.
    presented: Arc<Mutex<Option<PropertySheet>>>,
}

impl PropertiesManager {
    /// Create a manager that spawns its builders on `runtime`.
    pub fn new(runtime: Handle, config: &PropertiesConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            runtime,
            style: config.style,
            selection: Arc::new(Vec::new()),
            counter: SelectionCounter::default(),
            sender,
            receiver,
            tasks: Vec::new(),
            active: Arc::new(AtomicUsize::new(0)),
            presented: Arc::new(Mutex::new(None)),
        }
    }

    pub fn style(&self) -> PropertiesStyle {
        self.style
    }

    /// Generation of the current selection.
    pub fn selection_id(&self) -> u32 {
        self.counter.current()
    }

    pub fn selection(&self) -> &[NodeSnapshot] {
        &self.selection
    }

    /// Whether any builder is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }

    /// Clone of the last presented sheet.
    pub fn presented(&self) -> Option<PropertySheet> {
        self.presented.lock().clone()
    }

    /// Shared handle to the presented sheet.
    pub fn presented_handle(&self) -> Arc<Mutex<Option<PropertySheet>>> {
        Arc::clone(&self.presented)
    }

    pub fn set_style(&mut self, style: PropertiesStyle) {
        self.style = style;
        self.create_properties();
    }

    /// Replace the selection and start building its sheet.
    pub fn set_selection(&mut self, selection: Vec<NodeSnapshot>) {
        self.selection = Arc::new(selection);
        self.create_properties();
    }

    fn create_properties(&mut self) {
        let token = self.counter.advance();
        self.tasks.retain(|task| !task.is_finished());

        if self.selection.is_empty() {
            self.present(PropertySheet::empty(token.id(), self.style));
            return;
        }

        debug!(
            selection_id = token.id(),
            nodes = self.selection.len(),
            "building property sheet"
        );

        let style = self.style;
        let selection = Arc::clone(&self.selection);
        let sender = self.sender.clone();
        let active = Arc::clone(&self.active);

        active.fetch_add(1, Ordering::AcqRel);
        let task = self.runtime.spawn_blocking(move || {
            match generate(style, &selection, &token) {
                Some(sheet) => {
                    // The receiver only goes away with the manager
                    let _ = sender.send(sheet);
                }
                None => trace!(selection_id = token.id(), "property sheet cancelled"),
            }
            active.fetch_sub(1, Ordering::AcqRel);
        });
        self.tasks.push(task);
    }

    /// Present the newest finished sheet for the current selection.
    ///
    /// Returns true if a sheet was presented.
    pub fn process_pending(&mut self) -> bool {
        let mut presented = false;
        while let Ok(sheet) = self.receiver.try_recv() {
            if sheet.selection_id == self.counter.current() {
                self.present(sheet);
                presented = true;
            } else {
                trace!(selection_id = sheet.selection_id, "discarding stale property sheet");
            }
        }
        presented
    }

    /// Wait for every running builder, then present what they produced.
    pub async fn sync(&mut self) -> bool {
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                warn!(%err, "property builder failed");
            }
        }
        self.process_pending()
    }

    fn present(&self, sheet: PropertySheet) {
        debug!(
            selection_id = sheet.selection_id,
            panels = sheet.panels.len(),
            "presenting property sheet"
        );
        *self.presented.lock() = Some(sheet);
    }
}
