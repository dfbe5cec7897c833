//! A running guest instance and the callbacks it registered.

use wasmtime::{AsContextMut, Func, Instance, Store};

use crate::codec;
use crate::error::BridgeError;
use crate::memory::MemoryViews;
use crate::state::HostState;

pub const CALLBACK_CARD_VISIBLE: &str = "on_card_visible";
pub const CALLBACK_CARD_CLICK: &str = "on_card_click";
pub const CALLBACK_TAG_CLICK: &str = "on_tag_click";

/// Guest-provided entry points, resolved once after instantiation and
/// handed to DOM-facing components instead of ambient globals. Slots stay
/// empty when the guest does not export the callback; they are never
/// re-resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallbackRegistry {
    pub card_visible: Option<Func>,
    pub card_click: Option<Func>,
    pub tag_click: Option<Func>,
}

impl CallbackRegistry {
    pub fn resolve(mut store: impl AsContextMut, instance: &Instance) -> Self {
        let mut lookup = |name: &str| {
            let func = instance.get_func(&mut store, name);
            if func.is_none() {
                tracing::debug!(callback = name, "guest does not export callback");
            }
            func
        };
        Self {
            card_visible: lookup(CALLBACK_CARD_VISIBLE),
            card_click: lookup(CALLBACK_CARD_CLICK),
            tag_click: lookup(CALLBACK_TAG_CLICK),
        }
    }
}

/// A `Running` guest module: its store, instance and registered callbacks.
pub struct Session {
    pub store: Store<HostState>,
    pub instance: Instance,
    pub callbacks: CallbackRegistry,
}

impl Session {
    pub fn host(&self) -> &HostState {
        self.store.data()
    }

    pub fn console(&self) -> &[String] {
        &self.store.data().console
    }

    pub fn dispatch_card_visible(
        &mut self,
        id: &str,
        name: &str,
        path: &str,
    ) -> Result<(), BridgeError> {
        let func = self
            .callbacks
            .card_visible
            .ok_or(BridgeError::MissingExport(CALLBACK_CARD_VISIBLE))?;
        self.call_with_strings(func, &[id, name, path])
    }

    pub fn dispatch_card_click(
        &mut self,
        id: &str,
        name: &str,
        path: &str,
    ) -> Result<(), BridgeError> {
        let func = self
            .callbacks
            .card_click
            .ok_or(BridgeError::MissingExport(CALLBACK_CARD_CLICK))?;
        self.call_with_strings(func, &[id, name, path])
    }

    pub fn dispatch_tag_click(&mut self, tag: &str) -> Result<(), BridgeError> {
        let func = self
            .callbacks
            .tag_click
            .ok_or(BridgeError::MissingExport(CALLBACK_TAG_CLICK))?;
        self.call_with_strings(func, &[tag])
    }

    /// Encode each argument into guest memory and invoke the callback with
    /// the flattened `(ptr, len)` pairs. The byte ranges stay valid across
    /// the loop because only the guest allocator runs between encodes.
    fn call_with_strings(&mut self, func: Func, args: &[&str]) -> Result<(), BridgeError> {
        let mut views = self.views()?;
        let mut ranges = Vec::with_capacity(args.len());
        for arg in args {
            ranges.push(codec::encode(&mut views, &mut self.store, arg)?);
        }
        self.store.data_mut().views = Some(views);
        match *ranges.as_slice() {
            [a] => {
                let func = func
                    .typed::<(u32, u32), ()>(&self.store)
                    .map_err(|_| BridgeError::MissingExport("string callback"))?;
                func.call(&mut self.store, (a.ptr, a.len))?;
            }
            [a, b, c] => {
                let func = func
                    .typed::<(u32, u32, u32, u32, u32, u32), ()>(&self.store)
                    .map_err(|_| BridgeError::MissingExport("card callback"))?;
                func.call(
                    &mut self.store,
                    (a.ptr, a.len, b.ptr, b.len, c.ptr, c.len),
                )?;
            }
            _ => unreachable!("callback arity is fixed at the wire contract"),
        }
        Ok(())
    }

    fn views(&mut self) -> Result<MemoryViews, BridgeError> {
        self.store
            .data()
            .views
            .ok_or(BridgeError::MissingExport(crate::memory::EXPORT_MEMORY))
    }
}

impl observer::CardCallbacks for Session {
    fn visible_registered(&self) -> bool {
        self.callbacks.card_visible.is_some()
    }

    fn card_visible(&mut self, id: &str, name: &str, path: &str) -> anyhow::Result<()> {
        self.dispatch_card_visible(id, name, path)
            .map_err(anyhow::Error::from)
    }
}
