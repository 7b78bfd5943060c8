#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use flact::prelude::*;

/// Value captured from inside a component render.
pub type Captured<T> = Rc<RefCell<Option<T>>>;

pub fn captured<T>() -> Captured<T> {
    Rc::new(RefCell::new(None))
}

pub fn take<T: Clone>(slot: &Captured<T>) -> T {
    slot.borrow().clone().expect("component has rendered")
}

pub struct App {
    pub runtime: Runtime<MemoryHost>,
    pub platform: Arc<ManualPlatform>,
    pub container: HostNode,
}

impl App {
    pub fn new() -> Self {
        Self::with_platform(ManualPlatform::new())
    }

    pub fn with_platform(platform: ManualPlatform) -> Self {
        let platform = Arc::new(platform);
        let runtime = Runtime::new(MemoryHost::new(), platform.clone());
        let container = runtime
            .with_host_mut(|host| host.create_element("main", Namespace::Html))
            .unwrap();
        Self {
            runtime,
            platform,
            container,
        }
    }

    pub fn mount(&self, view: VNode) {
        self.runtime.render(view, Some(self.container)).unwrap();
        self.runtime.run_until_idle();
    }

    pub fn html(&self) -> String {
        self.runtime.with_host(|host| host.inner_html(self.container))
    }

    pub fn text(&self) -> String {
        self.runtime.with_host(|host| host.text_content(self.container))
    }

    pub fn find(&self, tag: &str) -> HostNode {
        self.runtime
            .with_host(|host| host.find_by_tag(self.container, tag))
            .unwrap_or_else(|| panic!("no <{tag}> rendered"))
    }

    pub fn click(&self, node: HostNode) -> bool {
        self.runtime
            .with_host(|host| host.dispatch_event(node, &Event::new("click")))
    }

    pub fn settle(&self) -> usize {
        self.runtime.run_until_idle()
    }
}
