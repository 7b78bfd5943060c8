//! Property update rule
//!
//! Synchronizes one host node from an old property bag to a new one, visiting
//! the union of property names:
//!
//! | Property | Effect |
//! |----------|--------|
//! | `children` | skipped |
//! | unchanged value | skipped |
//! | `style` | diffed key by key, dropped keys cleared to `""` |
//! | `on<event>` | old listener unbound, new one bound if it is a listener |
//! | known field (HTML or text node) | assigned as a field |
//! | anything else | attribute set when truthy, removed otherwise |
//!
//! Text nodes never receive attributes.

use tracing::trace;

use super::{Host, HostNode, Namespace};
use crate::error::HostResult;
use crate::props::{PropValue, Props, Style};

const CHILDREN: &str = "children";
const STYLE: &str = "style";
const LISTENER_PREFIX: &str = "on";

/// How the target node interprets properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropMode {
    pub namespace: Namespace,
    pub is_text: bool,
}

impl PropMode {
    pub const HTML: Self = Self {
        namespace: Namespace::Html,
        is_text: false,
    };

    pub const TEXT: Self = Self {
        namespace: Namespace::Html,
        is_text: true,
    };

    pub fn element(namespace: Namespace) -> Self {
        Self {
            namespace,
            is_text: false,
        }
    }
}

/// Apply the difference between `old` and `new` to `node`.
///
/// With `old = None` every property of `new` is applied.
pub fn apply_props<H: Host + ?Sized>(
    host: &mut H,
    node: HostNode,
    old: Option<&Props>,
    new: &Props,
    mode: PropMode,
) -> HostResult<()> {
    // Dropped names first: `onclick` and `onClick` bind the same event.
    if let Some(old) = old {
        for (name, prev) in old.iter() {
            if !new.contains(name) {
                apply_one(host, node, name, Some(prev), None, mode)?;
            }
        }
    }
    for (name, value) in new.iter() {
        let prev = old.and_then(|o| o.get(name));
        if prev == Some(value) {
            continue;
        }
        apply_one(host, node, name, prev, Some(value), mode)?;
    }
    Ok(())
}

fn apply_one<H: Host + ?Sized>(
    host: &mut H,
    node: HostNode,
    name: &str,
    prev: Option<&PropValue>,
    next: Option<&PropValue>,
    mode: PropMode,
) -> HostResult<()> {
    if name == CHILDREN {
        return Ok(());
    }

    if name == STYLE {
        let empty = Style::new();
        let prev = prev.and_then(PropValue::as_style).unwrap_or(&empty);
        let next = next.and_then(PropValue::as_style).unwrap_or(&empty);
        return apply_style(host, node, prev, next);
    }

    if let Some(event) = listener_event(name) {
        if prev.is_some_and(PropValue::is_listener) {
            host.remove_listener(node, &event)?;
        }
        if let Some(PropValue::Listener(listener)) = next {
            host.set_listener(node, &event, listener.clone())?;
        }
        return Ok(());
    }

    let as_field = mode.is_text || mode.namespace == Namespace::Html;
    if as_field && host.has_field(node, name) {
        trace!(?node, name, "set field");
        return match next {
            Some(value) => host.set_field(node, name, value),
            None => host.set_field(node, name, &PropValue::Text(Default::default())),
        };
    }
    if mode.is_text {
        return Ok(());
    }

    match next {
        Some(value) if value.is_truthy() => {
            host.set_attribute(node, name, &value.to_attr_string())
        }
        _ => host.remove_attribute(node, name),
    }
}

fn apply_style<H: Host + ?Sized>(
    host: &mut H,
    node: HostNode,
    prev: &Style,
    next: &Style,
) -> HostResult<()> {
    for (property, _) in prev.iter() {
        if next.get(property).is_none() {
            host.set_style(node, property, "")?;
        }
    }
    for (property, value) in next.iter() {
        if prev.get(property) != Some(value) {
            host.set_style(node, property, value)?;
        }
    }
    Ok(())
}

/// `onClick` -> `click`
pub(crate) fn listener_event(name: &str) -> Option<String> {
    let rest = name.strip_prefix(LISTENER_PREFIX)?;
    (!rest.is_empty()).then(|| rest.to_ascii_lowercase())
}
