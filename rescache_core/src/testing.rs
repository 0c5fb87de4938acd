//! Resource types used by the unit tests.

use std::cell::RefCell;

use anyhow::bail;
use serde_json::Value;

use crate::context::{LoadContext, PendingLoad};
use crate::descriptor::PayloadSource;
use crate::handle::Handle;
use crate::resource::{Complexity, Resource};

fn inline<'a>(source: &'a PayloadSource, class: &str) -> anyhow::Result<&'a Value> {
    match source {
        PayloadSource::Inline(data) => Ok(data),
        other => bail!("{class} only loads inline data, got {}", other.source_type()),
    }
}

fn names(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Self-contained resource: `{"Bytes": n, "Fail": bool}`.
#[derive(Default)]
pub(crate) struct Leaf {
    pub(crate) bytes: usize,
}

impl Resource for Leaf {
    const CLASS_LABEL: &'static str = "Leaf";
    const STORE: &'static str = "Leaves";
    const COMPLEXITY: Complexity = Complexity::None;

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        _ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let data = inline(source, Self::CLASS_LABEL)?;
        if data.get("Fail").and_then(Value::as_bool) == Some(true) {
            bail!("leaf data is marked as corrupt");
        }
        self.bytes = data.get("Bytes").and_then(Value::as_u64).unwrap_or(0) as usize;
        Ok(())
    }

    fn memory_occupied(&self) -> usize {
        self.bytes
    }
}

/// Resource depending on leaves and other nodes:
/// `{"Leaves": [..], "Nodes": [..], "Reject": bool}`.
#[derive(Default)]
pub(crate) struct Node {
    pub(crate) leaves: Vec<Handle<Leaf>>,
    pub(crate) nodes: Vec<Handle<Node>>,
    pub(crate) reject_validation: bool,
}

impl Resource for Node {
    const CLASS_LABEL: &'static str = "Node";
    const STORE: &'static str = "Nodes";
    const COMPLEXITY: Complexity = Complexity::Complex;

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let data = inline(source, Self::CLASS_LABEL)?;
        self.reject_validation = data.get("Reject").and_then(Value::as_bool).unwrap_or(false);
        for name in names(data, "Leaves") {
            self.leaves.push(ctx.depend_on::<Leaf>(&name)?);
        }
        for name in names(data, "Nodes") {
            self.nodes.push(ctx.depend_on::<Node>(&name)?);
        }
        Ok(())
    }

    fn on_dependencies_loaded(&mut self) -> anyhow::Result<()> {
        if self.reject_validation {
            bail!("node rejected its dependencies");
        }
        Ok(())
    }
}

thread_local! {
    static PARKED: RefCell<Vec<PendingLoad<Streamed>>> = const { RefCell::new(Vec::new()) };
}

/// Takes the pending loads parked by [`Streamed`] on this thread.
pub(crate) fn take_parked() -> Vec<PendingLoad<Streamed>> {
    PARKED.with(|parked| std::mem::take(&mut *parked.borrow_mut()))
}

/// Resource whose payload always arrives later through a [`PendingLoad`].
#[derive(Default)]
pub(crate) struct Streamed {
    pub(crate) frames: usize,
}

impl Resource for Streamed {
    const CLASS_LABEL: &'static str = "Streamed";
    const STORE: &'static str = "Streams";
    const COMPLEXITY: Complexity = Complexity::None;

    fn begin_load(
        &mut self,
        _source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let pending = ctx.defer();
        PARKED.with(|parked| parked.borrow_mut().push(pending));
        Ok(())
    }
}
