use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::Result;
use crate::model::Model;
use crate::node::{Node, NodeBase, NodeRole};
use crate::port::{InputPort, OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Host function a sink hands its values to on every compute.
pub type SinkCallback<T> = Rc<dyn Fn(&[T])>;

#[derive(Serialize, Deserialize)]
struct SinkFields {
    name: String,
}

fn copy_through<T: PortValue>(
    input: &InputPort,
    output: &OutputPort,
    callback: Option<&SinkCallback<T>>,
    model: &Model,
) -> Result<()> {
    let values = input.values::<T>(model)?;
    if let Some(callback) = callback {
        callback(&values);
    }
    output.set_output(values)
}

/// A side-effecting consumer. Sinks are kept by pruning even when no
/// declared output depends on them.
pub struct SinkNode<T: PortValue> {
    base: NodeBase,
    name: String,
    callback: Option<SinkCallback<T>>,
}

impl<T: PortValue> SinkNode<T> {
    pub fn new(input: PortElements, name: &str) -> Self {
        let size = input.size();
        let mut base = NodeBase::new();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        SinkNode {
            base,
            name: name.to_string(),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: SinkCallback<T>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }
}

impl<T: PortValue> fmt::Debug for SinkNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkNode")
            .field("base", &self.base)
            .field("name", &self.name)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl<T: PortValue> Node for SinkNode<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn type_name(&self) -> String {
        Self::archive_tag()
    }

    fn compute(&self, model: &Model) -> Result<()> {
        copy_through(self.input(), self.output(), self.callback.as_ref(), model)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let mut node = SinkNode::<T>::new(input, &self.name);
        node.callback = self.callback.clone();
        let elements = PortElements::from(transformer.add_node(node)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn role(&self) -> NodeRole {
        NodeRole::Sink
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(SinkFields {
            name: self.name.clone(),
        })?)
    }
}

impl<T: PortValue> ArchivableNode for SinkNode<T> {
    fn archive_tag() -> String {
        format!("SinkNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        let fields: SinkFields = archive.fields()?;
        Ok(SinkNode::new(context.input(archive, 0)?, &fields.name))
    }
}

/// An observation tap. Pruning keeps it only while the value it observes is
/// still needed by something else.
pub struct DebugSinkNode<T: PortValue> {
    base: NodeBase,
    label: String,
    callback: Option<SinkCallback<T>>,
}

impl<T: PortValue> DebugSinkNode<T> {
    pub fn new(input: PortElements, label: &str) -> Self {
        let size = input.size();
        let mut base = NodeBase::new();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        DebugSinkNode {
            base,
            label: label.to_string(),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: SinkCallback<T>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn input(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }
}

impl<T: PortValue> fmt::Debug for DebugSinkNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSinkNode")
            .field("base", &self.base)
            .field("label", &self.label)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct DebugSinkFields {
    label: String,
}

impl<T: PortValue> Node for DebugSinkNode<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn type_name(&self) -> String {
        Self::archive_tag()
    }

    fn compute(&self, model: &Model) -> Result<()> {
        copy_through(self.input(), self.output(), self.callback.as_ref(), model)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let mut node = DebugSinkNode::<T>::new(input, &self.label);
        node.callback = self.callback.clone();
        let elements = PortElements::from(transformer.add_node(node)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn role(&self) -> NodeRole {
        NodeRole::DebugSink
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(DebugSinkFields {
            label: self.label.clone(),
        })?)
    }
}

impl<T: PortValue> ArchivableNode for DebugSinkNode<T> {
    fn archive_tag() -> String {
        format!("DebugSinkNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        let fields: DebugSinkFields = archive.fields()?;
        Ok(DebugSinkNode::new(context.input(archive, 0)?, &fields.label))
    }
}
