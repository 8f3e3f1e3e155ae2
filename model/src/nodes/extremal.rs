use std::marker::PhantomData;

use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::{Node, NodeBase};
use crate::port::{InputPort, OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Which extreme an ExtremalValueNode selects.
pub trait Extremum: std::fmt::Debug + 'static {
    const NAME: &'static str;

    /// True if `candidate` strictly beats `best`.
    fn beats<T: PartialOrd>(candidate: T, best: T) -> bool;
}

#[derive(Debug)]
pub struct ArgMin;

#[derive(Debug)]
pub struct ArgMax;

impl Extremum for ArgMin {
    const NAME: &'static str = "ArgMinNode";

    fn beats<T: PartialOrd>(candidate: T, best: T) -> bool {
        candidate < best
    }
}

impl Extremum for ArgMax {
    const NAME: &'static str = "ArgMaxNode";

    fn beats<T: PartialOrd>(candidate: T, best: T) -> bool {
        candidate > best
    }
}

/// Smallest or largest element and its index. Ties go to the first index.
#[derive(Debug)]
pub struct ExtremalValueNode<T: PortValue, K: Extremum> {
    base: NodeBase,
    _kind: PhantomData<(T, K)>,
}

pub type ArgMinNode<T> = ExtremalValueNode<T, ArgMin>;
pub type ArgMaxNode<T> = ExtremalValueNode<T, ArgMax>;

impl<T: PortValue, K: Extremum> ExtremalValueNode<T, K> {
    pub fn new(input: PortElements) -> Self {
        let mut base = NodeBase::new();
        base.add_input::<T>("input", input);
        base.add_output::<T>("val", 1);
        base.add_output::<i32>("argVal", 1);
        ExtremalValueNode {
            base,
            _kind: PhantomData,
        }
    }

    pub fn input(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn val(&self) -> &OutputPort {
        self.base.output(0)
    }

    pub fn arg_val(&self) -> &OutputPort {
        self.base.output(1)
    }
}

impl<T: PortValue, K: Extremum> Node for ExtremalValueNode<T, K> {
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
        let values = self.input().values::<T>(model)?;
        let mut best: Option<(usize, T)> = None;
        for (index, value) in values.into_iter().enumerate() {
            match best {
                Some((_, current)) if !K::beats(value, current) => {}
                _ => best = Some((index, value)),
            }
        }
        let (index, value) =
            best.ok_or_else(|| ModelError::invalid(format!("{} over empty input", K::NAME)))?;
        self.val().set_output(vec![value])?;
        self.arg_val().set_output(vec![index as i32])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let node = transformer.add_node(ExtremalValueNode::<T, K>::new(input))?;
        let (val, arg_val) = (PortElements::from(node.val()), PortElements::from(node.arg_val()));
        transformer.map_node_output(self.val(), &val)?;
        transformer.map_node_output(self.arg_val(), &arg_val)
    }

    fn is_compilable(&self) -> bool {
        true
    }
}

impl<T: PortValue, K: Extremum> ArchivableNode for ExtremalValueNode<T, K> {
    fn archive_tag() -> String {
        format!("{}<{}>", K::NAME, T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        Ok(ExtremalValueNode::new(context.input(archive, 0)?))
    }
}
