use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::{Node, NodeBase};
use crate::port::{InputPort, Numeric, OutputPort};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Element-wise arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOperation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperation {
    fn apply<T: Numeric>(self, a: T, b: T) -> Result<T> {
        match self {
            BinaryOperation::Add => Ok(a.plus(b)),
            BinaryOperation::Subtract => Ok(a.minus(b)),
            BinaryOperation::Multiply => Ok(a.times(b)),
            BinaryOperation::Divide => a
                .divide(b)
                .ok_or_else(|| ModelError::invalid("integer division by zero")),
        }
    }
}

impl fmt::Display for BinaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOperation::Add => "add",
            BinaryOperation::Subtract => "subtract",
            BinaryOperation::Multiply => "multiply",
            BinaryOperation::Divide => "divide",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize)]
struct OperationFields {
    operation: BinaryOperation,
}

/// `input1 <op> input2`, element by element. Both inputs have one size.
#[derive(Debug)]
pub struct BinaryOperationNode<T: Numeric> {
    base: NodeBase,
    operation: BinaryOperation,
    _value: std::marker::PhantomData<T>,
}

impl<T: Numeric> BinaryOperationNode<T> {
    pub fn new(input1: PortElements, input2: PortElements, operation: BinaryOperation) -> Result<Self> {
        if input1.size() != input2.size() {
            return Err(ModelError::invalid(format!(
                "{operation} operands differ in size: {} vs {}",
                input1.size(),
                input2.size()
            )));
        }
        let size = input1.size();
        let mut base = NodeBase::new();
        base.add_input::<T>("input1", input1);
        base.add_input::<T>("input2", input2);
        base.add_output::<T>("output", size);
        Ok(BinaryOperationNode {
            base,
            operation,
            _value: std::marker::PhantomData,
        })
    }

    pub fn input1(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn input2(&self) -> &InputPort {
        self.base.input(1)
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }

    pub fn operation(&self) -> BinaryOperation {
        self.operation
    }
}

impl<T: Numeric> Node for BinaryOperationNode<T> {
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
        let a = self.input1().values::<T>(model)?;
        let b = self.input2().values::<T>(model)?;
        let result = a
            .into_iter()
            .zip(b)
            .map(|(x, y)| self.operation.apply(x, y))
            .collect::<Result<Vec<T>>>()?;
        self.output().set_output(result)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input1 = transformer.corresponding_inputs(self.input1())?;
        let input2 = transformer.corresponding_inputs(self.input2())?;
        let node = BinaryOperationNode::<T>::new(input1, input2, self.operation)?;
        let elements = PortElements::from(transformer.add_node(node)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(OperationFields {
            operation: self.operation,
        })?)
    }
}

impl<T: Numeric> ArchivableNode for BinaryOperationNode<T> {
    fn archive_tag() -> String {
        format!("BinaryOperationNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        let fields: OperationFields = archive.fields()?;
        BinaryOperationNode::new(
            context.input(archive, 0)?,
            context.input(archive, 1)?,
            fields.operation,
        )
    }
}
