// port.rs — Typed, sized dataflow endpoints
//
// An OutputPort owns a rewritable value cache: a node's `compute` is the only
// writer of its own caches, every other operation only reads them. An
// InputPort holds no values, just a PortElements view into upstream caches.
//
// Preconditions: values written to a port match its declared type and size.
// Postconditions: `set_output` replaces the cache wholesale (never appends).
// Failure modes: wrong value type → `TypeMismatch`; wrong length →
//                `InvalidArgument`.
// Side effects: interior mutation of output caches and the referenced flag.

use std::cell::{Cell, RefCell};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ModelError, Result};
use crate::id::{InputPortRef, NodeId, OutputPortRef};
use crate::model::Model;
use crate::port_elements::PortElements;

// ── Value types ─────────────────────────────────────────────────────────────

/// Value type tag carried by every port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    None,
    Boolean,
    Integer,
    BigInt,
    SmallReal,
    Real,
    Categorical,
}

impl PortType {
    pub fn name(self) -> &'static str {
        match self {
            PortType::None => "none",
            PortType::Boolean => "bool",
            PortType::Integer => "int",
            PortType::BigInt => "int64",
            PortType::SmallReal => "float",
            PortType::Real => "double",
            PortType::Categorical => "categorical",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime-typed value vector, one variant per concrete port value type.
#[derive(Debug, Clone, PartialEq)]
pub enum PortBuffer {
    Boolean(Vec<bool>),
    Integer(Vec<i32>),
    BigInt(Vec<i64>),
    SmallReal(Vec<f32>),
    Real(Vec<f64>),
}

impl PortBuffer {
    pub fn port_type(&self) -> PortType {
        match self {
            PortBuffer::Boolean(_) => PortType::Boolean,
            PortBuffer::Integer(_) => PortType::Integer,
            PortBuffer::BigInt(_) => PortType::BigInt,
            PortBuffer::SmallReal(_) => PortType::SmallReal,
            PortBuffer::Real(_) => PortType::Real,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PortBuffer::Boolean(v) => v.len(),
            PortBuffer::Integer(v) => v.len(),
            PortBuffer::BigInt(v) => v.len(),
            PortBuffer::SmallReal(v) => v.len(),
            PortBuffer::Real(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the contents as `T`, or report the actual type.
    pub fn as_slice<T: PortValue>(&self) -> Result<&[T]> {
        T::slice(self).ok_or_else(|| ModelError::mismatch(T::PORT_TYPE, self.port_type()))
    }
}

/// A concrete element type a port can carry. Implemented for exactly
/// `bool`, `i32`, `i64`, `f32`, and `f64`.
pub trait PortValue:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + Serialize + DeserializeOwned + 'static
{
    const PORT_TYPE: PortType;

    /// Name used in node type tags, e.g. `InputNode<double>`.
    const TYPE_NAME: &'static str;

    fn wrap(values: Vec<Self>) -> PortBuffer;

    fn slice(buffer: &PortBuffer) -> Option<&[Self]>;
}

macro_rules! impl_port_value {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl PortValue for $ty {
            const PORT_TYPE: PortType = PortType::$variant;
            const TYPE_NAME: &'static str = $name;

            fn wrap(values: Vec<Self>) -> PortBuffer {
                PortBuffer::$variant(values)
            }

            fn slice(buffer: &PortBuffer) -> Option<&[Self]> {
                match buffer {
                    PortBuffer::$variant(values) => Some(values.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_port_value!(bool, Boolean, "bool");
impl_port_value!(i32, Integer, "int");
impl_port_value!(i64, BigInt, "int64");
impl_port_value!(f32, SmallReal, "float");
impl_port_value!(f64, Real, "double");

/// Arithmetic over numeric port values. Integer ops wrap; integer division
/// by zero yields `None`.
pub trait Numeric: PortValue {
    fn plus(self, rhs: Self) -> Self;
    fn minus(self, rhs: Self) -> Self;
    fn times(self, rhs: Self) -> Self;
    fn divide(self, rhs: Self) -> Option<Self>;
    fn from_count(count: usize) -> Self;
}

macro_rules! impl_numeric_int {
    ($ty:ty) => {
        impl Numeric for $ty {
            fn plus(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn minus(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn times(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn divide(self, rhs: Self) -> Option<Self> {
                self.checked_div(rhs)
            }
            fn from_count(count: usize) -> Self {
                count as $ty
            }
        }
    };
}

macro_rules! impl_numeric_float {
    ($ty:ty) => {
        impl Numeric for $ty {
            fn plus(self, rhs: Self) -> Self {
                self + rhs
            }
            fn minus(self, rhs: Self) -> Self {
                self - rhs
            }
            fn times(self, rhs: Self) -> Self {
                self * rhs
            }
            fn divide(self, rhs: Self) -> Option<Self> {
                Some(self / rhs)
            }
            fn from_count(count: usize) -> Self {
                count as $ty
            }
        }
    };
}

impl_numeric_int!(i32);
impl_numeric_int!(i64);
impl_numeric_float!(f32);
impl_numeric_float!(f64);

// ── Ports ───────────────────────────────────────────────────────────────────

/// A produced value vector owned by one node.
#[derive(Debug)]
pub struct OutputPort {
    node: NodeId,
    index: usize,
    name: String,
    port_type: PortType,
    size: usize,
    cache: RefCell<PortBuffer>,
    referenced: Cell<bool>,
}

impl OutputPort {
    pub fn new<T: PortValue>(node: NodeId, index: usize, name: &str, size: usize) -> Self {
        OutputPort {
            node,
            index,
            name: name.to_string(),
            port_type: T::PORT_TYPE,
            size,
            cache: RefCell::new(T::wrap(vec![T::default(); size])),
            referenced: Cell::new(false),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn port_ref(&self) -> OutputPortRef {
        OutputPortRef::new(self.node, self.index)
    }

    /// True once some input port in the owning model has consumed this port.
    pub fn is_referenced(&self) -> bool {
        self.referenced.get()
    }

    pub(crate) fn mark_referenced(&self) {
        self.referenced.set(true);
    }

    /// Overwrite the cached value vector.
    pub fn set_output<T: PortValue>(&self, values: Vec<T>) -> Result<()> {
        if T::PORT_TYPE != self.port_type {
            return Err(ModelError::mismatch(self.port_type, T::PORT_TYPE));
        }
        if values.len() != self.size {
            return Err(ModelError::invalid(format!(
                "port '{}' of {} has size {}, got {} values",
                self.name,
                self.node,
                self.size,
                values.len()
            )));
        }
        *self.cache.borrow_mut() = T::wrap(values);
        Ok(())
    }

    /// Copy of the cached value vector.
    pub fn output<T: PortValue>(&self) -> Result<Vec<T>> {
        let cache = self.cache.borrow();
        Ok(cache.as_slice::<T>()?.to_vec())
    }

    /// Copy of the cache as a runtime-typed buffer.
    pub fn buffer(&self) -> PortBuffer {
        self.cache.borrow().clone()
    }

    /// Copy `count` cached values starting at `start` onto `out`.
    pub(crate) fn read_range<T: PortValue>(
        &self,
        start: usize,
        count: usize,
        out: &mut Vec<T>,
    ) -> Result<()> {
        let cache = self.cache.borrow();
        let values = cache.as_slice::<T>()?;
        let end = start
            .checked_add(count)
            .filter(|end| *end <= values.len())
            .ok_or_else(|| {
                ModelError::invalid(format!(
                    "range of {count} from {start} exceeds port {} of size {}",
                    self.port_ref(),
                    values.len()
                ))
            })?;
        out.extend_from_slice(&values[start..end]);
        Ok(())
    }
}

/// A consumer endpoint: a declared type plus a view of upstream elements.
#[derive(Debug, Clone)]
pub struct InputPort {
    node: NodeId,
    index: usize,
    name: String,
    port_type: PortType,
    elements: PortElements,
}

impl InputPort {
    pub fn new<T: PortValue>(node: NodeId, index: usize, name: &str, elements: PortElements) -> Self {
        InputPort {
            node,
            index,
            name: name.to_string(),
            port_type: T::PORT_TYPE,
            elements,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    pub fn size(&self) -> usize {
        self.elements.size()
    }

    pub fn port_ref(&self) -> InputPortRef {
        InputPortRef::new(self.node, self.index)
    }

    pub fn elements(&self) -> &PortElements {
        &self.elements
    }

    pub(crate) fn set_elements(&mut self, elements: PortElements) {
        self.elements = elements;
    }

    /// Owners of the referenced output ports, in first-reference order.
    pub fn parent_nodes(&self) -> Vec<NodeId> {
        self.elements.referenced_nodes()
    }

    /// Gather the current upstream values.
    pub fn values<T: PortValue>(&self, model: &Model) -> Result<Vec<T>> {
        if T::PORT_TYPE != self.port_type {
            return Err(ModelError::mismatch(self.port_type, T::PORT_TYPE));
        }
        model.values::<T>(&self.elements)
    }
}
