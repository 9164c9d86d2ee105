//! Per-node mutable values typed by a [`PregelSchema`].

use crate::{
    error::{Error, Result},
    memory::{MemoryEstimation, MemoryRange},
    schema::{PregelSchema, ValueType},
    types::NodeId,
};
use rayon::prelude::*;
use std::{
    mem::size_of,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        PoisonError, RwLock,
    },
};

/// Column-oriented value storage, one column per schema element.
///
/// ```text
///            node 0   node 1   node 2          node n-1
///          +--------+--------+--------+     +--------+
/// rank     |  f64   |  f64   |  f64   | ... |  f64   |   DOUBLE: AtomicU64 bits
///          +--------+--------+--------+     +--------+
/// level    |  i64   |  i64   |  i64   | ... |  i64   |   LONG: AtomicI64
///          +--------+--------+--------+     +--------+
/// path     | lock+  | lock+  | lock+  | ... | lock+  |   *_ARRAY: RwLock<Vec<_>>
///          | vec    | vec    | vec    |     | vec    |
///          +--------+--------+--------+     +--------+
/// ```
///
/// During a superstep every node is written by the single compute step that
/// owns it, so scalar accesses are relaxed atomics and the array locks are
/// uncontended. The master step reads and writes between supersteps.
pub struct NodeValue {
    schema: PregelSchema,
    columns: Vec<Column>,
    node_count: u64,
}

enum Column {
    Double(Vec<AtomicU64>),
    Long(Vec<AtomicI64>),
    DoubleArray(Vec<RwLock<Vec<f64>>>),
    LongArray(Vec<RwLock<Vec<i64>>>),
}

impl Column {
    fn new(value_type: ValueType, node_count: usize) -> Self {
        match value_type {
            ValueType::Double => Column::Double(
                (0..node_count)
                    .into_par_iter()
                    .map(|_| AtomicU64::new(0f64.to_bits()))
                    .collect(),
            ),
            ValueType::Long => Column::Long(
                (0..node_count)
                    .into_par_iter()
                    .map(|_| AtomicI64::new(0))
                    .collect(),
            ),
            ValueType::DoubleArray => Column::DoubleArray(
                (0..node_count)
                    .into_par_iter()
                    .map(|_| RwLock::new(vec![]))
                    .collect(),
            ),
            ValueType::LongArray => Column::LongArray(
                (0..node_count)
                    .into_par_iter()
                    .map(|_| RwLock::new(vec![]))
                    .collect(),
            ),
        }
    }

    fn value_type(&self) -> ValueType {
        match self {
            Column::Double(_) => ValueType::Double,
            Column::Long(_) => ValueType::Long,
            Column::DoubleArray(_) => ValueType::DoubleArray,
            Column::LongArray(_) => ValueType::LongArray,
        }
    }

    fn per_node_size(value_type: ValueType) -> u64 {
        (match value_type {
            ValueType::Double => size_of::<AtomicU64>(),
            ValueType::Long => size_of::<AtomicI64>(),
            ValueType::DoubleArray => size_of::<RwLock<Vec<f64>>>(),
            ValueType::LongArray => size_of::<RwLock<Vec<i64>>>(),
        }) as u64
    }
}

impl NodeValue {
    /// Allocates zeroed scalars and empty arrays for every schema element.
    pub fn new(schema: PregelSchema, node_count: u64) -> Self {
        let columns = schema
            .elements()
            .iter()
            .map(|element| Column::new(element.value_type(), node_count as usize))
            .collect();
        Self {
            schema,
            columns,
            node_count,
        }
    }

    pub fn schema(&self) -> &PregelSchema {
        &self.schema
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn value_type(&self, key: &str) -> Result<ValueType> {
        self.schema
            .position(key)
            .map(|i| self.columns[i].value_type())
            .ok_or_else(|| Error::UnknownProperty(String::from(key)))
    }

    pub fn double_value(&self, key: &str, node: NodeId) -> Result<f64> {
        match self.column(key, ValueType::Double)? {
            Column::Double(values) => Ok(f64::from_bits(
                values[node as usize].load(Ordering::Relaxed),
            )),
            _ => unreachable!(),
        }
    }

    pub fn set_double_value(&self, key: &str, node: NodeId, value: f64) -> Result<()> {
        match self.column(key, ValueType::Double)? {
            Column::Double(values) => {
                values[node as usize].store(value.to_bits(), Ordering::Relaxed);
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    pub fn long_value(&self, key: &str, node: NodeId) -> Result<i64> {
        match self.column(key, ValueType::Long)? {
            Column::Long(values) => Ok(values[node as usize].load(Ordering::Relaxed)),
            _ => unreachable!(),
        }
    }

    pub fn set_long_value(&self, key: &str, node: NodeId, value: i64) -> Result<()> {
        match self.column(key, ValueType::Long)? {
            Column::Long(values) => {
                values[node as usize].store(value, Ordering::Relaxed);
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    pub fn double_array_value(&self, key: &str, node: NodeId) -> Result<Vec<f64>> {
        match self.column(key, ValueType::DoubleArray)? {
            Column::DoubleArray(values) => Ok(values[node as usize]
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()),
            _ => unreachable!(),
        }
    }

    pub fn set_double_array_value(&self, key: &str, node: NodeId, value: Vec<f64>) -> Result<()> {
        match self.column(key, ValueType::DoubleArray)? {
            Column::DoubleArray(values) => {
                *values[node as usize]
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = value;
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    pub fn long_array_value(&self, key: &str, node: NodeId) -> Result<Vec<i64>> {
        match self.column(key, ValueType::LongArray)? {
            Column::LongArray(values) => Ok(values[node as usize]
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()),
            _ => unreachable!(),
        }
    }

    pub fn set_long_array_value(&self, key: &str, node: NodeId, value: Vec<i64>) -> Result<()> {
        match self.column(key, ValueType::LongArray)? {
            Column::LongArray(values) => {
                *values[node as usize]
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = value;
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    /// Copies a whole `DOUBLE` column, indexed by node id.
    pub fn double_properties(&self, key: &str) -> Result<Vec<f64>> {
        match self.column(key, ValueType::Double)? {
            Column::Double(values) => Ok(values
                .par_iter()
                .map(|v| f64::from_bits(v.load(Ordering::Relaxed)))
                .collect()),
            _ => unreachable!(),
        }
    }

    /// Copies a whole `LONG` column, indexed by node id.
    pub fn long_properties(&self, key: &str) -> Result<Vec<i64>> {
        match self.column(key, ValueType::Long)? {
            Column::Long(values) => Ok(values
                .par_iter()
                .map(|v| v.load(Ordering::Relaxed))
                .collect()),
            _ => unreachable!(),
        }
    }

    pub fn memory_estimation(schema: &PregelSchema) -> MemoryEstimation {
        schema
            .elements()
            .iter()
            .fold(MemoryEstimation::builder("node value"), |builder, element| {
                let per_node = Column::per_node_size(element.value_type());
                builder.per_node(element.key(), move |n| MemoryRange::of(per_node * n))
            })
            .build()
    }

    fn column(&self, key: &str, requested: ValueType) -> Result<&Column> {
        let column = self
            .schema
            .position(key)
            .map(|i| &self.columns[i])
            .ok_or_else(|| Error::UnknownProperty(String::from(key)))?;
        if column.value_type() == requested {
            Ok(column)
        } else {
            Err(Error::TypeMismatch {
                key: String::from(key),
                actual: column.value_type(),
                requested,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Visibility;

    fn schema() -> PregelSchema {
        PregelSchema::builder()
            .add("rank", ValueType::Double)
            .add("level", ValueType::Long)
            .add_with_visibility("weights", ValueType::DoubleArray, Visibility::Private)
            .add("path", ValueType::LongArray)
            .build()
    }

    #[test]
    fn test_defaults() {
        let values = NodeValue::new(schema(), 3);
        assert_eq!(values.node_count(), 3);
        assert_eq!(values.double_value("rank", 2).unwrap(), 0.0);
        assert_eq!(values.long_value("level", 0).unwrap(), 0);
        assert!(values.double_array_value("weights", 1).unwrap().is_empty());
        assert!(values.long_array_value("path", 1).unwrap().is_empty());
    }

    #[test]
    fn test_set_get() {
        let values = NodeValue::new(schema(), 3);
        values.set_double_value("rank", 1, 0.25).unwrap();
        values.set_long_value("level", 2, -7).unwrap();
        values
            .set_double_array_value("weights", 0, vec![1.0, 2.0])
            .unwrap();
        values.set_long_array_value("path", 2, vec![0, 1, 2]).unwrap();
        assert_eq!(values.double_properties("rank").unwrap(), [0.0, 0.25, 0.0]);
        assert_eq!(values.long_properties("level").unwrap(), [0, 0, -7]);
        assert_eq!(
            values.double_array_value("weights", 0).unwrap(),
            [1.0, 2.0]
        );
        assert_eq!(values.long_array_value("path", 2).unwrap(), [0, 1, 2]);
    }

    #[test]
    fn test_errors() {
        let values = NodeValue::new(schema(), 1);
        assert!(matches!(
            values.double_value("missing", 0),
            Err(Error::UnknownProperty(_))
        ));
        assert!(matches!(
            values.long_value("rank", 0),
            Err(Error::TypeMismatch {
                actual: ValueType::Double,
                requested: ValueType::Long,
                ..
            })
        ));
        assert_eq!(values.value_type("path").unwrap(), ValueType::LongArray);
    }

    #[test]
    fn test_concurrent_rows() {
        let values = NodeValue::new(schema(), 1000);
        (0..1000u64).into_par_iter().for_each(|node| {
            values.set_double_value("rank", node, node as f64).unwrap();
            values.set_long_array_value("path", node, vec![node as i64]).unwrap();
        });
        let ranks = values.double_properties("rank").unwrap();
        assert!(ranks.iter().enumerate().all(|(i, &r)| r == i as f64));
        assert_eq!(values.long_array_value("path", 999).unwrap(), [999]);
    }

    #[test]
    fn test_memory_estimation() {
        let tree = NodeValue::memory_estimation(&schema()).estimate(10, 1);
        assert_eq!(tree.components().len(), 4);
        assert_eq!(tree.components()[0].memory_usage(), MemoryRange::of(80));
        assert_eq!(tree.components()[1].memory_usage(), MemoryRange::of(80));
    }
}
