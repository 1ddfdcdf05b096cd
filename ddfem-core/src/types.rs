//! Core types shared by every layer.
//!
//! Tags are plain `i32` values because they travel inside the integer
//! [`Header`](crate::Header). The aliases exist to make signatures readable,
//! not to enforce anything at compile time.

/// Generic component tag (constraints, load patterns, recorders, loads).
pub type Tag = i32;

/// Tag of a node.
pub type NodeTag = i32;

/// Tag of an element.
pub type ElementTag = i32;

/// Tag of a partition. Doubles as the partition's commit stamp.
pub type PartitionTag = i32;

/// Type tag selecting which concrete class an object broker instantiates.
pub type ClassTag = i32;

/// Database tag carried alongside a class tag in object headers.
pub type DbTag = i32;

/// Dense vector of `f64`.
pub type Vector = ndarray::Array1<f64>;

/// Dense row-major matrix of `f64`.
pub type Matrix = ndarray::Array2<f64>;
