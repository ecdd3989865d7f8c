// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene graph evaluation engine for Procedra.
//!
//! This crate provides the data side of the editor:
//! - Typed, introspectable operator properties
//! - Nodes with input/output sockets joined by links
//! - Topological scheduling with a cached evaluation order
//! - Per-frame evaluation with frame-cached simulations
//!
//! ## Architecture
//!
//! A [`Graph`] owns its nodes in an arena keyed by [`NodeId`]. Each node is
//! bound to an [`Operator`] created by the [`OperatorRegistry`]. [`evaluate`]
//! runs the operators in [`Schedule`] order and hands every node the
//! [`Collection`]s produced upstream.

pub mod collection;
pub mod evaluation;
pub mod graph;
pub mod link;
pub mod node;
pub mod operators;
pub mod property;
pub mod registry;
pub mod schedule;
pub mod socket;

pub use collection::{Collection, CurveSet, PointCloud, Primitive, PrimitiveKind};
pub use evaluation::{
    evaluate, CancelToken, CollisionPlane, EvalReport, EvaluationContext, NodeStatus, Operator,
    OperatorContext, OperatorError,
};
pub use graph::{Graph, GraphError};
pub use link::Link;
pub use node::{Node, NodeFlags, NodeId};
pub use property::{Properties, Property, PropertyError, PropertyType, PropertyValue};
pub use registry::{OperatorDescriptor, OperatorRegistry};
pub use schedule::{topological_order, Schedule};
pub use socket::{InputRef, InputSocket, OutputRef, OutputSocket};
