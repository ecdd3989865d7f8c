// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.
//!
//! [`evaluate`] walks the cached [`Schedule`](crate::schedule::Schedule) of a
//! graph and runs each node's [`Operator`] with the collections produced
//! upstream during the same pass. Operator failures are recorded on the node
//! and in the [`EvalReport`]; they never stop the pass. Only cancellation does.

use crate::collection::Collection;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::property::Properties;
use glam::Vec3;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default frames per second of the timeline
pub const DEFAULT_FPS: f32 = 24.0;

/// Distance under which a point touches the collision plane
pub const COLLISION_EPSILON: f32 = 1e-3;

/// The behaviour bound to a node
pub trait Operator: fmt::Debug + Send {
    /// Add the sockets and properties of this operator to a fresh node
    fn declare(&self, node: &mut Node);

    /// Produce the output collection for the current frame
    fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError>;

    /// Forget any state kept between frames
    fn reset(&mut self) {}
}

/// Error raised by an operator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperatorError {
    /// The input lacks the primitive kind the operator works on
    #[error("{0}")]
    MissingDependency(String),

    /// A required input is not linked or produced nothing
    #[error("Input {0} has no collection")]
    MissingInput(usize),

    /// The pass was cancelled while this operator ran
    #[error("Evaluation cancelled")]
    Cancelled,

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}

/// Shared flag that interrupts an evaluation pass between node steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untripped token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Infinite plane that simulation operators collide against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPlane {
    point: Vec3,
    normal: Vec3,
}

impl CollisionPlane {
    /// Create a plane through `point`; the normal is normalized (+Y if degenerate)
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            point,
            normal: if normal == Vec3::ZERO { Vec3::Y } else { normal },
        }
    }

    /// A point on the plane
    pub fn point(&self) -> Vec3 {
        self.point
    }

    /// Unit normal
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Signed distance of a point, positive on the normal side
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        (p - self.point).dot(self.normal)
    }

    /// Whether a point touches the plane while moving into it
    pub fn is_colliding(&self, position: Vec3, velocity: Vec3) -> bool {
        self.signed_distance(position) < COLLISION_EPSILON && velocity.dot(self.normal) < 0.0
    }
}

/// Velocity after hitting a surface with unit normal `normal`
///
/// The normal component is reversed and scaled by `elasticity`, the
/// tangential component is kept.
pub fn collision_response(velocity: Vec3, normal: Vec3, elasticity: f32) -> Vec3 {
    let normal_part = velocity.dot(normal) * normal;
    let tangent_part = velocity - normal_part;
    tangent_part - normal_part * elasticity.clamp(0.0, 1.0)
}

impl Default for CollisionPlane {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Y)
    }
}

/// Session-wide evaluation state, handed to every pass
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Frame being evaluated
    pub frame: i32,
    /// Seconds per frame
    pub time_step: f32,
    /// Plane used by colliding simulations
    pub collision_plane: CollisionPlane,
    /// Interrupts a running pass
    pub cancel: CancelToken,
}

impl EvaluationContext {
    /// Create a context at frame 0
    pub fn new() -> Self {
        Self {
            frame: 0,
            time_step: 1.0 / DEFAULT_FPS,
            collision_plane: CollisionPlane::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Set the frame
    pub fn at_frame(mut self, frame: i32) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Collections arriving on a node's inputs, by input index
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    collections: Vec<Option<Arc<Collection>>>,
}

impl Inputs {
    /// Wrap per-input collections
    pub fn new(collections: Vec<Option<Arc<Collection>>>) -> Self {
        Self { collections }
    }

    /// Collection on an input, if linked and produced
    pub fn get(&self, index: usize) -> Option<&Arc<Collection>> {
        self.collections.get(index)?.as_ref()
    }

    /// Collection on an input, or [`OperatorError::MissingInput`]
    pub fn require(&self, index: usize) -> Result<Arc<Collection>, OperatorError> {
        self.get(index)
            .cloned()
            .ok_or(OperatorError::MissingInput(index))
    }

    /// Number of inputs
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether the node has no input
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// What an operator sees while it runs
pub struct OperatorContext<'a> {
    /// Session state
    pub eval: &'a EvaluationContext,
    /// Properties of the node being evaluated
    pub properties: &'a Properties,
    /// Upstream collections
    pub inputs: &'a Inputs,
    /// Display name of the node
    pub node_name: &'a str,
}

impl OperatorContext<'_> {
    /// Frame being evaluated
    pub fn frame(&self) -> i32 {
        self.eval.frame
    }

    /// Seconds per frame
    pub fn time_step(&self) -> f32 {
        self.eval.time_step
    }

    /// Plane used by colliding simulations
    pub fn collision_plane(&self) -> &CollisionPlane {
        &self.eval.collision_plane
    }

    /// Whether the pass should stop
    pub fn is_cancelled(&self) -> bool {
        self.eval.cancel.is_cancelled()
    }

    /// Collection on an input, or [`OperatorError::MissingInput`]
    pub fn require_collection(&self, index: usize) -> Result<Arc<Collection>, OperatorError> {
        self.inputs.require(index)
    }
}

/// Outcome of one node in a pass
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatus {
    /// The operator produced a collection with this many points
    Evaluated {
        /// Number of points in the output
        points: usize,
    },
    /// The node forwarded its first input
    Bypassed,
    /// The operator raised an error; the node has no output this frame
    Warning(String),
    /// No operator is bound to the node
    Unbound,
}

/// Per-node entry of an [`EvalReport`]
#[derive(Debug, Clone, PartialEq)]
pub struct EvalNodeReport {
    /// Node
    pub node: NodeId,
    /// Display name at evaluation time
    pub name: String,
    /// Outcome
    pub status: NodeStatus,
}

/// Summary of an evaluation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalReport {
    /// Evaluated frame
    pub frame: i32,
    /// Nodes in evaluation order
    pub nodes: Vec<EvalNodeReport>,
    /// Linked nodes skipped because they sit on a cycle
    pub cyclic: Vec<NodeId>,
    /// Whether the pass stopped early
    pub cancelled: bool,
}

impl EvalReport {
    /// Warnings raised during the pass
    pub fn warnings(&self) -> impl Iterator<Item = (&NodeId, &str)> {
        self.nodes.iter().filter_map(|n| match &n.status {
            NodeStatus::Warning(w) => Some((&n.node, w.as_str())),
            _ => None,
        })
    }

    /// Whether any node raised a warning or was unbound
    pub fn has_warnings(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| matches!(n.status, NodeStatus::Warning(_) | NodeStatus::Unbound))
    }

    /// Status of a node, if it ran
    pub fn status(&self, node: NodeId) -> Option<&NodeStatus> {
        self.nodes.iter().find(|n| n.node == node).map(|n| &n.status)
    }
}

/// Evaluate every scheduled node of a graph at `ctx.frame`
pub fn evaluate(graph: &mut Graph, ctx: &EvaluationContext) -> EvalReport {
    let schedule = graph.schedule().clone();
    let mut report = EvalReport {
        frame: ctx.frame,
        cyclic: schedule.cyclic,
        ..EvalReport::default()
    };

    for node_id in schedule.order {
        if ctx.cancel.is_cancelled() {
            tracing::info!("Evaluation of frame {} cancelled", ctx.frame);
            report.cancelled = true;
            break;
        }

        let inputs = gather_inputs(graph, node_id);
        let Some(node) = graph.node_mut(node_id) else {
            continue;
        };

        let status = if node.flags.bypassed {
            node.runtime.output = inputs.get(0).cloned();
            NodeStatus::Bypassed
        } else if let Some(operator) = node.runtime.operator.as_mut() {
            let op_ctx = OperatorContext {
                eval: ctx,
                properties: &node.properties,
                inputs: &inputs,
                node_name: &node.name,
            };
            match operator.execute(&op_ctx) {
                Ok(collection) => {
                    let points = collection.point_count();
                    node.runtime.output = Some(Arc::new(collection));
                    NodeStatus::Evaluated { points }
                }
                Err(OperatorError::Cancelled) => {
                    tracing::info!("Evaluation of frame {} cancelled in {}", ctx.frame, node.name);
                    report.cancelled = true;
                    break;
                }
                Err(err) => {
                    tracing::warn!("{} (frame {}): {err}", node.name, ctx.frame);
                    node.runtime.output = None;
                    NodeStatus::Warning(err.to_string())
                }
            }
        } else {
            tracing::warn!("No operator bound to {} ({})", node.name, node.type_name);
            node.runtime.output = None;
            NodeStatus::Unbound
        };

        node.runtime.warnings.clear();
        if let NodeStatus::Warning(warning) = &status {
            node.runtime.warnings.push(warning.clone());
        }
        report.nodes.push(EvalNodeReport {
            node: node_id,
            name: node.name.clone(),
            status,
        });
    }

    tracing::debug!(
        "Evaluated frame {}: {} node(s), cancelled: {}",
        report.frame,
        report.nodes.len(),
        report.cancelled
    );
    report
}

fn gather_inputs(graph: &Graph, node_id: NodeId) -> Inputs {
    let Some(node) = graph.node(node_id) else {
        return Inputs::default();
    };
    Inputs::new(
        node.inputs()
            .iter()
            .map(|input| {
                let upstream = graph.node(input.link()?.node)?;
                upstream.runtime.output.clone()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{PointCloud, Primitive};
    use crate::registry::OperatorRegistry;
    use crate::socket::{InputRef, OutputRef};

    #[derive(Debug)]
    struct Source;

    impl Operator for Source {
        fn declare(&self, node: &mut Node) {
            node.add_output("out");
        }

        fn execute(&mut self, _ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
            let mut collection = Collection::new();
            collection.push(Primitive::Points(PointCloud::new(vec![Vec3::ZERO; 3])));
            Ok(collection)
        }
    }

    #[derive(Debug)]
    struct CancelPass;

    impl Operator for CancelPass {
        fn declare(&self, node: &mut Node) {
            node.add_input("in");
            node.add_output("out");
        }

        fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
            ctx.eval.cancel.cancel();
            Ok(Collection::clone(&*ctx.require_collection(0)?))
        }
    }

    fn registry() -> OperatorRegistry {
        let mut registry = OperatorRegistry::with_builtins();
        registry.register("Source", "Test", "Three points at the origin", || Box::new(Source));
        registry.register("Cancel", "Test", "Trips the cancel token", || Box::new(CancelPass));
        registry
    }

    fn add(graph: &mut Graph, registry: &OperatorRegistry, type_name: &str) -> NodeId {
        graph.add_node(registry.create_node(type_name).unwrap())
    }

    fn link(graph: &mut Graph, from: NodeId, to: NodeId) {
        graph.link(OutputRef::new(from, 0), InputRef::new(to, 0)).unwrap();
    }

    #[test]
    fn test_chain_evaluates_in_order() {
        let registry = registry();
        let mut graph = Graph::default();
        let a = add(&mut graph, &registry, "Source");
        let b = add(&mut graph, &registry, "Transform");
        let c = add(&mut graph, &registry, "Output");
        link(&mut graph, a, b);
        link(&mut graph, b, c);

        let report = evaluate(&mut graph, &EvaluationContext::new());
        let order: Vec<_> = report.nodes.iter().map(|n| n.node).collect();
        assert_eq!(order, vec![a, b, c]);
        assert!(!report.has_warnings());
        assert_eq!(graph.node(c).unwrap().output_collection().unwrap().point_count(), 3);
    }

    #[test]
    fn test_missing_input_is_a_warning() {
        let registry = registry();
        let mut graph = Graph::default();
        let a = add(&mut graph, &registry, "Source");
        let b = add(&mut graph, &registry, "Transform");
        let c = add(&mut graph, &registry, "Output");
        link(&mut graph, a, b);
        link(&mut graph, b, c);
        graph.unlink(OutputRef::new(a, 0), InputRef::new(b, 0));

        let report = evaluate(&mut graph, &EvaluationContext::new());
        assert_eq!(report.nodes.len(), 2);
        assert!(matches!(report.status(b), Some(NodeStatus::Warning(_))));
        assert!(matches!(report.status(c), Some(NodeStatus::Warning(_))));
        assert_eq!(graph.node(b).unwrap().warnings().len(), 1);
        assert!(graph.node(c).unwrap().output_collection().is_none());
    }

    #[test]
    fn test_bypass_forwards_first_input() {
        let registry = registry();
        let mut graph = Graph::default();
        let a = add(&mut graph, &registry, "Source");
        let b = add(&mut graph, &registry, "Transform");
        link(&mut graph, a, b);
        graph.node_mut(b).unwrap().flags.bypassed = true;

        let report = evaluate(&mut graph, &EvaluationContext::new());
        assert_eq!(report.status(b), Some(&NodeStatus::Bypassed));
        let a_out = graph.node(a).unwrap().output_collection().unwrap().clone();
        let b_out = graph.node(b).unwrap().output_collection().unwrap().clone();
        assert!(Arc::ptr_eq(&a_out, &b_out));
    }

    #[test]
    fn test_unbound_node_is_reported() {
        let registry = registry();
        let mut graph = Graph::default();
        let a = add(&mut graph, &registry, "Source");
        let mut raw = Node::new("Unknown");
        raw.add_input("in");
        let b = graph.add_node(raw);
        link(&mut graph, a, b);

        let report = evaluate(&mut graph, &EvaluationContext::new());
        assert_eq!(report.status(b), Some(&NodeStatus::Unbound));
        assert!(report.has_warnings());
    }

    #[test]
    fn test_cancellation_stops_between_nodes() {
        let registry = registry();
        let mut graph = Graph::default();
        let a = add(&mut graph, &registry, "Source");
        let b = add(&mut graph, &registry, "Cancel");
        let c = add(&mut graph, &registry, "Output");
        link(&mut graph, a, b);
        link(&mut graph, b, c);

        let ctx = EvaluationContext::new();
        let report = evaluate(&mut graph, &ctx);
        assert!(report.cancelled);
        assert_eq!(report.nodes.len(), 2);
        assert!(graph.node(b).unwrap().output_collection().is_some());
        assert!(graph.node(c).unwrap().output_collection().is_none());

        ctx.cancel.reset();
        let report = evaluate(&mut graph, &ctx);
        assert!(report.cancelled);
        assert_eq!(report.nodes.len(), 2);
    }

    #[test]
    fn test_simulation_ignores_upstream_once_primed() {
        use crate::property::PropertyValue;

        let registry = registry();
        let mut graph = Graph::default();
        let points = add(&mut graph, &registry, "Points");
        let gravity = add(&mut graph, &registry, "Gravity");
        link(&mut graph, points, gravity);
        graph
            .node_mut(points)
            .unwrap()
            .properties_mut()
            .set_value("origin", PropertyValue::Vec3([0.0, 10.0, 0.0]))
            .unwrap();

        let y_at = |graph: &Graph| {
            let out = graph.node(gravity).unwrap().output_collection().unwrap().clone();
            out.first_points().unwrap().1.points[0].y
        };

        let mut ctx = EvaluationContext::new();
        evaluate(&mut graph, &ctx);
        let y0 = y_at(&graph);
        ctx.frame = 1;
        evaluate(&mut graph, &ctx);

        graph
            .node_mut(points)
            .unwrap()
            .properties_mut()
            .set_value("origin", PropertyValue::Vec3([0.0, 50.0, 0.0]))
            .unwrap();
        ctx.frame = 2;
        let report = evaluate(&mut graph, &ctx);
        assert!(!report.has_warnings());

        let dt = ctx.time_step;
        let v0 = -9.81 * dt;
        let expected = y0 + (v0 - 9.81 * dt) * dt + (v0 - 2.0 * 9.81 * dt) * dt;
        assert!((y_at(&graph) - expected).abs() < 1e-4);

        graph.invalidate(points);
        let report = evaluate(&mut graph, &ctx);
        assert!(matches!(report.status(gravity), Some(NodeStatus::Warning(_))));
    }

    #[test]
    fn test_relinking_upstream_reprimes_simulation() {
        let registry = registry();
        let mut graph = Graph::default();
        let points = add(&mut graph, &registry, "Points");
        let gravity = add(&mut graph, &registry, "Gravity");
        let transform = add(&mut graph, &registry, "Transform");
        link(&mut graph, points, gravity);

        let mut ctx = EvaluationContext::new();
        evaluate(&mut graph, &ctx);
        ctx.frame = 1;
        let report = evaluate(&mut graph, &ctx);
        assert!(matches!(report.status(gravity), Some(NodeStatus::Evaluated { .. })));

        assert!(graph.unlink(OutputRef::new(points, 0), InputRef::new(gravity, 0)));
        link(&mut graph, points, transform);
        link(&mut graph, transform, gravity);
        assert!(graph.node(gravity).unwrap().output_collection().is_none());
        let report = evaluate(&mut graph, &ctx);
        assert!(matches!(report.status(gravity), Some(NodeStatus::Warning(_))));

        ctx.frame = 0;
        let report = evaluate(&mut graph, &ctx);
        assert!(matches!(report.status(gravity), Some(NodeStatus::Evaluated { points: 16 })));
    }

    #[test]
    fn test_collision_plane() {
        let plane = CollisionPlane::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(plane.normal(), Vec3::Y);
        assert!((plane.signed_distance(Vec3::new(5.0, 3.0, 0.0)) - 2.0).abs() < 1e-6);
        assert!(plane.is_colliding(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0)));
        assert!(!plane.is_colliding(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)));
        assert!(!plane.is_colliding(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -1.0, 0.0)));
        assert_eq!(CollisionPlane::new(Vec3::ZERO, Vec3::ZERO).normal(), Vec3::Y);
    }

    #[test]
    fn test_collision_response_elasticity() {
        let v = Vec3::new(2.0, -3.0, 0.5);

        let absorbed = collision_response(v, Vec3::Y, 0.0);
        assert!(absorbed.y.abs() < 1e-6);
        assert!((absorbed.x - 2.0).abs() < 1e-6);
        assert!((absorbed.z - 0.5).abs() < 1e-6);

        let bounced = collision_response(v, Vec3::Y, 1.0);
        assert!((bounced.y - 3.0).abs() < 1e-6);
        assert!((bounced.x - 2.0).abs() < 1e-6);
    }
}
