// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame-cached simulation operators.
//!
//! A [`SimulationOperator`] primes itself from its input at the start frame
//! and then evolves from its own previous output, ignoring upstream changes
//! until it is reset or the timeline goes back before the start frame.

use crate::collection::Collection;
use crate::evaluation::{Operator, OperatorContext, OperatorError};
use crate::node::Node;
use crate::property::{Properties, PropertyType};
use std::fmt;
use std::sync::Arc;

/// Property holding the frame a simulation primes at
pub const START_FRAME: &str = "start_frame";

/// Solver plugged into a [`SimulationOperator`]
pub trait Simulation: fmt::Debug + Clone + Default + Send + 'static {
    /// Declare the solver parameters
    fn declare_properties(properties: &mut Properties);

    /// Seed working buffers from the start-frame input
    ///
    /// Fails with [`OperatorError::MissingDependency`] when the input lacks
    /// the primitive kind the solver works on.
    fn initialise(&mut self, input: &Collection, properties: &Properties) -> Result<(), OperatorError>;

    /// Advance one time step
    fn step(&mut self, ctx: &OperatorContext<'_>);

    /// Write working buffers back into the collection
    fn synchronise(&self, collection: &mut Collection);
}

#[derive(Debug, Clone)]
enum SimulationState<S> {
    Uninitialized,
    Primed {
        frame: i32,
        original: Arc<Collection>,
        last: Collection,
        solver: S,
    },
}

/// Operator running a [`Simulation`] across frames
#[derive(Debug)]
pub struct SimulationOperator<S: Simulation> {
    state: SimulationState<S>,
}

impl<S: Simulation> SimulationOperator<S> {
    /// Create an unprimed operator
    pub fn new() -> Self {
        Self {
            state: SimulationState::Uninitialized,
        }
    }

    /// Input collection captured at the start frame
    pub fn original(&self) -> Option<&Arc<Collection>> {
        match &self.state {
            SimulationState::Primed { original, .. } => Some(original),
            SimulationState::Uninitialized => None,
        }
    }

    /// Frame of the cached output
    pub fn primed_frame(&self) -> Option<i32> {
        match &self.state {
            SimulationState::Primed { frame, .. } => Some(*frame),
            SimulationState::Uninitialized => None,
        }
    }

    /// The previous state survives a cancelled step; a failed seed clears it
    fn prime(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
        let seeded = ctx.require_collection(0).and_then(|input| {
            let mut solver = S::default();
            solver.initialise(&input, ctx.properties)?;
            Ok((input, solver))
        });
        let (input, solver) = match seeded {
            Ok(seeded) => seeded,
            Err(e) => {
                self.state = SimulationState::Uninitialized;
                return Err(e);
            }
        };
        let working = Collection::clone(&input);
        self.advance(ctx, input, working, solver)
    }

    fn advance(
        &mut self,
        ctx: &OperatorContext<'_>,
        original: Arc<Collection>,
        mut working: Collection,
        mut solver: S,
    ) -> Result<Collection, OperatorError> {
        solver.step(ctx);
        if ctx.is_cancelled() {
            return Err(OperatorError::Cancelled);
        }
        solver.synchronise(&mut working);
        self.state = SimulationState::Primed {
            frame: ctx.frame(),
            original,
            last: working.clone(),
            solver,
        };
        Ok(working)
    }
}

impl<S: Simulation> Default for SimulationOperator<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Simulation> Operator for SimulationOperator<S> {
    fn declare(&self, node: &mut Node) {
        node.add_input("in");
        node.add_output("out");
        let properties = node.properties_mut();
        properties
            .add_property(START_FRAME, PropertyType::Int)
            .set_default_value_int(0)
            .set_tooltip("Frame at which the simulation reads its input");
        S::declare_properties(properties);
    }

    fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
        let start = ctx.properties.eval_int(START_FRAME);
        let frame = ctx.frame();

        if frame < start {
            self.state = SimulationState::Uninitialized;
            return Ok(Collection::clone(&*ctx.require_collection(0)?));
        }

        match &self.state {
            SimulationState::Primed { frame: cached, last, .. } if *cached == frame => {
                return Ok(last.clone());
            }
            _ => {}
        }

        if frame == start {
            return self.prime(ctx);
        }

        match &self.state {
            SimulationState::Uninitialized => Err(OperatorError::MissingDependency(format!(
                "{} is not primed; evaluate frame {start} first",
                ctx.node_name
            ))),
            SimulationState::Primed {
                original,
                last,
                solver,
                ..
            } => {
                let (original, working, solver) = (original.clone(), last.clone(), solver.clone());
                self.advance(ctx, original, working, solver)
            }
        }
    }

    fn reset(&mut self) {
        self.state = SimulationState::Uninitialized;
    }
}
