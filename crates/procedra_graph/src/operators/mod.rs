// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in operators.

pub mod geometry;
pub mod gravity;
pub mod mass_spring;
pub mod simulation;

pub use geometry::{CurvesSource, Output, PointsSource, Transform};
pub use gravity::Gravity;
pub use mass_spring::MassSpring;
pub use simulation::{Simulation, SimulationOperator, START_FRAME};

use crate::registry::OperatorRegistry;

/// Register every built-in operator
pub fn register_builtins(registry: &mut OperatorRegistry) {
    registry.register("Points", "Geometry", "Point cloud on a grid or a line", || {
        Box::new(PointsSource)
    });
    registry.register("Curves", "Geometry", "Parallel horizontal polylines", || {
        Box::new(CurvesSource)
    });
    registry.register("Transform", "Modifiers", "Scale and translate positions", || {
        Box::new(Transform)
    });
    registry.register("Gravity", "Physics", "Points falling onto the collision plane", || {
        Box::new(SimulationOperator::<Gravity>::new())
    });
    registry.register("MassSpring", "Physics", "Curves as chains of springs", || {
        Box::new(SimulationOperator::<MassSpring>::new())
    });
    registry.register("Output", "Output", "Marks the collection to display", || {
        Box::new(Output)
    });
}
