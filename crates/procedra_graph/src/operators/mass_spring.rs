// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curves simulated as chains of masses joined by springs.

use super::simulation::Simulation;
use crate::collection::Collection;
use crate::evaluation::{OperatorContext, OperatorError};
use crate::property::{Properties, PropertyType};
use glam::Vec3;

#[derive(Debug, Clone, Default)]
struct Chain {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    rest_lengths: Vec<f32>,
}

/// Mass-spring solver, one chain per curve with a fixed root
#[derive(Debug, Clone, Default)]
pub struct MassSpring {
    primitive: usize,
    chains: Vec<Chain>,
}

impl Simulation for MassSpring {
    fn declare_properties(properties: &mut Properties) {
        properties
            .add_property("stiffness", PropertyType::Float)
            .set_default_value_float(40.0)
            .set_min_max(0.0, 10_000.0)
            .set_tooltip("Spring constant");
        properties
            .add_property("damping", PropertyType::Float)
            .set_default_value_float(0.5)
            .set_min_max(0.0, 100.0);
        properties
            .add_property("mass", PropertyType::Float)
            .set_default_value_float(1.0)
            .set_min_max(0.001, 1000.0);
        properties
            .add_property("gravity", PropertyType::Vec3)
            .set_default_value_vec3([0.0, -9.81, 0.0]);
    }

    fn initialise(&mut self, input: &Collection, _properties: &Properties) -> Result<(), OperatorError> {
        let (index, set) = input
            .first_curves()
            .ok_or_else(|| OperatorError::MissingDependency("MassSpring needs curves on its input".into()))?;
        self.primitive = index;
        self.chains = set
            .curves
            .iter()
            .map(|curve| Chain {
                positions: curve.clone(),
                velocities: vec![Vec3::ZERO; curve.len()],
                rest_lengths: std::iter::once(0.0)
                    .chain(curve.windows(2).map(|w| w[0].distance(w[1])))
                    .collect(),
            })
            .collect();
        Ok(())
    }

    fn step(&mut self, ctx: &OperatorContext<'_>) {
        let props = ctx.properties;
        let stiffness = props.eval_float("stiffness");
        let damping = props.eval_float("damping");
        let mass = props.eval_float("mass").max(f32::EPSILON);
        let gravity = Vec3::from(props.eval_vec3("gravity"));
        let dt = ctx.time_step();

        for chain in &mut self.chains {
            // Root to tip; each mass reads the already updated predecessor.
            for i in 1..chain.positions.len() {
                let offset = chain.positions[i] - chain.positions[i - 1];
                let length = offset.length();
                let spring = if length > f32::EPSILON {
                    -stiffness * (length - chain.rest_lengths[i]) * (offset / length)
                } else {
                    Vec3::ZERO
                };
                let force = spring - damping * chain.velocities[i] + gravity * mass;
                chain.velocities[i] += force / mass * dt;
                chain.positions[i] += chain.velocities[i] * dt;
            }
        }
    }

    fn synchronise(&self, collection: &mut Collection) {
        if let Some(set) = collection.curves_mut(self.primitive) {
            for (curve, chain) in set.curves.iter_mut().zip(&self.chains) {
                curve.clone_from(&chain.positions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CurveSet, Primitive};
    use crate::evaluation::{EvaluationContext, Inputs};
    use crate::property::PropertyValue;

    fn horizontal_curve() -> Collection {
        let mut input = Collection::new();
        input.push(Primitive::Curves(CurveSet::new(vec![(0..5)
            .map(|i| Vec3::new(i as f32 * 0.25, 1.0, 0.0))
            .collect()])));
        input
    }

    fn simulate(props: &Properties, steps: usize) -> Collection {
        let input = horizontal_curve();
        let mut solver = MassSpring::default();
        solver.initialise(&input, props).unwrap();
        let eval = EvaluationContext::new();
        let inputs = Inputs::default();
        for _ in 0..steps {
            solver.step(&OperatorContext {
                eval: &eval,
                properties: props,
                inputs: &inputs,
                node_name: "MassSpring",
            });
        }
        let mut output = input.clone();
        solver.synchronise(&mut output);
        output
    }

    fn props() -> Properties {
        let mut props = Properties::new();
        MassSpring::declare_properties(&mut props);
        props
    }

    #[test]
    fn test_root_fixed_and_tip_falls() {
        let output = simulate(&props(), 10);
        let curve = &output.first_curves().unwrap().1.curves[0];
        assert_eq!(curve[0], Vec3::new(0.0, 1.0, 0.0));
        assert!(curve[4].y < 1.0);
        assert!(curve[1].y <= 1.0);
    }

    #[test]
    fn test_rest_state_is_stable_without_gravity() {
        let mut props = props();
        props.set_value("gravity", PropertyValue::Vec3([0.0; 3])).unwrap();
        let output = simulate(&props, 20);
        assert_eq!(output, horizontal_curve());
    }

    #[test]
    fn test_requires_curves() {
        let err = MassSpring::default().initialise(&Collection::new(), &props()).unwrap_err();
        assert!(matches!(err, OperatorError::MissingDependency(_)));
    }
}
