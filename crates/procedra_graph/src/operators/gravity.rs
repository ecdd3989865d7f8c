// SPDX-License-Identifier: MIT OR Apache-2.0
//! Point cloud falling under gravity, bouncing on the collision plane.

use super::simulation::Simulation;
use crate::collection::Collection;
use crate::evaluation::{collision_response, OperatorContext, OperatorError};
use crate::property::{Properties, PropertyType};
use glam::Vec3;

/// Free-fall solver with semi-implicit Euler integration
#[derive(Debug, Clone, Default)]
pub struct Gravity {
    primitive: usize,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
}

impl Gravity {
    /// Current point velocities
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }
}

impl Simulation for Gravity {
    fn declare_properties(properties: &mut Properties) {
        properties
            .add_property("gravity", PropertyType::Vec3)
            .set_default_value_vec3([0.0, -9.81, 0.0])
            .set_tooltip("Acceleration in m/s²");
        properties
            .add_property("mass", PropertyType::Float)
            .set_default_value_float(1.0)
            .set_min_max(0.001, 1000.0);
        properties
            .add_property("elasticity", PropertyType::Float)
            .set_default_value_float(0.5)
            .set_min_max(0.0, 1.0)
            .set_tooltip("Fraction of normal velocity kept after a bounce");
        properties
            .add_property("collide", PropertyType::Bool)
            .set_default_value_bool(true);
    }

    fn initialise(&mut self, input: &Collection, _properties: &Properties) -> Result<(), OperatorError> {
        let (index, cloud) = input
            .first_points()
            .ok_or_else(|| OperatorError::MissingDependency("Gravity needs a point cloud on its input".into()))?;
        self.primitive = index;
        self.positions = cloud.points.clone();
        self.velocities = vec![Vec3::ZERO; cloud.points.len()];
        Ok(())
    }

    fn step(&mut self, ctx: &OperatorContext<'_>) {
        let props = ctx.properties;
        let gravity = Vec3::from(props.eval_vec3("gravity"));
        let mass = props.eval_float("mass").max(f32::EPSILON);
        let elasticity = props.eval_float("elasticity");
        let collide = props.eval_bool("collide");
        let plane = ctx.collision_plane();
        let dt = ctx.time_step();
        let force = gravity * mass;

        for (p, v) in self.positions.iter_mut().zip(&mut self.velocities) {
            *v += force / mass * dt;
            if collide && plane.is_colliding(*p, *v) {
                *v = collision_response(*v, plane.normal(), elasticity);
            }
            *p += *v * dt;
        }
    }

    fn synchronise(&self, collection: &mut Collection) {
        if let Some(cloud) = collection.points_mut(self.primitive) {
            cloud.points.clone_from(&self.positions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{PointCloud, Primitive};
    use crate::evaluation::{EvaluationContext, Inputs};
    use crate::property::PropertyValue;

    fn setup(points: Vec<Vec3>) -> (Gravity, Properties) {
        let mut props = Properties::new();
        Gravity::declare_properties(&mut props);
        let mut input = Collection::new();
        input.push(Primitive::Points(PointCloud::new(points)));
        let mut solver = Gravity::default();
        solver.initialise(&input, &props).unwrap();
        (solver, props)
    }

    fn step(solver: &mut Gravity, props: &Properties) {
        let eval = EvaluationContext::new();
        let inputs = Inputs::default();
        solver.step(&OperatorContext {
            eval: &eval,
            properties: props,
            inputs: &inputs,
            node_name: "Gravity",
        });
    }

    #[test]
    fn test_semi_implicit_euler() {
        let (mut solver, props) = setup(vec![Vec3::new(0.0, 10.0, 0.0)]);
        let dt = 1.0 / 24.0;
        step(&mut solver, &props);
        step(&mut solver, &props);

        let v = -9.81 * dt * 2.0;
        let y = 10.0 - 9.81 * dt * dt - 9.81 * dt * dt * 2.0;
        assert!((solver.velocities()[0].y - v).abs() < 1e-5);
        assert!((solver.positions[0].y - y).abs() < 1e-5);
    }

    #[test]
    fn test_resting_on_plane_without_elasticity() {
        let (mut solver, mut props) = setup(vec![Vec3::new(1.0, 0.0, 0.0)]);
        props.set_value("elasticity", PropertyValue::Float(0.0)).unwrap();
        step(&mut solver, &props);

        assert!(solver.velocities()[0].y.abs() < 1e-6);
        assert!(solver.positions[0].y.abs() < 1e-6);
        assert!((solver.positions[0].x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_full_elasticity_reverses_normal_velocity() {
        let (mut solver, mut props) = setup(vec![Vec3::ZERO]);
        props.set_value("elasticity", PropertyValue::Float(1.0)).unwrap();
        step(&mut solver, &props);

        let incoming = 9.81 / 24.0;
        assert!((solver.velocities()[0].y - incoming).abs() < 1e-5);
    }

    #[test]
    fn test_requires_points() {
        let mut props = Properties::new();
        Gravity::declare_properties(&mut props);
        let err = Gravity::default().initialise(&Collection::new(), &props).unwrap_err();
        assert!(matches!(err, OperatorError::MissingDependency(_)));
    }
}
