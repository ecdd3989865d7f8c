// SPDX-License-Identifier: MIT OR Apache-2.0
//! Geometry sources, modifiers and the output sink.

use crate::collection::{Collection, CurveSet, PointCloud, Primitive};
use crate::evaluation::{Operator, OperatorContext, OperatorError};
use crate::node::Node;
use crate::property::PropertyType;
use glam::Vec3;

/// Point cloud laid out on a grid or a line
#[derive(Debug, Default)]
pub struct PointsSource;

impl Operator for PointsSource {
    fn declare(&self, node: &mut Node) {
        node.add_output("out");
        let props = node.properties_mut();
        props
            .add_property("layout", PropertyType::Enum)
            .set_enum_values(["grid", "line"]);
        props
            .add_property("count", PropertyType::Int)
            .set_default_value_int(16)
            .set_min_max(1.0, 10_000.0);
        props
            .add_property("spacing", PropertyType::Float)
            .set_default_value_float(0.25)
            .set_min_max(0.001, 100.0);
        props
            .add_property("origin", PropertyType::Vec3)
            .set_default_value_vec3([0.0, 2.0, 0.0]);
    }

    fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
        let props = ctx.properties;
        let count = props.eval_int("count").max(0) as usize;
        let spacing = props.eval_float("spacing");
        let origin = Vec3::from(props.eval_vec3("origin"));

        let points = match props.eval_enum("layout").as_str() {
            "line" => (0..count)
                .map(|i| origin + Vec3::X * i as f32 * spacing)
                .collect(),
            _ => {
                let side = (count as f32).sqrt().ceil().max(1.0) as usize;
                (0..count)
                    .map(|i| origin + Vec3::new((i % side) as f32, 0.0, (i / side) as f32) * spacing)
                    .collect()
            }
        };

        let mut collection = Collection::new();
        collection.push(Primitive::Points(PointCloud::new(points)));
        Ok(collection)
    }
}

/// Parallel horizontal polylines along +X
#[derive(Debug, Default)]
pub struct CurvesSource;

impl Operator for CurvesSource {
    fn declare(&self, node: &mut Node) {
        node.add_output("out");
        let props = node.properties_mut();
        props
            .add_property("count", PropertyType::Int)
            .set_default_value_int(4)
            .set_min_max(1.0, 1000.0);
        props
            .add_property("segments", PropertyType::Int)
            .set_default_value_int(8)
            .set_min_max(1.0, 256.0);
        props
            .add_property("length", PropertyType::Float)
            .set_default_value_float(1.0)
            .set_min_max(0.01, 100.0);
        props
            .add_property("spacing", PropertyType::Float)
            .set_default_value_float(0.25)
            .set_min_max(0.001, 100.0)
            .set_tooltip("Distance between curves along Z");
        props
            .add_property("origin", PropertyType::Vec3)
            .set_default_value_vec3([0.0, 2.0, 0.0]);
    }

    fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
        let props = ctx.properties;
        let count = props.eval_int("count").max(0) as usize;
        let segments = props.eval_int("segments").max(1) as usize;
        let length = props.eval_float("length");
        let spacing = props.eval_float("spacing");
        let origin = Vec3::from(props.eval_vec3("origin"));
        let step = length / segments as f32;

        let curves = (0..count)
            .map(|c| {
                let root = origin + Vec3::Z * c as f32 * spacing;
                (0..=segments).map(|i| root + Vec3::X * i as f32 * step).collect()
            })
            .collect();

        let mut collection = Collection::new();
        collection.push(Primitive::Curves(CurveSet::new(curves)));
        Ok(collection)
    }
}

/// Scales then translates every position of its input
#[derive(Debug, Default)]
pub struct Transform;

impl Operator for Transform {
    fn declare(&self, node: &mut Node) {
        node.add_input("in");
        node.add_output("out");
        let props = node.properties_mut();
        props
            .add_property("translate", PropertyType::Vec3)
            .set_default_value_vec3([0.0; 3]);
        props
            .add_property("scale", PropertyType::Vec3)
            .set_default_value_vec3([1.0; 3]);
    }

    fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
        let translate = Vec3::from(ctx.properties.eval_vec3("translate"));
        let scale = Vec3::from(ctx.properties.eval_vec3("scale"));

        let mut collection = Collection::clone(&*ctx.require_collection(0)?);
        for primitive in &mut collection.primitives {
            for p in primitive.positions_mut() {
                *p = *p * scale + translate;
            }
        }
        Ok(collection)
    }
}

/// Sink marking what the scene renders
#[derive(Debug, Default)]
pub struct Output;

impl Operator for Output {
    fn declare(&self, node: &mut Node) {
        node.add_input("in");
    }

    fn execute(&mut self, ctx: &OperatorContext<'_>) -> Result<Collection, OperatorError> {
        Ok(Collection::clone(&*ctx.require_collection(0)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{EvaluationContext, Inputs};
    use crate::property::{Properties, PropertyValue};
    use std::sync::Arc;

    fn run(op: &mut dyn Operator, properties: &Properties, inputs: &Inputs) -> Result<Collection, OperatorError> {
        let eval = EvaluationContext::new();
        op.execute(&OperatorContext {
            eval: &eval,
            properties,
            inputs,
            node_name: "test",
        })
    }

    fn declared(op: &dyn Operator) -> Properties {
        let mut node = Node::new("test");
        op.declare(&mut node);
        node.properties().clone()
    }

    #[test]
    fn test_points_layouts() {
        let mut props = declared(&PointsSource);
        props.set_value("count", PropertyValue::Int(5)).unwrap();
        let grid = run(&mut PointsSource, &props, &Inputs::default()).unwrap();
        assert_eq!(grid.point_count(), 5);
        let (lo, hi) = grid.bounds().unwrap();
        assert_eq!(hi - lo, Vec3::new(0.5, 0.0, 0.25));

        props.set_value("layout", PropertyValue::Enum("line".into())).unwrap();
        let line = run(&mut PointsSource, &props, &Inputs::default()).unwrap();
        let (lo, hi) = line.bounds().unwrap();
        assert_eq!(hi - lo, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_curves_source() {
        let props = declared(&CurvesSource);
        let out = run(&mut CurvesSource, &props, &Inputs::default()).unwrap();
        let set = out.first_curves().unwrap().1;
        assert_eq!(set.curves.len(), 4);
        assert_eq!(set.point_count(), 4 * 9);
        assert!((set.curves[0][8].x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_scales_then_translates() {
        let mut props = declared(&Transform);
        props.set_value("scale", PropertyValue::Vec3([2.0, 2.0, 2.0])).unwrap();
        props.set_value("translate", PropertyValue::Vec3([0.0, 1.0, 0.0])).unwrap();
        let mut input = Collection::new();
        input.push(Primitive::Points(PointCloud::new(vec![Vec3::ONE])));

        let out = run(&mut Transform, &props, &Inputs::new(vec![Some(Arc::new(input))])).unwrap();
        assert_eq!(out.first_points().unwrap().1.points[0], Vec3::new(2.0, 3.0, 2.0));
        assert_eq!(
            run(&mut Transform, &props, &Inputs::new(vec![None])),
            Err(OperatorError::MissingInput(0))
        );
    }
}
