//! Scene Graph Traversal Tests
//!
//! Tests for:
//! - Uniform scope shadowing and restoration
//! - Material / Uniforms / SimpleMesh draw state
//! - Transform composition order and Mirror culling
//! - RenderTarget redirection and viewport restoration
//! - Texture unit allocation across nested nodes
//! - Stack balance on success, on child failure and on misbehaving nodes
//! - Stereo drawing, one visit per eye

use std::rc::Rc;

use anyhow::Result;
use glam::{Mat4, Vec3, Vec4};
use image::RgbaImage;

use arbor::errors::ArborError;
use arbor::nodes;
use arbor::renderer::headless::{DeviceCall, Recorder};
use arbor::renderer::{CullFace, UniformData};
use arbor::scene::{
    Camera, CameraRig, Graph, Material, Mirror, Node, RenderTarget, SideBySideSession,
    SimpleMesh, StereoTarget, Transform, UniformScope, Uniforms, XrFrame, XrLayer, XrSession,
};
use arbor::{FrameBuffer, HeadlessDevice, Shader, Texture, UniformSet, UniformValue, Viewport, grid};

const VERTEX: &str = "position modelTransform projection eye time";
const FRAGMENT: &str = "color diffuse detail";

fn graph() -> (Graph, Recorder) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = HeadlessDevice::new(800, 600);
    let recorder = device.recorder();
    (Graph::new(Box::new(device)), recorder)
}

fn shader(graph: &mut Graph, label: &str) -> Result<Rc<Shader>> {
    Ok(Rc::new(Shader::new(graph.device(), label, VERTEX, FRAGMENT)?))
}

fn quad(graph: &mut Graph) -> Result<SimpleMesh> {
    Ok(SimpleMesh::from_positions(graph.device(), &grid(1))?)
}

fn mat4(data: Option<&UniformData>) -> Mat4 {
    match data {
        Some(UniformData::Mat4(m)) => *m,
        other => panic!("expected a Mat4 uniform, got {other:?}"),
    }
}

// ============================================================================
// Uniform Scope
// ============================================================================

#[test]
fn scope_child_shadows_parent() {
    let root = UniformScope::root();
    root.set("a", UniformValue::Float(1.0));
    root.set("b", UniformValue::Float(5.0));

    let child = UniformScope::child(&root);
    child.set("a", UniformValue::Float(2.0));

    assert_eq!(child.get("a").and_then(|v| v.as_float()), Some(2.0));
    assert_eq!(child.get("b").and_then(|v| v.as_float()), Some(5.0));
    assert_eq!(root.get("a").and_then(|v| v.as_float()), Some(1.0));
    assert!(child.has_local("a"));
    assert!(!child.has_local("b"));
    assert_eq!(child.depth(), 1);

    let flat = child.flatten();
    assert_eq!(flat.len(), 2);
    assert_eq!(flat["a"].as_float(), Some(2.0));
}

#[test]
fn pop_discards_child_values() {
    let (mut graph, _) = graph();
    graph.set_uniform("time", 1.0_f32);
    graph.push_uniforms();
    graph.set_uniform("time", 9.0_f32);
    graph.set_uniform("local", 3.0_f32);
    assert_eq!(graph.uniform("time").and_then(|v| v.as_float()), Some(9.0));

    graph.pop_uniforms().unwrap();
    assert_eq!(graph.uniform("time").and_then(|v| v.as_float()), Some(1.0));
    assert!(graph.uniform("local").is_none());
}

#[test]
fn pop_past_root_is_an_error() {
    let (mut graph, _) = graph();
    assert!(matches!(graph.pop_uniforms(), Err(ArborError::ScopeUnderflow)));
}

// ============================================================================
// Materials and Meshes
// ============================================================================

#[test]
fn mesh_draws_with_every_visible_uniform() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;

    let material = Material::new(
        shader,
        UniformSet::new().with("color", Vec4::new(1.0, 0.5, 0.25, 1.0)),
        nodes![mesh],
    );
    let globals = Uniforms::new(UniformSet::new().with("time", 2.5_f32), nodes![material]);
    graph.root_mut().append(globals);

    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.first, 0);
    assert_eq!(draw.count, 6);
    assert_eq!(draw.viewport, Viewport::full(800, 600));
    assert_eq!(draw.uniform("time"), Some(&UniformData::Float(2.5)));
    assert_eq!(
        draw.uniform("color"),
        Some(&UniformData::Vec4(Vec4::new(1.0, 0.5, 0.25, 1.0)))
    );
    assert_eq!(draw.vertex_buffers.len(), 1);
    Ok(())
}

#[test]
fn mesh_detaches_its_buffers_after_drawing() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    graph
        .root_mut()
        .append(Material::new(shader, UniformSet::new(), nodes![mesh]));

    graph.draw(None)?;

    let calls = recorder.calls();
    let draw_at = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::Draw(_)))
        .unwrap();
    assert!(calls[draw_at..].iter().any(|c| matches!(
        c,
        DeviceCall::BindVertexBuffer { buffer: None, .. }
    )));
    Ok(())
}

#[test]
fn unused_attributes_are_skipped() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let normals = Rc::new(arbor::resources::VertexBuffer::new(graph.device(), &grid(1))?);
    let mesh = quad(&mut graph)?.with_attribute("normal", normals);
    graph
        .root_mut()
        .append(Material::new(shader, UniformSet::new(), nodes![mesh]));

    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertex_buffers.len(), 1);
    Ok(())
}

#[test]
fn mesh_without_shader_fails() -> Result<()> {
    let (mut graph, _) = graph();
    let mesh = quad(&mut graph)?;
    graph.root_mut().append(mesh);

    let result = graph.draw(None);
    assert!(matches!(result, Err(ArborError::NoActiveShader)));
    Ok(())
}

#[test]
fn inner_material_hands_program_back_to_outer() -> Result<()> {
    let (mut graph, recorder) = graph();
    let outer_shader = shader(&mut graph, "outer")?;
    let inner_shader = shader(&mut graph, "inner")?;
    let inner_mesh = quad(&mut graph)?;
    let outer_mesh = quad(&mut graph)?;

    let inner = Material::new(Rc::clone(&inner_shader), UniformSet::new(), nodes![inner_mesh]);
    let outer = Material::new(
        Rc::clone(&outer_shader),
        UniformSet::new(),
        nodes![inner, outer_mesh],
    );
    graph.root_mut().append(outer);

    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].program, inner_shader.program());
    assert_eq!(draws[1].program, outer_shader.program());
    Ok(())
}

// ============================================================================
// Transforms
// ============================================================================

#[test]
fn nested_transforms_compose_parent_first() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;

    let inner = Transform::new(nodes![mesh]).with_matrix(Mat4::from_scale(Vec3::splat(2.0)));
    let outer = Transform::new(nodes![inner])
        .with_matrix(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    graph
        .root_mut()
        .append(Material::new(shader, UniformSet::new(), nodes![outer]));

    graph.draw(None)?;

    let model = mat4(recorder.draws()[0].uniform("modelTransform"));
    let point = model.transform_point3(Vec3::new(1.0, 0.0, 0.0));
    assert!(point.abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1e-5), "got {point}");
    Ok(())
}

#[test]
fn transform_methods_apply_before_existing_matrix() {
    let mut transform = Transform::new(Vec::new());
    transform.translate(Vec3::new(0.0, 5.0, 0.0));
    transform.scale(Vec3::splat(3.0));

    let point = transform.matrix.transform_point3(Vec3::ONE);
    assert!(point.abs_diff_eq(Vec3::new(3.0, 8.0, 3.0), 1e-5), "got {point}");
}

#[test]
fn mirror_flips_and_culls_front_faces() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    graph.root_mut().append(Material::new(
        shader,
        UniformSet::new(),
        nodes![Mirror::new(nodes![mesh])],
    ));

    graph.draw(None)?;

    let draw = &recorder.draws()[0];
    assert_eq!(draw.cull_face, CullFace::Front);
    let model = mat4(draw.uniform("modelTransform"));
    let point = model.transform_point3(Vec3::new(0.0, 2.0, 0.0));
    assert!(point.abs_diff_eq(Vec3::new(0.0, -2.0, 0.0), 1e-5));

    assert_eq!(graph.cull_face(), CullFace::Back);
    let last_cull = recorder.calls().into_iter().rev().find_map(|c| match c {
        DeviceCall::CullFace(face) => Some(face),
        _ => None,
    });
    assert_eq!(last_cull, Some(CullFace::Back));
    Ok(())
}

#[test]
fn mirror_with_matrix_keeps_the_flip() {
    let offset = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
    let mirror = Mirror::new(nodes![]).with_matrix(offset);

    let point = mirror.matrix().transform_point3(Vec3::new(1.0, 2.0, 3.0));
    assert!(point.abs_diff_eq(Vec3::new(1.0, 3.0, 3.0), 1e-5), "got {point}");
}

#[test]
fn shared_subtree_draws_under_each_parent() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let shared = Rc::new(Transform::new(nodes![quad(&mut graph)?]));

    graph.root_mut().append(Material::new(
        shader,
        UniformSet::new(),
        nodes![Rc::clone(&shared), Mirror::new(nodes![Rc::clone(&shared)])],
    ));
    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].cull_face, CullFace::Back);
    assert_eq!(draws[1].cull_face, CullFace::Front);
    assert_eq!(Rc::strong_count(&shared), 3);
    Ok(())
}

// ============================================================================
// Camera
// ============================================================================

#[test]
fn camera_publishes_projection_and_eye() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;

    let rig = CameraRig::at(Vec3::new(0.0, 10.0, 50.0)).into_handle();
    let camera = Camera::with_rig(
        Rc::clone(&rig),
        nodes![Material::new(shader, UniformSet::new(), nodes![mesh])],
    );
    graph.root_mut().append(camera);

    graph.draw(None)?;

    let draw = &recorder.draws()[0];
    assert_eq!(
        draw.uniform("eye"),
        Some(&UniformData::Vec3(Vec3::new(0.0, 10.0, 50.0)))
    );
    let expected = rig.borrow().view_projection(Viewport::full(800, 600), None);
    assert!(mat4(draw.uniform("projection")).abs_diff_eq(expected, 1e-5));
    Ok(())
}

// ============================================================================
// Render Targets
// ============================================================================

#[test]
fn render_target_redirects_then_restores() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    let target = Rc::new(FrameBuffer::new(graph.device(), 256, 128)?);

    graph.root_mut().append(RenderTarget::new(
        Rc::clone(&target),
        nodes![Material::new(shader, UniformSet::new(), nodes![mesh])],
    ));
    recorder.clear();

    graph.draw(None)?;

    let draw = &recorder.draws()[0];
    assert_eq!(draw.framebuffer, Some(target.key()));
    assert_eq!(draw.viewport, Viewport::full(256, 128));

    let calls = recorder.calls();
    let bound = calls
        .iter()
        .position(|c| *c == DeviceCall::BindFramebuffer(Some(target.key())))
        .unwrap();
    assert_eq!(calls[bound + 1], DeviceCall::Viewport(Viewport::full(256, 128)));
    assert!(matches!(calls[bound + 2], DeviceCall::Clear { depth, .. } if depth == 1.0));

    let tail: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, DeviceCall::BindFramebuffer(_) | DeviceCall::Viewport(_)))
        .rev()
        .take(2)
        .cloned()
        .collect();
    assert_eq!(
        tail,
        vec![
            DeviceCall::Viewport(Viewport::full(800, 600)),
            DeviceCall::BindFramebuffer(None),
        ]
    );
    assert_eq!(graph.framebuffer(), None);
    assert_eq!(graph.viewport(), Viewport::full(800, 600));
    Ok(())
}

#[test]
fn nested_render_target_restores_outer_target_and_viewport() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let inner_mesh = quad(&mut graph)?;
    let outer_mesh = quad(&mut graph)?;
    let outer = Rc::new(FrameBuffer::new(graph.device(), 256, 128)?);
    let inner = Rc::new(FrameBuffer::new(graph.device(), 64, 32)?);

    graph.root_mut().append(Material::new(
        shader,
        UniformSet::new(),
        nodes![RenderTarget::new(
            Rc::clone(&outer),
            nodes![
                RenderTarget::new(Rc::clone(&inner), nodes![inner_mesh]),
                outer_mesh,
            ],
        )],
    ));

    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].framebuffer, Some(inner.key()));
    assert_eq!(draws[0].viewport, Viewport::full(64, 32));
    assert_eq!(draws[1].framebuffer, Some(outer.key()));
    assert_eq!(draws[1].viewport, Viewport::full(256, 128));

    assert_eq!(graph.framebuffer(), None);
    assert_eq!(graph.active_viewport(), Viewport::full(800, 600));
    Ok(())
}

#[test]
fn framebuffer_output_is_sampled_by_a_later_pass() -> Result<()> {
    let (mut graph, recorder) = graph();
    let scene_shader = shader(&mut graph, "scene")?;
    let screen_shader = shader(&mut graph, "screen")?;
    let scene_mesh = quad(&mut graph)?;
    let screen_mesh = quad(&mut graph)?;
    let target = Rc::new(FrameBuffer::new(graph.device(), 64, 64)?);

    graph.root_mut().append(RenderTarget::new(
        Rc::clone(&target),
        nodes![Material::new(scene_shader, UniformSet::new(), nodes![scene_mesh])],
    ));
    graph.root_mut().append(Material::new(
        screen_shader,
        UniformSet::new().with("diffuse", Rc::clone(&target)),
        nodes![screen_mesh],
    ));

    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[1].framebuffer, None);
    assert_eq!(draws[1].textures, vec![(0, target.color())]);
    assert_eq!(draws[1].uniform("diffuse"), Some(&UniformData::Int(0)));
    assert_eq!(graph.texture_units(), 0);
    Ok(())
}

// ============================================================================
// Texture Units
// ============================================================================

#[test]
fn nested_textures_take_consecutive_units() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    let diffuse = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(4, 4))?);
    let detail = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(8, 8))?);

    let material = Material::new(
        shader,
        UniformSet::new().with("detail", Rc::clone(&detail)),
        nodes![mesh],
    );
    let globals = Uniforms::new(
        UniformSet::new().with("diffuse", Rc::clone(&diffuse)),
        nodes![material],
    );
    graph.root_mut().append(globals);

    graph.draw(None)?;

    let draw = &recorder.draws()[0];
    assert_eq!(draw.uniform("diffuse"), Some(&UniformData::Int(0)));
    assert_eq!(draw.uniform("detail"), Some(&UniformData::Int(1)));
    assert_eq!(draw.textures, vec![(0, diffuse.key()), (1, detail.key())]);

    let released: Vec<u32> = recorder
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::BindTexture { unit, texture: None } => Some(*unit),
            _ => None,
        })
        .collect();
    assert_eq!(released, vec![1, 0]);
    assert_eq!(graph.texture_units(), 0);
    Ok(())
}

#[test]
fn sibling_materials_reuse_units() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let texture = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(2, 2))?);

    for _ in 0..2 {
        let mesh = quad(&mut graph)?;
        graph.root_mut().append(Material::new(
            Rc::clone(&shader),
            UniformSet::new().with("diffuse", Rc::clone(&texture)),
            nodes![mesh],
        ));
    }

    graph.draw(None)?;

    for draw in recorder.draws() {
        assert_eq!(draw.uniform("diffuse"), Some(&UniformData::Int(0)));
    }
    Ok(())
}

#[test]
fn two_texture_material_then_one_texture_sibling() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let diffuse = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(2, 2))?);
    let detail = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(4, 4))?);
    let first_mesh = quad(&mut graph)?;
    let second_mesh = quad(&mut graph)?;

    graph.root_mut().append(Material::new(
        Rc::clone(&shader),
        UniformSet::new()
            .with("diffuse", Rc::clone(&diffuse))
            .with("detail", Rc::clone(&detail)),
        nodes![first_mesh],
    ));
    graph.root_mut().append(Material::new(
        shader,
        UniformSet::new().with("detail", Rc::clone(&detail)),
        nodes![second_mesh],
    ));
    let start = graph.texture_units();

    graph.draw(None)?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].uniform("diffuse"), Some(&UniformData::Int(0)));
    assert_eq!(draws[0].uniform("detail"), Some(&UniformData::Int(1)));
    assert_eq!(draws[0].textures, vec![(0, diffuse.key()), (1, detail.key())]);

    assert_eq!(draws[1].uniform("detail"), Some(&UniformData::Int(0)));
    assert_eq!(draws[1].textures, vec![(0, detail.key())]);
    assert_eq!(graph.texture_units(), start);
    Ok(())
}

// ============================================================================
// Stack Balance
// ============================================================================

#[test]
fn stacks_are_balanced_after_a_frame() -> Result<()> {
    let (mut graph, _) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    let texture = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(2, 2))?);
    let before = graph.stack_state();

    graph.root_mut().append(Camera::new(nodes![Transform::new(nodes![
        Material::new(shader, UniformSet::new().with("diffuse", texture), nodes![mesh])
    ])]));
    graph.draw(None)?;

    assert_eq!(graph.stack_state(), before);
    assert!(graph.shader().is_none());
    Ok(())
}

#[test]
fn failing_child_still_unwinds_ancestors() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let texture = Rc::new(Texture::from_rgba(graph.device(), &RgbaImage::new(2, 2))?);
    let before = graph.stack_state();

    graph.root_mut().append(Transform::new(nodes![Material::new(
        shader,
        UniformSet::new().with("diffuse", texture),
        nodes![SimpleMesh::new()],
    )]));

    let result = graph.draw(None);
    assert!(matches!(result, Err(ArborError::MissingAttribute(ref name)) if name == "position"));
    assert_eq!(graph.stack_state(), before);
    assert_eq!(recorder.calls().last(), Some(&DeviceCall::EndFrame));
    Ok(())
}

struct LeakyScope;

impl Node for LeakyScope {
    fn enter(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> arbor::Result<()> {
        graph.push_uniforms();
        Ok(())
    }
}

#[test]
fn unbalanced_node_is_reported() {
    if !cfg!(debug_assertions) {
        return;
    }
    let (mut graph, _) = graph();
    graph.root_mut().append(LeakyScope);

    let result = graph.draw(None);
    assert!(matches!(
        result,
        Err(ArborError::UnbalancedTraversal {
            what: "uniform scope depth",
            before: 0,
            after: 1,
        })
    ));
}

// ============================================================================
// Stereo
// ============================================================================

#[test]
fn stereo_frame_visits_once_per_eye() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    graph.root_mut().append(Camera::new(nodes![Material::new(
        shader,
        UniformSet::new(),
        nodes![mesh]
    )]));

    let mut session = SideBySideSession::new(800, 600);
    let frame = session.request_frame(0.0).unwrap();
    graph.draw(Some(&frame))?;

    let draws = recorder.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].viewport, Viewport::new(0, 0, 400, 600));
    assert_eq!(draws[1].viewport, Viewport::new(400, 0, 400, 600));

    let left = draws[0].uniform("eye");
    let right = draws[1].uniform("eye");
    assert_ne!(left, right);
    assert!(graph.current_view().is_none());
    Ok(())
}

#[test]
fn stereo_target_binds_the_xr_layer() -> Result<()> {
    let (mut graph, recorder) = graph();
    let shader = shader(&mut graph, "basic")?;
    let mesh = quad(&mut graph)?;
    let layer = Rc::new(FrameBuffer::new(graph.device(), 800, 600)?);
    graph.attach_xr_layer(XrLayer {
        framebuffer: Some(layer.key()),
    });
    graph.root_mut().append(StereoTarget::new(nodes![Material::new(
        shader,
        UniformSet::new(),
        nodes![mesh]
    )]));

    let frame = SideBySideSession::new(800, 600).request_frame(0.0).unwrap();
    graph.draw(Some(&frame))?;
    for draw in recorder.draws() {
        assert_eq!(draw.framebuffer, Some(layer.key()));
    }
    assert_eq!(graph.framebuffer(), None);

    recorder.clear();
    graph.draw(None)?;
    assert_eq!(recorder.draws()[0].framebuffer, None);
    Ok(())
}

#[test]
fn stereo_target_without_layer_fails() -> Result<()> {
    let (mut graph, _) = graph();
    graph.root_mut().append(StereoTarget::new(Vec::new()));

    let frame = SideBySideSession::new(800, 600).request_frame(0.0).unwrap();
    let result = graph.draw(Some(&frame));
    assert!(matches!(result, Err(ArborError::XrUnavailable)));
    Ok(())
}
