//! Resource Tests
//!
//! Tests for:
//! - OBJ parsing (fans, negative indices, texcoords/normals, errors)
//! - Procedural primitives
//! - Shader location caching and compile failures
//! - ShaderLibrary import resolution and program caching
//! - Texture unit memory across bind and unbind
//! - UniformSet ordering

use std::rc::Rc;

use anyhow::Result;
use glam::Vec3;

use arbor::assets::{Resource, ResourceTable};
use arbor::errors::{ArborError, ShaderStage};
use arbor::renderer::UniformData;
use arbor::renderer::headless::DeviceCall;
use arbor::resources::{VertexBuffer, parse_obj};
use arbor::{
    HeadlessDevice, Shader, ShaderLibrary, Texture, UniformSet, UniformValue, cube, grid,
    screen_quad,
};

// ============================================================================
// OBJ
// ============================================================================

#[test]
fn obj_quad_is_fanned_into_two_triangles() -> Result<()> {
    let text = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
    let mesh = parse_obj(text)?;
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.triangle_count(), 2);
    #[rustfmt::skip]
    let expected: Vec<f32> = vec![
        0.0, 0.0, 0.0,  1.0, 0.0, 0.0,  1.0, 1.0, 0.0,
        0.0, 0.0, 0.0,  1.0, 1.0, 0.0,  0.0, 1.0, 0.0,
    ];
    assert_eq!(mesh.position, expected);
    assert!(mesh.texcoord.is_empty());
    assert!(mesh.normal.is_empty());
    Ok(())
}

#[test]
fn obj_cube_has_twelve_triangles() -> Result<()> {
    let text = "\
v -1 -1 -1
v  1 -1 -1
v  1  1 -1
v -1  1 -1
v -1 -1  1
v  1 -1  1
v  1  1  1
v -1  1  1
f 1 2 3 4
f 5 8 7 6
f 1 5 6 2
f 2 6 7 3
f 3 7 8 4
f 4 8 5 1
";
    let mesh = parse_obj(text)?;
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.vertex_count(), 36);
    assert_eq!(mesh.position.len(), 36 * 3);
    assert!(mesh.position.iter().all(|v| v.abs() == 1.0));
    Ok(())
}

#[test]
fn obj_negative_indices_count_back() -> Result<()> {
    let text = "v 0 0 0\nv 2 0 0\nv 0 2 0\nf -3 -2 -1\n";
    let mesh = parse_obj(text)?;
    assert_eq!(mesh.position, vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    Ok(())
}

#[test]
fn obj_reads_texcoords_and_normals() -> Result<()> {
    let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";
    let mesh = parse_obj(text)?;
    assert_eq!(mesh.texcoord, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    assert_eq!(mesh.normal, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    Ok(())
}

#[test]
fn obj_skips_position_only_slashes_and_unknown_keywords() -> Result<()> {
    let text = "o plane\ns off\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nusemtl x\nf 1//1 2//1 3//1\n";
    let mesh = parse_obj(text)?;
    assert_eq!(mesh.vertex_count(), 3);
    assert!(mesh.texcoord.is_empty());
    assert_eq!(mesh.normal.len(), 9);
    Ok(())
}

#[test]
fn obj_out_of_range_index_reports_line() {
    let text = "v 0 0 0\nv 1 0 0\n\nf 1 2 3\n";
    match parse_obj(text) {
        Err(ArborError::ObjParse { line, .. }) => assert_eq!(line, 4),
        other => panic!("expected an OBJ error, got {other:?}"),
    }
}

#[test]
fn obj_rejects_bad_numbers() {
    assert!(matches!(
        parse_obj("v 0 zero 0\n"),
        Err(ArborError::ObjParse { line: 1, .. })
    ));
    assert!(matches!(
        parse_obj("v 0 0 0\nf 1 1\n"),
        Err(ArborError::ObjParse { line: 2, .. })
    ));
}

// ============================================================================
// Primitives
// ============================================================================

#[test]
fn grid_layout() {
    let buffer = grid(2);
    assert_eq!(buffer.len(), 2 * 2 * 6 * 3);
    #[rustfmt::skip]
    let first_quad: [f32; 18] = [
        0.0, 0.0, 0.0,  0.0, 0.0, 0.5,  0.5, 0.0, 0.5,
        0.0, 0.0, 0.0,  0.5, 0.0, 0.5,  0.5, 0.0, 0.0,
    ];
    assert_eq!(&buffer[..18], &first_quad[..]);
    assert!(buffer.iter().step_by(3).all(|x| (0.0..=1.0).contains(x)));
    assert!(buffer.iter().skip(1).step_by(3).all(|y| *y == 0.0));
}

#[test]
fn single_cell_grid_is_two_triangles() {
    #[rustfmt::skip]
    let expected: [f32; 18] = [
        0.0, 0.0, 0.0,  0.0, 0.0, 1.0,  1.0, 0.0, 1.0,
        0.0, 0.0, 0.0,  1.0, 0.0, 1.0,  1.0, 0.0, 0.0,
    ];
    assert_eq!(grid(1), expected.to_vec());
}

#[test]
fn cube_and_screen_quad_sizes() {
    let cube = cube();
    assert_eq!(cube.len(), 36 * 3);
    assert!(cube.iter().all(|v| v.abs() == 1.0));

    let quad = screen_quad();
    assert_eq!(quad.len(), 6 * 3);
    assert!(quad.iter().skip(2).step_by(3).all(|z| *z == 0.0));
}

#[test]
fn vertex_buffer_counts_whole_vertices() -> Result<()> {
    let mut device = HeadlessDevice::new(4, 4);
    let buffer = VertexBuffer::new(&mut device, &[0.0; 10])?;
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.vertex_count(), 3);
    Ok(())
}

// ============================================================================
// Shaders
// ============================================================================

#[test]
fn shader_caches_location_lookups() -> Result<()> {
    let mut device = HeadlessDevice::new(4, 4);
    let recorder = device.recorder();
    let shader = Shader::new(&mut device, "basic", "position time", "color")?;

    let first = shader.uniform_location(&mut device, "time");
    let second = shader.uniform_location(&mut device, "time");
    assert!(first.is_some());
    assert_eq!(first, second);

    assert!(shader.uniform_location(&mut device, "missing").is_none());
    assert!(shader.uniform_location(&mut device, "missing").is_none());

    assert_eq!(shader.attribute_location(&mut device, "position"), Some(0));
    assert_eq!(shader.attribute_location(&mut device, "position"), Some(0));

    let queries = recorder
        .calls()
        .iter()
        .filter(|c| matches!(c, DeviceCall::QueryUniform { .. } | DeviceCall::QueryAttribute { .. }))
        .count();
    assert_eq!(queries, 3);
    Ok(())
}

#[test]
fn set_uniforms_skips_names_the_program_ignores() -> Result<()> {
    let mut device = HeadlessDevice::new(4, 4);
    let recorder = device.recorder();
    let shader = Shader::new(&mut device, "basic", "position time", "color")?;
    shader.use_program(&mut device);

    let time = UniformValue::Float(1.5);
    let unused = UniformValue::Vec3(Vec3::ONE);
    shader.set_uniforms(&mut device, [("time", &time), ("unused", &unused)]);

    let set: Vec<String> = recorder
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCall::SetUniform { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(set, vec!["time".to_string()]);
    Ok(())
}

#[test]
fn compile_failure_names_the_stage() {
    let mut device = HeadlessDevice::new(4, 4);
    let result = Shader::new(&mut device, "broken", "position", "   ");
    assert!(matches!(
        result,
        Err(ArborError::ShaderCompile {
            stage: ShaderStage::Fragment,
            ..
        })
    ));
}

fn shader_table() -> ResourceTable {
    let mut table = ResourceTable::new();
    table.insert(
        "shaders/common.wgsl",
        Resource::Text("fn common() {}\n".into()),
    );
    table.insert(
        "shaders/fog.wgsl",
        Resource::Text("// import \"common.wgsl\"\nfn fog() {}\n".into()),
    );
    table.insert(
        "shaders/terrain.vert",
        Resource::Text("// import \"common.wgsl\"\n// import \"fog.wgsl\"\nposition\n".into()),
    );
    table.insert(
        "shaders/terrain.frag",
        Resource::Text("// import \"fog.wgsl\"\ncolor\n".into()),
    );
    table
}

#[test]
fn library_inlines_each_import_once() -> Result<()> {
    let table = shader_table();
    let library = ShaderLibrary::new(&table);

    let source = library.resolve("terrain.vert")?;
    assert_eq!(source.matches("fn common()").count(), 1);
    assert_eq!(source.matches("fn fog()").count(), 1);
    assert!(!source.contains("import"));
    assert!(source.find("fn common()") < source.find("fn fog()"));
    assert!(source.ends_with("position\n"));
    Ok(())
}

#[test]
fn library_caches_programs_by_source_pair() -> Result<()> {
    let table = shader_table();
    let mut library = ShaderLibrary::new(&table);
    let mut device = HeadlessDevice::new(4, 4);

    let by_base = library.get(&mut device, "terrain", None)?;
    let by_pair = library.get(&mut device, "terrain.vert", Some("terrain.frag"))?;
    assert!(Rc::ptr_eq(&by_base, &by_pair));
    assert_eq!(by_base.label(), "terrain.vert+terrain.frag");
    Ok(())
}

#[test]
fn library_reports_missing_sources() {
    let table = shader_table();
    let mut library = ShaderLibrary::new(&table);
    let mut device = HeadlessDevice::new(4, 4);

    match library.get(&mut device, "water", None) {
        Err(ArborError::ShaderSourceMissing(path)) => assert_eq!(path, "shaders/water.vert"),
        other => panic!("expected a missing source, got {other:?}"),
    }
}

// ============================================================================
// Textures
// ============================================================================

#[test]
fn texture_unbind_keeps_its_remembered_unit() -> Result<()> {
    let mut device = HeadlessDevice::new(4, 4);
    let recorder = device.recorder();
    let texture = Texture::from_rgba(&mut device, &image::RgbaImage::new(2, 2))?;
    assert_eq!(texture.unit(), None);

    texture.bind(&mut device, Some(3));
    texture.unbind(&mut device);
    assert_eq!(texture.unit(), Some(3));

    texture.bind(&mut device, None);
    let binds: Vec<_> = recorder
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCall::BindTexture { unit, texture } => Some((unit, texture.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![(3, true), (3, false), (3, true)]);
    Ok(())
}

// ============================================================================
// Uniform Sets
// ============================================================================

#[test]
fn uniform_set_keeps_insertion_order() {
    let mut set = UniformSet::new()
        .with("b", 1.0_f32)
        .with("a", 2.0_f32)
        .with("c", 3_i32);
    set.set("a", 5.0_f32);

    let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    assert_eq!(set.get("a").and_then(UniformValue::as_float), Some(5.0));
    assert_eq!(set.len(), 3);
}

#[test]
fn texture_units_resolve_to_ints() {
    let unit = UniformValue::TextureUnit(3);
    assert_eq!(unit.data(), Some(UniformData::Int(3)));

    let unbound = UniformValue::Sampler(arbor::resources::TextureBinding::Texture(Rc::new(
        Texture::from_rgba(&mut HeadlessDevice::new(4, 4), &image::RgbaImage::new(1, 1))
            .unwrap(),
    )));
    assert_eq!(unbound.data(), None);
}
