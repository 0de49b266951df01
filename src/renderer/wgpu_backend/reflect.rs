//! WGSL interface reflection.
//!
//! Programs are plain WGSL modules. Everything the scene graph addresses by
//! name is declared in bind group 0:
//!
//! ```wgsl
//! struct Uniforms { projection: mat4x4<f32>, clip: f32 }
//! @group(0) @binding(0) var<uniform> u: Uniforms;
//! @group(0) @binding(1) var heightmap: texture_2d<f32>;
//! @group(0) @binding(2) var heightmap_sampler: sampler;
//! ```
//!
//! Uniform names are the member names of the single uniform struct. A
//! texture's sampler is found by the `<texture>_sampler` naming convention.
//! Vertex attribute names are the names of the `@location` inputs of the
//! vertex entry point, either as arguments or as members of an input struct.

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{
    AddressSpace, Binding, ImageDimension, Module, ScalarKind, ShaderStage as NagaStage, TypeInner,
    VectorSize,
};
use rustc_hash::FxHashMap;

use crate::errors::{ArborError, Result, ShaderStage};

/// How a uniform struct member is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Float,
    Int,
    Vec3,
    Vec4,
    /// Three 16-byte columns.
    Mat3,
    Mat4,
    /// Anything the engine has no value type for.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub binding: u32,
    pub size: u32,
    pub members: Vec<UniformMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
    pub sampler: Option<u32>,
}

/// Group 0 interface and entry point of one shader stage.
#[derive(Debug, Clone)]
pub struct StageInterface {
    pub entry_point: String,
    pub uniforms: Option<UniformBlock>,
    pub textures: Vec<TextureSlot>,
    /// `@location` inputs by name (vertex stage only).
    pub inputs: FxHashMap<String, u32>,
    /// Locations read from the previous stage (fragment) or written to the
    /// next one (vertex).
    pub varyings: Vec<u32>,
}

/// Parses and validates one stage, then extracts its interface.
pub fn reflect(source: &str, stage: ShaderStage) -> Result<(Module, StageInterface)> {
    let compile_error = |message: String| ArborError::ShaderCompile { stage, message };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;

    let wanted = match stage {
        ShaderStage::Vertex => NagaStage::Vertex,
        ShaderStage::Fragment => NagaStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .ok_or_else(|| compile_error(format!("no @{stage} entry point")))?;

    let mut interface = StageInterface {
        entry_point: entry.name.clone(),
        uniforms: None,
        textures: Vec::new(),
        inputs: FxHashMap::default(),
        varyings: Vec::new(),
    };

    let mut samplers: FxHashMap<&str, u32> = FxHashMap::default();
    for (_, global) in module.global_variables.iter() {
        let (Some(binding), Some(name)) = (&global.binding, &global.name) else {
            continue;
        };
        if binding.group != 0 {
            log::warn!("'{name}' is in bind group {}, only group 0 is bound", binding.group);
            continue;
        }
        match (&global.space, &module.types[global.ty].inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span }) => {
                if interface.uniforms.is_some() {
                    return Err(compile_error(format!(
                        "more than one uniform block in group 0 ('{name}')"
                    )));
                }
                interface.uniforms = Some(UniformBlock {
                    binding: binding.binding,
                    size: *span,
                    members: members
                        .iter()
                        .filter_map(|m| {
                            Some(UniformMember {
                                name: m.name.clone()?,
                                offset: m.offset,
                                kind: member_kind(&module.types[m.ty].inner),
                            })
                        })
                        .collect(),
                });
            }
            (AddressSpace::Handle, TypeInner::Image { dim, arrayed, .. }) => {
                if *dim != ImageDimension::D2 || *arrayed {
                    return Err(compile_error(format!("'{name}' must be a texture_2d")));
                }
                interface.textures.push(TextureSlot {
                    name: name.clone(),
                    binding: binding.binding,
                    sampler: None,
                });
            }
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => {
                samplers.insert(name.as_str(), binding.binding);
            }
            _ => log::warn!("Unsupported binding '{name}' ignored"),
        }
    }
    for texture in &mut interface.textures {
        texture.sampler = samplers.get(format!("{}_sampler", texture.name).as_str()).copied();
    }

    let function = &entry.function;
    match stage {
        ShaderStage::Vertex => {
            for arg in &function.arguments {
                let name = arg.name.as_deref();
                collect_locations(&module, name, arg.ty, arg.binding.as_ref(), &mut |name, loc| {
                    interface.inputs.insert(name.to_owned(), loc);
                });
            }
            if let Some(result) = &function.result {
                collect_locations(&module, None, result.ty, result.binding.as_ref(), &mut |_, loc| {
                    interface.varyings.push(loc);
                });
            }
        }
        ShaderStage::Fragment => {
            for arg in &function.arguments {
                let name = arg.name.as_deref();
                collect_locations(&module, name, arg.ty, arg.binding.as_ref(), &mut |_, loc| {
                    interface.varyings.push(loc);
                });
            }
        }
    }

    Ok((module, interface))
}

/// Calls `f` for every `@location` binding of a value, looking one level
/// into structs.
fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    f: &mut dyn FnMut(&str, u32),
) {
    match binding {
        Some(Binding::Location { location, .. }) => f(name.unwrap_or_default(), *location),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(Binding::Location { location, .. }) = &member.binding {
                        f(member.name.as_deref().unwrap_or_default(), *location);
                    }
                }
            }
        }
    }
}

fn member_kind(inner: &TypeInner) -> MemberKind {
    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => MemberKind::Float,
            ScalarKind::Sint | ScalarKind::Uint => MemberKind::Int,
            _ => MemberKind::Other,
        },
        TypeInner::Vector { size: VectorSize::Tri, scalar } if scalar.kind == ScalarKind::Float => {
            MemberKind::Vec3
        }
        TypeInner::Vector { size: VectorSize::Quad, scalar } if scalar.kind == ScalarKind::Float => {
            MemberKind::Vec4
        }
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            ..
        } => MemberKind::Mat3,
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => MemberKind::Mat4,
        _ => MemberKind::Other,
    }
}

/// Interface of a linked program: both stages merged into one group 0.
#[derive(Debug, Clone, Default)]
pub struct ProgramInterface {
    pub uniforms: Option<UniformBlock>,
    pub textures: Vec<TextureSlot>,
    pub inputs: FxHashMap<String, u32>,
}

/// Checks that the two stages agree on everything they share and merges
/// their group 0 declarations.
pub fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<ProgramInterface> {
    for location in &fragment.varyings {
        if !vertex.varyings.contains(location) {
            return Err(ArborError::ShaderLink(format!(
                "fragment input @location({location}) is not written by the vertex stage"
            )));
        }
    }

    let uniforms = match (&vertex.uniforms, &fragment.uniforms) {
        (Some(a), Some(b)) => Some(merge_blocks(a, b)?),
        (a, b) => a.clone().or_else(|| b.clone()),
    };

    let mut textures = vertex.textures.clone();
    for slot in &fragment.textures {
        match textures.iter().find(|t| t.name == slot.name) {
            Some(existing) if existing != slot => {
                return Err(ArborError::ShaderLink(format!(
                    "texture '{}' is bound differently in the two stages",
                    slot.name
                )));
            }
            Some(_) => {}
            None => textures.push(slot.clone()),
        }
    }

    let mut used: FxHashMap<u32, &str> = FxHashMap::default();
    let block = uniforms.as_ref().map(|b| (b.binding, "uniform block"));
    let slots = textures.iter().flat_map(|t| {
        std::iter::once((t.binding, t.name.as_str())).chain(t.sampler.map(|s| (s, t.name.as_str())))
    });
    for (binding, owner) in block.into_iter().chain(slots) {
        if let Some(other) = used.insert(binding, owner)
            && other != owner
        {
            return Err(ArborError::ShaderLink(format!(
                "@binding({binding}) is claimed by both '{other}' and '{owner}'"
            )));
        }
    }

    Ok(ProgramInterface {
        uniforms,
        textures,
        inputs: vertex.inputs.clone(),
    })
}

fn merge_blocks(a: &UniformBlock, b: &UniformBlock) -> Result<UniformBlock> {
    if a.binding != b.binding {
        return Err(ArborError::ShaderLink(format!(
            "uniform block is @binding({}) in the vertex stage and @binding({}) in the fragment stage",
            a.binding, b.binding
        )));
    }
    let mut merged = a.clone();
    for member in &b.members {
        match merged.members.iter().find(|m| m.name == member.name) {
            Some(existing) if existing != member => {
                return Err(ArborError::ShaderLink(format!(
                    "uniform '{}' has a different layout in the two stages",
                    member.name
                )));
            }
            Some(_) => {}
            None => merged.members.push(member.clone()),
        }
    }
    merged.size = a.size.max(b.size);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"
struct Uniforms { projection: mat4x4<f32>, clip: f32 }
@group(0) @binding(0) var<uniform> u: Uniforms;

struct Out { @builtin(position) clip_position: vec4<f32>, @location(0) height: f32 }

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> Out {
    var out: Out;
    out.clip_position = u.projection * vec4<f32>(position, 1.0);
    out.height = position.y;
    return out;
}
";

    const FRAGMENT: &str = r"
struct Uniforms { projection: mat4x4<f32>, clip: f32 }
@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var heightmap: texture_2d<f32>;
@group(0) @binding(2) var heightmap_sampler: sampler;

@fragment
fn fs_main(@location(0) height: f32) -> @location(0) vec4<f32> {
    let h = textureSample(heightmap, heightmap_sampler, vec2<f32>(height, u.clip)).r;
    return vec4<f32>(h, h, h, 1.0);
}
";

    #[test]
    fn reflects_uniforms_textures_and_inputs() {
        let (_, vs) = reflect(VERTEX, ShaderStage::Vertex).unwrap();
        let (_, fs) = reflect(FRAGMENT, ShaderStage::Fragment).unwrap();

        assert_eq!(vs.entry_point, "vs_main");
        assert_eq!(vs.inputs.get("position"), Some(&0));
        assert_eq!(vs.varyings, vec![0]);

        let block = fs.uniforms.as_ref().unwrap();
        assert_eq!(block.members[0].kind, MemberKind::Mat4);
        assert_eq!(block.members[1].name, "clip");
        assert_eq!(block.members[1].offset, 64);
        assert_eq!(fs.textures[0].sampler, Some(2));

        let program = link(&vs, &fs).unwrap();
        assert_eq!(program.textures.len(), 1);
        assert_eq!(program.uniforms.unwrap().members.len(), 2);
    }

    #[test]
    fn syntax_error_names_the_stage() {
        let err = reflect("fn broken(", ShaderStage::Fragment).unwrap_err();
        assert!(matches!(
            err,
            ArborError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn link_rejects_unwritten_varying() {
        let (_, vs) = reflect(VERTEX, ShaderStage::Vertex).unwrap();
        let (_, mut fs) = reflect(FRAGMENT, ShaderStage::Fragment).unwrap();
        fs.varyings.push(3);
        assert!(matches!(link(&vs, &fs), Err(ArborError::ShaderLink(_))));
    }
}
