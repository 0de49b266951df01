//! Terrain demo.
//!
//! An island heightmap surrounded by water that reflects and refracts it,
//! a gradient sky, a plane that rides along with the camera and a bloom
//! chain over the final image. Fly with WASD and drag with the left mouse
//! button to look around. Pass `--stereo` for a side-by-side stereo view.

mod textures;

use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use serde::Deserialize;

use arbor::app::runner::Window;
use arbor::renderer::ColorFormat;
use arbor::scene::{CameraHandle, Group, SideBySideSession, StereoTarget, UniformHandle, XrSession};
use arbor::{
    App, AppHandler, Camera, CameraFixTransform, CameraRig, Clock, FlyController, FrameBuffer,
    Graph, Input, Loader, Material, Mirror, PostProcess, RenderSettings, RenderTarget,
    ResourceTable, ShaderLibrary, SimpleMesh, Skybox, Texture, Transform, UniformSet, Uniforms,
    grid, nodes,
};

const ASSET_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets");

const ASSETS: &[&str] = &[
    "scene.json",
    "obj/plane.obj",
    "shaders/sun.wgsl",
    "shaders/screen.wgsl",
    "shaders/blur.wgsl",
    "shaders/terrain.wgsl",
    "shaders/terrain.vert",
    "shaders/terrain.frag",
    "shaders/water.wgsl",
    "shaders/water.vert",
    "shaders/water.frag",
    "shaders/sky.wgsl",
    "shaders/sky.vert",
    "shaders/sky.frag",
    "shaders/plane.wgsl",
    "shaders/plane.vert",
    "shaders/plane.frag",
    "shaders/screen.vert",
    "shaders/screen.frag",
    "shaders/brightpass.frag",
    "shaders/hblur.frag",
    "shaders/vblur.frag",
];

/// Tunables read from `assets/scene.json`.
#[derive(Debug, Deserialize)]
struct SceneConfig {
    terrain_resolution: u32,
    terrain_size: f32,
    terrain_height: f32,
    terrain_base: f32,
    water_resolution: u32,
    far_away: f32,
    camera_position: [f32; 3],
    camera_speed: f32,
    clip: f32,
    sun_color: [f32; 3],
    sun_direction: [f32; 3],
    sky_color: [f32; 3],
    ground_color: [f32; 3],
    horizon_color: [f32; 3],
    water_color: [f32; 3],
    plane_color: [f32; 3],
}

struct Terrain {
    camera: CameraHandle,
    controller: FlyController,
    globals: UniformHandle,
    time: f32,
}

impl AppHandler for Terrain {
    fn init(graph: &mut Graph, clock: &mut Clock, window: &Arc<Window>) -> arbor::Result<Self> {
        // 1. Load every text asset up front
        let mut loader = Loader::new(ASSET_ROOT)?;
        loader.load(ASSETS.iter().copied());
        let resources = loader.finish()?;
        let config: SceneConfig = resources.json_as("scene.json")?;

        // 2. Build the scene
        let camera = CameraRig {
            far: config.far_away * 2.0,
            ..CameraRig::at(Vec3::from(config.camera_position))
        }
        .into_handle();
        let (scene, globals) = build_scene(graph, &resources, &config, &camera)?;

        // 3. Optional stereo output
        if std::env::args().any(|arg| arg == "--stereo") {
            let size = window.inner_size();
            let mut session = SideBySideSession::new(size.width, size.height);
            {
                let rig = camera.borrow();
                session.set_depth_range(rig.near, rig.far);
            }
            graph.attach_xr_layer(session.layer());
            clock.attach_session(Box::new(session));
            log::info!("Side-by-side stereo enabled");
        }
        graph.root_mut().append(StereoTarget::new(nodes![scene]));

        Ok(Self {
            camera,
            controller: FlyController::new().with_speed(config.camera_speed),
            globals,
            time: 0.0,
        })
    }

    fn update(&mut self, _graph: &mut Graph, input: &Input, _clock: &Clock, dt: f32) {
        self.time += dt;
        self.globals.borrow_mut().set("time", self.time);
        self.controller.update(&mut self.camera.borrow_mut(), input);
    }
}

fn build_scene(
    graph: &mut Graph,
    resources: &ResourceTable,
    config: &SceneConfig,
    camera: &CameraHandle,
) -> arbor::Result<(Group, UniformHandle)> {
    let mut shaders = ShaderLibrary::new(resources);
    let device = graph.device();

    // ========================================================================
    // Textures and framebuffers
    // ========================================================================

    let heightmap = Rc::new(Texture::from_rgba(
        device,
        &textures::heightmap(config.terrain_resolution),
    )?);
    let water_noise = Rc::new(Texture::from_rgba(device, &textures::water_noise(256))?);
    let snow = Rc::new(Texture::from_rgba(device, &textures::snow(256))?);

    let refraction = Rc::new(FrameBuffer::new(device, 1024, 512)?);
    let reflection = Rc::new(FrameBuffer::new(device, 1024, 1024)?);
    let combined = Rc::new(FrameBuffer::with_format(
        device,
        2048,
        1024,
        ColorFormat::Rgba16Float,
    )?);
    let bloom = [
        Rc::new(FrameBuffer::with_format(device, 512, 256, ColorFormat::Rgba16Float)?),
        Rc::new(FrameBuffer::with_format(device, 512, 256, ColorFormat::Rgba16Float)?),
    ];

    // ========================================================================
    // Geometry
    // ========================================================================

    let mountain = {
        let shader = shaders.get(device, "terrain", None)?;
        let mesh = SimpleMesh::from_positions(device, &grid(config.terrain_resolution))?;
        let material = Material::new(
            shader,
            UniformSet::new()
                .with("heightmap", heightmap)
                .with("snowTexture", snow),
            nodes![mesh],
        );
        let size = config.terrain_size;
        let matrix = Mat4::from_translation(Vec3::new(-size * 0.5, config.terrain_base, -size * 0.5))
            * Mat4::from_scale(Vec3::new(size, config.terrain_height, size));
        Rc::new(Transform::new(nodes![material]).with_matrix(matrix))
    };

    let sky = {
        let shader = shaders.get(device, "sky", None)?;
        let skybox = Skybox::new(
            device,
            shader,
            UniformSet::new().with("horizonColor", Vec3::from(config.horizon_color)),
        )?;
        let matrix = Mat4::from_translation(Vec3::new(0.0, -200.0, 0.0))
            * Mat4::from_scale(Vec3::splat(config.far_away));
        Rc::new(Transform::new(nodes![skybox]).with_matrix(matrix))
    };

    let water = {
        let shader = shaders.get(device, "water", None)?;
        let mesh = SimpleMesh::from_positions(device, &grid(config.water_resolution))?;
        let material = Material::new(
            shader,
            UniformSet::new()
                .with("color", Vec3::from(config.water_color))
                .with("waterNoise", water_noise)
                .with("reflection", Rc::clone(&reflection))
                .with("refraction", Rc::clone(&refraction)),
            nodes![mesh],
        );
        let size = config.far_away;
        let matrix = Mat4::from_translation(Vec3::new(-size * 0.5, 0.0, -size * 0.5))
            * Mat4::from_scale(Vec3::new(size, 1.0, size));
        Transform::new(nodes![material]).with_matrix(matrix)
    };

    let plane = {
        let shader = shaders.get(device, "plane", None)?;
        let mesh = arbor::resources::parse_obj(resources.text("obj/plane.obj")?)?;
        let positions = mesh.position;
        let normals = flat_normals(&positions);
        let mesh = SimpleMesh::from_positions(device, &positions)?.with_attribute(
            "normal",
            Rc::new(arbor::resources::VertexBuffer::new(device, &normals)?),
        );
        let material = Material::new(
            shader,
            UniformSet::new().with("color", Vec3::from(config.plane_color)),
            nodes![mesh],
        );
        let matrix = Mat4::from_rotation_y(PI)
            * Mat4::from_translation(Vec3::new(0.0, -3.0, 10.0))
            * Mat4::from_scale(Vec3::splat(0.01));
        CameraFixTransform::new(Rc::clone(camera), nodes![material]).with_matrix(matrix)
    };

    // ========================================================================
    // Passes
    // ========================================================================

    let underwater = RenderTarget::new(
        Rc::clone(&refraction),
        nodes![Uniforms::new(
            UniformSet::new().with("clip", 0.0_f32),
            nodes![Rc::clone(&mountain)],
        )],
    );
    let mirrored = RenderTarget::new(
        Rc::clone(&reflection),
        nodes![Uniforms::new(
            UniformSet::new().with("clip", 0.0_f32),
            nodes![Mirror::new(nodes![Rc::clone(&mountain), Rc::clone(&sky)])],
        )],
    );
    let main_pass = RenderTarget::new(
        Rc::clone(&combined),
        nodes![plane, mountain, water, sky],
    );

    let globals = Uniforms::new(
        UniformSet::new()
            .with("sunColor", Vec3::from(config.sun_color))
            .with("sunDirection", Vec3::from(config.sun_direction).normalize())
            .with("skyColor", Vec3::from(config.sky_color))
            .with("groundColor", Vec3::from(config.ground_color))
            .with("clip", config.clip)
            .with("time", 0.0_f32),
        nodes![underwater, mirrored, main_pass],
    );
    let global_handle = globals.handle();

    let brightpass = shaders.get(device, "screen.vert", Some("brightpass.frag"))?;
    let hblur = shaders.get(device, "screen.vert", Some("hblur.frag"))?;
    let vblur = shaders.get(device, "screen.vert", Some("vblur.frag"))?;
    let screen = shaders.get(device, "screen", None)?;

    let bright = RenderTarget::new(
        Rc::clone(&bloom[0]),
        nodes![PostProcess::new(
            device,
            brightpass,
            UniformSet::new().with("source", Rc::clone(&combined)),
        )?],
    );
    let horizontal = RenderTarget::new(
        Rc::clone(&bloom[1]),
        nodes![PostProcess::new(
            device,
            hblur,
            UniformSet::new().with("source", Rc::clone(&bloom[0])),
        )?],
    );
    let vertical = RenderTarget::new(
        Rc::clone(&bloom[0]),
        nodes![PostProcess::new(
            device,
            vblur,
            UniformSet::new().with("source", Rc::clone(&bloom[1])),
        )?],
    );
    let present = PostProcess::new(
        device,
        screen,
        UniformSet::new()
            .with("source", combined)
            .with("bloom", Rc::clone(&bloom[0])),
    )?;

    let scene = Group::new(nodes![
        Camera::with_rig(Rc::clone(camera), nodes![globals]),
        Group::new(nodes![bright, horizontal, vertical]),
        present,
    ]);
    Ok((scene, global_handle))
}

/// One face normal per triangle corner.
fn flat_normals(positions: &[f32]) -> Vec<f32> {
    positions
        .chunks_exact(9)
        .flat_map(|t| {
            let a = Vec3::new(t[0], t[1], t[2]);
            let b = Vec3::new(t[3], t[4], t[5]);
            let c = Vec3::new(t[6], t[7], t[8]);
            let n = (b - a).cross(c - a).normalize_or_zero();
            [n.x, n.y, n.z, n.x, n.y, n.z, n.x, n.y, n.z]
        })
        .collect()
}

fn main() -> arbor::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    App::new()
        .with_title("Terrain")
        .with_settings(RenderSettings::default().with_clear_color(Vec4::new(0.4, 0.6, 1.0, 1.0)))
        .run::<Terrain>()
}
