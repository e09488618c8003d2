//! Shader definitions, the compiled-program cache, and uniform binding.
//!
//! A [`ShaderDef`] is the host's description of a program: vertex and fragment source, the
//! ordered attribute list (attribute `i` reads vertex slot `i`) and the ordered uniform list.
//! Shapes share definitions through `Rc<ShaderDef>`.
//!
//! [`ShaderCache`] compiles each definition the first time a shape renders with it and keeps
//! exactly one program per definition until the definition is dropped. A failed compilation
//! is not remembered, so the next frame tries again.
//!
//! # Uniform Resolution
//!
//! Each uniform name is resolved in this order:
//!
//! | Source | Names |
//! |--------|-------|
//! | computed matrices | `mmatrix`, `vmatrix`, `pmatrix`, `mvmatrix`, `mvpmatrix` |
//! | the shape's properties | any |
//! | the render context's properties | any |
//! | the active light | `ambient`, `lightColor`, `lightOrigin` |
//!
//! The matrix names are reserved and always computed fresh from the current frame, with
//! `mvpmatrix = pmatrix × vmatrix × mmatrix`. A name with no value anywhere is left unset.

use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Mat4;

use crate::backend::{BackendError, GpuBackend, ProgramHandle, ProgramSource, UniformValue};
use crate::light::LightState;
use crate::render::RenderContext;
use crate::value::Value;

static NEXT_SHADER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(u64);

/// Source and binding lists for one GPU program.
#[derive(Debug)]
pub struct ShaderDef {
    id: ShaderId,
    vertex: String,
    fragment: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

impl ShaderDef {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            id: ShaderId(NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed)),
            vertex: vertex.into(),
            fragment: fragment.into(),
            attributes: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    /// Sets the attribute list. Order is the vertex slot order.
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn uniforms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uniforms = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attributes
    }

    pub fn uniform_names(&self) -> &[String] {
        &self.uniforms
    }

    pub fn source(&self) -> ProgramSource<'_> {
        ProgramSource {
            vertex: &self.vertex,
            fragment: &self.fragment,
            attributes: &self.attributes,
            uniforms: &self.uniforms,
        }
    }
}

#[derive(Debug)]
struct Compiled {
    def: Weak<ShaderDef>,
    program: ProgramHandle,
}

#[derive(Debug)]
struct Failure {
    def: Weak<ShaderDef>,
    diagnostic: String,
}

/// One compiled program per live shader definition.
#[derive(Debug, Default)]
pub struct ShaderCache {
    compiled: HashMap<ShaderId, Compiled>,
    failures: HashMap<ShaderId, Failure>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `def` if needed and makes its program current.
    ///
    /// Returns `None` when compilation fails; the failure is logged and the next call tries
    /// again.
    pub fn activate(
        &mut self,
        def: &Rc<ShaderDef>,
        backend: &mut dyn GpuBackend,
    ) -> Option<ProgramHandle> {
        let program = match self.compiled.get(&def.id) {
            Some(entry) => entry.program,
            None => match backend.compile_program(&def.source()) {
                Ok(program) => {
                    log::debug!("compiled shader {:?} as program {}", def.id, program.0);
                    self.failures.remove(&def.id);
                    self.compiled.insert(
                        def.id,
                        Compiled {
                            def: Rc::downgrade(def),
                            program,
                        },
                    );
                    program
                }
                Err(err) => {
                    self.note_failure(def, err);
                    return None;
                }
            },
        };
        backend.use_program(program);
        Some(program)
    }

    fn note_failure(&mut self, def: &Rc<ShaderDef>, err: BackendError) {
        let diagnostic = err.to_string();
        let repeated = self
            .failures
            .get(&def.id)
            .is_some_and(|f| f.diagnostic == diagnostic);
        if repeated {
            log::debug!("shader {:?} still fails to compile", def.id);
        } else {
            log::error!("shader {:?}: {}", def.id, diagnostic);
            self.failures.insert(
                def.id,
                Failure {
                    def: Rc::downgrade(def),
                    diagnostic,
                },
            );
        }
    }

    pub fn program_of(&self, def: &ShaderDef) -> Option<ProgramHandle> {
        self.compiled.get(&def.id).map(|entry| entry.program)
    }

    /// Deletes programs whose definitions have been dropped.
    pub fn collect(&mut self, backend: &mut dyn GpuBackend) {
        self.compiled.retain(|id, entry| {
            let alive = entry.def.strong_count() > 0;
            if !alive {
                log::debug!("releasing program {} of dropped shader {:?}", entry.program.0, id);
                backend.delete_program(entry.program);
            }
            alive
        });
        self.failures.retain(|_, f| f.def.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("a {kind} value cannot be uploaded as a uniform")]
    UnsupportedValue { kind: &'static str },
    #[error("texture upload failed: {0}")]
    Texture(#[from] BackendError),
}

/// Everything a uniform name can resolve against for one draw.
#[derive(Clone, Copy, Debug)]
pub struct UniformSources<'a> {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub shape: &'a HashMap<String, Value>,
    pub context: &'a HashMap<String, Value>,
    pub light: Option<&'a LightState>,
}

/// Looks up `name` in precedence order, or `None` if nothing provides it.
pub fn resolve_uniform(name: &str, sources: &UniformSources<'_>) -> Option<Value> {
    let matrix = match name {
        "mmatrix" => Some(sources.model),
        "vmatrix" => Some(sources.view),
        "pmatrix" => Some(sources.projection),
        "mvmatrix" => Some(sources.view * sources.model),
        "mvpmatrix" => Some(sources.projection * sources.view * sources.model),
        _ => None,
    };
    if let Some(m) = matrix {
        return Some(Value::Mat4(m));
    }
    if let Some(v) = sources.shape.get(name).or_else(|| sources.context.get(name)) {
        return Some(v.clone());
    }
    let light = sources.light?;
    match name {
        "ambient" => light.ambient.map(Value::Color),
        "lightColor" => light.color.map(Value::Color),
        "lightOrigin" => Some(Value::Vec3(light.camera_origin)),
        _ => None,
    }
}

/// Resolves and uploads every uniform `def` declares.
///
/// A uniform that cannot be uploaded is logged and skipped; the rest still bind.
pub(crate) fn bind_uniforms(
    ctx: &mut RenderContext<'_>,
    program: ProgramHandle,
    def: &ShaderDef,
    shape: &HashMap<String, Value>,
    model: Mat4,
) {
    for name in def.uniform_names() {
        let sources = UniformSources {
            model,
            view: ctx.view,
            projection: ctx.projection,
            shape,
            context: ctx.properties,
            light: ctx.light.as_ref(),
        };
        let Some(value) = resolve_uniform(name, &sources) else {
            log::trace!("uniform '{name}' has no value");
            continue;
        };
        if let Err(err) = upload(ctx, program, name, &value) {
            log::warn!("skipping uniform '{name}': {err}");
            ctx.stats.skipped_uniforms += 1;
        }
    }
}

fn upload(
    ctx: &mut RenderContext<'_>,
    program: ProgramHandle,
    name: &str,
    value: &Value,
) -> Result<(), BindError> {
    if let Value::Texture(texture) = value {
        let unit = ctx.resources.textures.bind(texture, ctx.backend)?;
        ctx.backend.set_texture_uniform(program, name, unit);
        return Ok(());
    }
    let uniform = UniformValue::from_value(value).ok_or(BindError::UnsupportedValue {
        kind: value.kind(),
    })?;
    ctx.backend.set_uniform(program, name, &uniform);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCommand, RecordingBackend, TextureUnit};
    use crate::render::RenderResources;
    use crate::texture::{Texture, TextureImage};
    use crate::value::Color;
    use glam::Vec3;

    fn flat_shader() -> Rc<ShaderDef> {
        Rc::new(
            ShaderDef::new("vertex", "fragment")
                .attributes(["positions"])
                .uniforms(["mvpmatrix", "tint"]),
        )
    }

    #[test]
    fn program_is_compiled_once_per_definition() {
        let mut backend = RecordingBackend::new();
        let mut cache = ShaderCache::new();
        let def = flat_shader();

        let first = cache.activate(&def, &mut backend);
        let second = cache.activate(&def, &mut backend);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(
            backend.count(|c| matches!(c, GpuCommand::CompileProgram { .. })),
            1
        );
        assert_eq!(backend.count(|c| matches!(c, GpuCommand::UseProgram(_))), 2);
    }

    #[test]
    fn failed_compile_is_retried() {
        let mut backend = RecordingBackend::new();
        let mut cache = ShaderCache::new();
        let def = flat_shader();

        backend.fail_compiles(Some("syntax error at line 1"));
        assert_eq!(cache.activate(&def, &mut backend), None);
        assert_eq!(cache.activate(&def, &mut backend), None);
        assert!(cache.program_of(&def).is_none());

        backend.fail_compiles(None);
        assert!(cache.activate(&def, &mut backend).is_some());
        assert!(cache.program_of(&def).is_some());
    }

    #[test]
    fn dropped_definition_releases_program() {
        let mut backend = RecordingBackend::new();
        let mut cache = ShaderCache::new();
        let def = flat_shader();
        let program = cache.activate(&def, &mut backend);
        drop(def);

        cache.collect(&mut backend);
        assert!(cache.is_empty());
        assert_eq!(
            backend.commands.last(),
            program.map(GpuCommand::DeleteProgram).as_ref()
        );
    }

    #[test]
    fn attributes_keep_declaration_order() {
        let mut backend = RecordingBackend::new();
        let mut cache = ShaderCache::new();
        let def = Rc::new(ShaderDef::new("v", "f").attributes(["positions", "normals", "uvs"]));
        cache.activate(&def, &mut backend);
        assert!(matches!(
            &backend.commands[0],
            GpuCommand::CompileProgram { attributes, .. } if attributes == &["positions", "normals", "uvs"]
        ));
    }

    fn sources<'a>(
        shape: &'a HashMap<String, Value>,
        context: &'a HashMap<String, Value>,
        light: Option<&'a LightState>,
    ) -> UniformSources<'a> {
        UniformSources {
            model: Mat4::from_translation(Vec3::X),
            view: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            projection: Mat4::from_scale(Vec3::splat(2.0)),
            shape,
            context,
            light,
        }
    }

    #[test]
    fn matrices_are_computed_on_demand() {
        let (shape, context) = (HashMap::new(), HashMap::new());
        let s = sources(&shape, &context, None);
        let Some(Value::Mat4(mvp)) = resolve_uniform("mvpmatrix", &s) else {
            panic!("mvpmatrix did not resolve to a matrix");
        };
        assert_eq!(mvp, s.projection * s.view * s.model);
        let Some(Value::Mat4(mv)) = resolve_uniform("mvmatrix", &s) else {
            panic!("mvmatrix did not resolve to a matrix");
        };
        assert_eq!(mv, s.view * s.model);
    }

    #[test]
    fn shape_shadows_context_which_shadows_light() {
        let light = LightState {
            ambient: Some(Color::gray(0.1)),
            color: Some(Color::WHITE),
            world_origin: Vec3::ZERO,
            camera_origin: Vec3::new(0.0, 0.0, -5.0),
        };
        let mut shape = HashMap::new();
        let mut context = HashMap::new();
        shape.insert("tint".to_string(), Value::Float(1.0));
        context.insert("tint".to_string(), Value::Float(2.0));
        context.insert("ambient".to_string(), Value::Float(3.0));
        let s = sources(&shape, &context, Some(&light));

        assert!(matches!(resolve_uniform("tint", &s), Some(Value::Float(v)) if v == 1.0));
        assert!(matches!(resolve_uniform("ambient", &s), Some(Value::Float(v)) if v == 3.0));
        assert!(matches!(resolve_uniform("lightColor", &s), Some(Value::Color(c)) if c == Color::WHITE));
        assert!(matches!(resolve_uniform("lightOrigin", &s), Some(Value::Vec3(v)) if v.z == -5.0));
        assert!(resolve_uniform("missing", &s).is_none());
    }

    #[test]
    fn bad_uniform_is_skipped_and_others_still_bind() {
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();
        let context = HashMap::new();
        let def = Rc::new(ShaderDef::new("v", "f").uniforms(["label", "tint", "map"]));
        let image = TextureImage::new(1, 1, 4, vec![255; 4]).unwrap();
        let mut shape = HashMap::new();
        shape.insert("label".to_string(), Value::Text("oops".into()));
        shape.insert("tint".to_string(), Value::Float(0.5));
        shape.insert("map".to_string(), Value::Texture(Rc::new(Texture::new(image))));

        let mut ctx = RenderContext::new(&mut backend, &mut resources, &context);
        let program = ctx.resources.shaders.activate(&def, ctx.backend).unwrap();
        bind_uniforms(&mut ctx, program, &def, &shape, Mat4::IDENTITY);
        assert_eq!(ctx.stats.skipped_uniforms, 1);
        drop(ctx);

        assert_eq!(backend.last_uniform("tint"), Some(UniformValue::Float(0.5)));
        assert_eq!(backend.last_uniform("label"), None);
        assert!(backend.commands.contains(&GpuCommand::SetTextureUniform {
            program,
            name: "map".into(),
            unit: TextureUnit(0),
        }));
    }
}
