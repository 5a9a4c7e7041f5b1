use std::collections::BTreeMap;

use glshade_gl::{GlBackend, GlContext};
use glshade_shading::ShadingProgram;

use crate::SceneError;
use crate::descriptor::ProgramDescriptor;

#[derive(Debug)]
struct Entry<B: GlBackend> {
    descriptor: ProgramDescriptor,
    program: ShadingProgram<B>,
}

/// The programs one scene draws with, keyed by descriptor name.
#[derive(Debug)]
pub struct ScenePrograms<B: GlBackend> {
    entries: BTreeMap<String, Entry<B>>,
}

impl<B: GlBackend> Default for ScenePrograms<B> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<B: GlBackend> ScenePrograms<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; its program is built but not set up.
    pub fn insert(&mut self, descriptor: ProgramDescriptor) -> Result<(), SceneError> {
        if self.entries.contains_key(&descriptor.name) {
            return Err(SceneError::DuplicateProgram(descriptor.name));
        }
        let program = descriptor.build();
        self.entries.insert(
            descriptor.name.clone(),
            Entry {
                descriptor,
                program,
            },
        );
        Ok(())
    }

    /// Set up every registered program that is not linked yet.
    ///
    /// On the first failure, programs set up by this call are released and
    /// rebuilt, so the registry is left as it was and can be retried.
    pub fn setup_all(&mut self, ctx: &mut GlContext<B>) -> Result<(), SceneError> {
        let _span = tracing::info_span!("scene_setup", programs = self.entries.len()).entered();
        let mut done: Vec<String> = Vec::new();
        let mut failure = None;

        for (name, entry) in &mut self.entries {
            if entry.program.is_linked() {
                continue;
            }
            match entry.program.setup(ctx) {
                Ok(()) => done.push(name.clone()),
                Err(source) => {
                    failure = Some(SceneError::Setup {
                        name: name.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        let Some(error) = failure else {
            tracing::debug!(count = done.len(), "scene programs set up");
            return Ok(());
        };
        tracing::warn!(%error, rolled_back = done.len(), "scene setup failed");
        for name in done {
            if let Some(entry) = self.entries.get_mut(&name) {
                entry.program.release(ctx);
                entry.program = entry.descriptor.build();
            }
        }
        Err(error)
    }

    pub fn get(&self, name: &str) -> Option<&ShadingProgram<B>> {
        self.entries.get(name).map(|e| &e.program)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ProgramDescriptor> {
        self.entries.get(name).map(|e| &e.descriptor)
    }

    /// Upload the named program's uniform constants and constant attributes.
    /// Returns the number of names the program does not expose.
    pub fn apply_constants(&self, ctx: &mut GlContext<B>, name: &str) -> Result<usize, SceneError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| SceneError::MissingProgram(name.to_string()))?;
        let uniforms = entry.descriptor.apply_uniforms(ctx, &entry.program)?;
        let attributes = entry
            .descriptor
            .apply_attribute_constants(ctx, &entry.program)?;
        Ok(uniforms + attributes)
    }

    /// Release every program and rebuild it from its descriptor, so a later
    /// `setup_all` can set the scene up again on a fresh context.
    pub fn release_all(&mut self, ctx: &mut GlContext<B>) {
        for entry in self.entries.values_mut() {
            entry.program.release(ctx);
            entry.program = entry.descriptor.build();
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use glshade_gl::HeadlessGl;
    use glshade_shading::ProgramState;

    fn registry() -> ScenePrograms<HeadlessGl> {
        let mut scene = ScenePrograms::new();
        for name in presets::preset_names() {
            scene.insert(presets::preset(name).unwrap()).unwrap();
        }
        scene
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut scene: ScenePrograms<HeadlessGl> = ScenePrograms::new();
        scene.insert(presets::preset("points").unwrap()).unwrap();
        let err = scene.insert(presets::preset("points").unwrap()).unwrap_err();
        assert!(matches!(err, SceneError::DuplicateProgram(name) if name == "points"));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn setup_apply_release() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut scene = registry();
        scene.setup_all(&mut ctx).unwrap();
        assert_eq!(ctx.backend().live_programs(), scene.len());

        for name in presets::preset_names() {
            assert!(scene.get(name).unwrap().is_linked());
            assert_eq!(scene.apply_constants(&mut ctx, name).unwrap(), 0, "{name}");
        }

        scene.release_all(&mut ctx);
        assert_eq!(ctx.backend().live_programs(), 0);
        assert_eq!(ctx.backend().live_shaders(), 0);
        assert_eq!(ctx.backend().invalid_operations(), 0);
    }

    #[test]
    fn setup_again_after_release() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut scene: ScenePrograms<HeadlessGl> = ScenePrograms::new();
        scene.insert(presets::preset("points").unwrap()).unwrap();
        scene.setup_all(&mut ctx).unwrap();
        scene.release_all(&mut ctx);
        assert_eq!(scene.get("points").unwrap().state(), ProgramState::Uncompiled);

        let mut fresh = GlContext::new(HeadlessGl::new());
        scene.setup_all(&mut fresh).unwrap();
        assert!(scene.get("points").unwrap().is_linked());
        assert_eq!(scene.apply_constants(&mut fresh, "points").unwrap(), 0);
        scene.release_all(&mut fresh);

        for gl in [ctx.backend(), fresh.backend()] {
            assert_eq!(gl.live_programs(), 0);
            assert_eq!(gl.live_shaders(), 0);
            assert_eq!(gl.invalid_operations(), 0);
        }
    }

    #[test]
    fn failed_setup_rolls_back() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut scene = registry();
        let mut broken = presets::preset("points").unwrap();
        broken.name = "zz-broken".into();
        broken.fragment = "void main() { gl_FragColor = vec4(1.0) }".into();
        scene.insert(broken).unwrap();

        let err = scene.setup_all(&mut ctx).unwrap_err();
        assert!(matches!(&err, SceneError::Setup { name, .. } if name == "zz-broken"));
        assert_eq!(ctx.backend().live_programs(), 0);
        assert_eq!(ctx.backend().live_shaders(), 0);
        for name in scene.names() {
            assert_eq!(scene.get(name).unwrap().state(), ProgramState::Uncompiled);
        }
    }

    #[test]
    fn missing_program_is_reported() {
        let mut ctx = GlContext::new(HeadlessGl::new());
        let scene = registry();
        let err = scene.apply_constants(&mut ctx, "nope").unwrap_err();
        assert!(matches!(err, SceneError::MissingProgram(_)));
    }
}
