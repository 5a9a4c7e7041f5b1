use std::collections::{BTreeMap, BTreeSet};

use crate::backend::{GlBackend, Primitive, ShaderKind, VertexLayout};
use crate::glsl::{self, Declaration, Qualifier};

/// Last value uploaded to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData {
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
}

/// State of one vertex attribute array slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AttribArray {
    pub enabled: bool,
    pub layout: VertexLayout,
    /// Copy of the floats the array was pointed at.
    pub data: Vec<f32>,
}

/// One recorded `draw_arrays` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub program: Option<u32>,
    pub primitive: Primitive,
    pub first: u32,
    pub count: u32,
}

#[derive(Debug)]
struct ShaderObject {
    kind: ShaderKind,
    source: String,
    compiled: bool,
    info_log: String,
    declarations: Vec<Declaration>,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<u32>,
    linked: bool,
    info_log: String,
    attributes: BTreeMap<String, u32>,
    uniforms: BTreeMap<String, u32>,
    uniform_values: BTreeMap<u32, UniformData>,
}

/// In-memory GL backend.
///
/// Behaves like a strict GL ES 2.0 driver for the calls the shading core
/// makes, and keeps enough bookkeeping to assert on afterwards: live object
/// counts for leak checks, an invalid-operation counter for double frees and
/// misuse, attribute array state, uniform values, and a draw log.
///
/// Object names start at 1; 0 is never handed out.
#[derive(Debug, Default)]
pub struct HeadlessGl {
    last_name: u32,
    shaders: BTreeMap<u32, ShaderObject>,
    programs: BTreeMap<u32, ProgramObject>,
    current: Option<u32>,
    attrib_arrays: BTreeMap<u32, AttribArray>,
    constant_attribs: BTreeMap<u32, [f32; 4]>,
    draws: Vec<DrawCall>,
    invalid_operations: usize,
    shaders_created: usize,
    programs_created: usize,
    fail_next_allocation: bool,
    recycle_names: bool,
    free_names: BTreeSet<u32>,
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand deleted object names out again, lowest first, the way real
    /// drivers do.
    pub fn with_recycled_names() -> Self {
        Self {
            recycle_names: true,
            ..Self::default()
        }
    }

    /// Make the next allocation fail: `create_shader` or `create_program`
    /// returns the zero name, `vertex_attrib_array` gets no buffer storage.
    pub fn fail_next_allocation(&mut self) {
        self.fail_next_allocation = true;
    }

    /// Shader objects created and not yet deleted.
    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    /// Program objects created and not yet deleted.
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Calls a real driver would reject with `GL_INVALID_VALUE` or
    /// `GL_INVALID_OPERATION`: deleting unknown names, using unlinked
    /// programs, uploading uniforms with no program in use.
    pub fn invalid_operations(&self) -> usize {
        self.invalid_operations
    }

    pub fn shaders_created(&self) -> usize {
        self.shaders_created
    }

    pub fn programs_created(&self) -> usize {
        self.programs_created
    }

    pub fn current_program(&self) -> Option<u32> {
        self.current
    }

    pub fn attrib_array(&self, index: u32) -> Option<&AttribArray> {
        self.attrib_arrays.get(&index)
    }

    pub fn constant_attrib(&self, index: u32) -> Option<[f32; 4]> {
        self.constant_attribs.get(&index).copied()
    }

    /// Value most recently uploaded to `name` on `program`.
    pub fn uniform_value(&self, program: u32, name: &str) -> Option<UniformData> {
        let p = self.programs.get(&program)?;
        let location = p.uniforms.get(name)?;
        p.uniform_values.get(location).copied()
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn is_linked(&self, program: u32) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn allocate_name(&mut self) -> Result<u32, String> {
        if std::mem::take(&mut self.fail_next_allocation) {
            return Err("out of memory".into());
        }
        if self.recycle_names {
            if let Some(name) = self.free_names.pop_first() {
                return Ok(name);
            }
        }
        self.last_name += 1;
        Ok(self.last_name)
    }

    fn free_name(&mut self, name: u32) {
        if self.recycle_names {
            self.free_names.insert(name);
        }
    }

    fn invalid(&mut self, what: &str) {
        tracing::debug!(what, "headless GL rejected call");
        self.invalid_operations += 1;
    }

    fn upload_uniform(&mut self, location: u32, value: UniformData) {
        let Some(program) = self.current else {
            self.invalid("uniform upload with no program in use");
            return;
        };
        let Some(p) = self.programs.get_mut(&program) else {
            self.invalid("uniform upload to deleted program");
            return;
        };
        if !p.uniforms.values().any(|&l| l == location) {
            self.invalid("uniform location not in current program");
            return;
        }
        p.uniform_values.insert(location, value);
    }

    fn attached_stage(&self, attached: &[u32], kind: ShaderKind) -> Result<&ShaderObject, String> {
        let mut found = attached
            .iter()
            .filter_map(|name| self.shaders.get(name))
            .filter(|s| s.kind == kind);
        let shader = found
            .next()
            .ok_or_else(|| format!("no {kind} shader attached"))?;
        if found.next().is_some() {
            return Err(format!("more than one {kind} shader attached"));
        }
        if !shader.compiled {
            return Err(format!("attached {kind} shader is not compiled"));
        }
        Ok(shader)
    }

    /// Resolve the interface of a program with `attached` shaders into
    /// attribute and uniform locations, or the reason linking fails.
    fn link(&self, attached: &[u32]) -> Result<(BTreeMap<String, u32>, BTreeMap<String, u32>), String> {
        let vertex = self.attached_stage(attached, ShaderKind::Vertex)?;
        let fragment = self.attached_stage(attached, ShaderKind::Fragment)?;

        let declared = |s: &ShaderObject, q: Qualifier, name: &str| {
            s.declarations
                .iter()
                .find(|d| d.qualifier == q && d.name == name)
                .map(|d| d.ty.clone())
        };

        for d in &fragment.declarations {
            match d.qualifier {
                Qualifier::Varying if d.active => {
                    match declared(vertex, Qualifier::Varying, &d.name) {
                        None => {
                            return Err(format!(
                                "varying `{}` is read by the fragment shader but not declared by the vertex shader",
                                d.name
                            ));
                        }
                        Some(ty) if ty != d.ty => {
                            return Err(format!(
                                "varying `{}` has type {} in the vertex shader and {} in the fragment shader",
                                d.name, ty, d.ty
                            ));
                        }
                        Some(_) => {}
                    }
                }
                Qualifier::Uniform => {
                    if let Some(ty) = declared(vertex, Qualifier::Uniform, &d.name) {
                        if ty != d.ty {
                            return Err(format!(
                                "uniform `{}` differs in type between shader stages",
                                d.name
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        let mut attributes = BTreeMap::new();
        for d in vertex
            .declarations
            .iter()
            .filter(|d| d.qualifier == Qualifier::Attribute && d.active)
        {
            let next = attributes.len() as u32;
            attributes.entry(d.name.clone()).or_insert(next);
        }

        let mut uniforms = BTreeMap::new();
        for d in vertex
            .declarations
            .iter()
            .chain(&fragment.declarations)
            .filter(|d| d.qualifier == Qualifier::Uniform && d.active)
        {
            let next = uniforms.len() as u32;
            uniforms.entry(d.name.clone()).or_insert(next);
        }

        Ok((attributes, uniforms))
    }
}

impl GlBackend for HeadlessGl {
    type Shader = u32;
    type Program = u32;
    type UniformLocation = u32;

    fn create_shader(&mut self, kind: ShaderKind) -> Result<u32, String> {
        let name = self.allocate_name()?;
        self.shaders.insert(
            name,
            ShaderObject {
                kind,
                source: String::new(),
                compiled: false,
                info_log: String::new(),
                declarations: Vec::new(),
            },
        );
        self.shaders_created += 1;
        Ok(name)
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(s) => s.source = source.to_string(),
            None => self.invalid("shader_source on unknown shader"),
        }
    }

    fn compile_shader(&mut self, shader: u32) {
        let Some(s) = self.shaders.get_mut(&shader) else {
            self.invalid("compile_shader on unknown shader");
            return;
        };
        match glsl::analyze(s.kind, &s.source) {
            Ok(declarations) => {
                s.compiled = true;
                s.info_log.clear();
                s.declarations = declarations;
            }
            Err(diagnostics) => {
                s.compiled = false;
                s.info_log = glsl::format_log(&diagnostics);
                s.declarations.clear();
            }
        }
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: u32) {
        if self.shaders.remove(&shader).is_none() {
            self.invalid("delete_shader on unknown shader");
            return;
        }
        self.free_name(shader);
        for p in self.programs.values_mut() {
            p.attached.retain(|&s| s != shader);
        }
    }

    fn create_program(&mut self) -> Result<u32, String> {
        let name = self.allocate_name()?;
        self.programs.insert(name, ProgramObject::default());
        self.programs_created += 1;
        Ok(name)
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        if !self.shaders.contains_key(&shader) {
            self.invalid("attach_shader with unknown shader");
            return;
        }
        match self.programs.get_mut(&program) {
            Some(p) if !p.attached.contains(&shader) => p.attached.push(shader),
            Some(_) => self.invalid("shader already attached"),
            None => self.invalid("attach_shader to unknown program"),
        }
    }

    fn detach_shader(&mut self, program: u32, shader: u32) {
        match self.programs.get_mut(&program) {
            Some(p) if p.attached.contains(&shader) => p.attached.retain(|&s| s != shader),
            _ => self.invalid("detach_shader of shader not attached"),
        }
    }

    fn link_program(&mut self, program: u32) {
        let Some(attached) = self.programs.get(&program).map(|p| p.attached.clone()) else {
            self.invalid("link_program on unknown program");
            return;
        };
        let result = self.link(&attached);
        let Some(p) = self.programs.get_mut(&program) else {
            return;
        };
        p.uniform_values.clear();
        match result {
            Ok((attributes, uniforms)) => {
                p.linked = true;
                p.info_log.clear();
                p.attributes = attributes;
                p.uniforms = uniforms;
            }
            Err(reason) => {
                p.linked = false;
                p.info_log = format!("error: {reason}\n");
                p.attributes.clear();
                p.uniforms.clear();
            }
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.is_linked(program)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: u32) {
        if self.programs.remove(&program).is_none() {
            self.invalid("delete_program on unknown program");
            return;
        }
        self.free_name(program);
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn use_program(&mut self, program: Option<u32>) {
        match program {
            None => self.current = None,
            Some(p) if self.is_linked(p) => self.current = Some(p),
            Some(_) => self.invalid("use_program on a program that is not linked"),
        }
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        self.programs.get(&program)?.attributes.get(name).copied()
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    fn vertex_attrib_array(
        &mut self,
        index: u32,
        layout: VertexLayout,
        data: &[f32],
    ) -> Result<(), String> {
        if std::mem::take(&mut self.fail_next_allocation) {
            return Err("out of memory".into());
        }
        self.attrib_arrays.insert(
            index,
            AttribArray {
                enabled: true,
                layout,
                data: data.to_vec(),
            },
        );
        Ok(())
    }

    fn vertex_attrib_4f(&mut self, index: u32, value: [f32; 4]) {
        self.constant_attribs.insert(index, value);
    }

    fn uniform_1f(&mut self, location: &u32, value: f32) {
        self.upload_uniform(*location, UniformData::Float(value));
    }

    fn uniform_3f(&mut self, location: &u32, value: [f32; 3]) {
        self.upload_uniform(*location, UniformData::Vec3(value));
    }

    fn uniform_4f(&mut self, location: &u32, value: [f32; 4]) {
        self.upload_uniform(*location, UniformData::Vec4(value));
    }

    fn uniform_matrix_4(&mut self, location: &u32, value: &[f32; 16]) {
        self.upload_uniform(*location, UniformData::Mat4(*value));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        if self.current.is_none() {
            self.invalid("draw_arrays with no program in use");
        }
        self.draws.push(DrawCall {
            program: self.current,
            primitive,
            first,
            count,
        });
    }
}
