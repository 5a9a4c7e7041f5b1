use std::collections::BTreeMap;
use std::path::Path;

use glam::{Mat4, Vec3, Vec4};
use glshade_gl::{GlBackend, GlContext};
use glshade_shading::{ShadingError, ShadingProgram, UniformBinding};
use serde::{Deserialize, Serialize};

use crate::SceneError;

/// A uniform constant, typed by its component count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "RawUniform")]
pub enum UniformValue {
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major.
    Mat4([f32; 16]),
}

impl UniformValue {
    /// Pick the variant matching `components.len()`: 1, 3, 4 or 16.
    pub fn from_components(components: &[f32]) -> Option<Self> {
        match components.len() {
            1 => Some(Self::Float(components[0])),
            3 => <[f32; 3]>::try_from(components).ok().map(Self::Vec3),
            4 => <[f32; 4]>::try_from(components).ok().map(Self::Vec4),
            16 => <[f32; 16]>::try_from(components).ok().map(Self::Mat4),
            _ => None,
        }
    }

    pub fn components(&self) -> &[f32] {
        match self {
            Self::Float(v) => std::slice::from_ref(v),
            Self::Vec3(v) => v,
            Self::Vec4(v) => v,
            Self::Mat4(v) => v,
        }
    }

    /// Upload through `binding` with the matching typed call.
    pub fn upload<B: GlBackend>(
        &self,
        ctx: &mut GlContext<B>,
        binding: &UniformBinding<B>,
    ) -> Result<(), ShadingError> {
        match *self {
            Self::Float(v) => binding.bind_float(ctx, v),
            Self::Vec3([x, y, z]) => binding.bind_vec3(ctx, x, y, z),
            Self::Vec4([x, y, z, w]) => binding.bind_vec4(ctx, x, y, z, w),
            Self::Mat4(ref m) => binding.bind_matrix4(ctx, m),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v.to_array())
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v.to_array())
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        Self::Mat4(m.to_cols_array())
    }
}

/// Uniform as written in YAML: a bare number or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawUniform {
    Scalar(f32),
    List(Vec<f32>),
}

impl From<UniformValue> for RawUniform {
    fn from(v: UniformValue) -> Self {
        match v {
            UniformValue::Float(f) => Self::Scalar(f),
            other => Self::List(other.components().to_vec()),
        }
    }
}

/// A vertex attribute the scene feeds, either per vertex or as a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeSpec {
    pub name: String,
    /// Floats per vertex when fed from an array.
    #[serde(default = "default_components")]
    pub components: u32,
    /// Value for every vertex instead of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<[f32; 4]>,
}

fn default_components() -> u32 {
    4
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorFile {
    name: String,
    vertex: String,
    fragment: String,
    #[serde(default)]
    attributes: Vec<AttributeSpec>,
    #[serde(default)]
    uniforms: BTreeMap<String, RawUniform>,
}

/// Everything needed to build and feed one scene's program.
///
/// ```yaml
/// name: colored-triangle
/// vertex: |
///   attribute vec4 a_Position;
///   void main() { gl_Position = a_Position; }
/// fragment: |
///   precision mediump float;
///   uniform vec4 u_Color;
///   void main() { gl_FragColor = u_Color; }
/// attributes:
///   - name: a_Position
///     components: 3
/// uniforms:
///   u_Color: [0.0, 0.0, 1.0, 1.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramDescriptor {
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSpec>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub uniforms: BTreeMap<String, UniformValue>,
}

impl ProgramDescriptor {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SceneError> {
        let file: DescriptorFile = serde_yaml::from_str(yaml)?;

        for attribute in &file.attributes {
            if !(1..=4).contains(&attribute.components) {
                return Err(SceneError::InvalidAttribute {
                    program: file.name.clone(),
                    name: attribute.name.clone(),
                    components: attribute.components,
                });
            }
        }

        let mut uniforms = BTreeMap::new();
        for (name, raw) in file.uniforms {
            let value = match raw {
                RawUniform::Scalar(v) => Some(UniformValue::Float(v)),
                RawUniform::List(ref list) => UniformValue::from_components(list),
            };
            let Some(value) = value else {
                let len = match raw {
                    RawUniform::Scalar(_) => 1,
                    RawUniform::List(list) => list.len(),
                };
                return Err(SceneError::InvalidUniform {
                    program: file.name,
                    name,
                    len,
                });
            };
            uniforms.insert(name, value);
        }

        Ok(Self {
            name: file.name,
            vertex: file.vertex,
            fragment: file.fragment,
            attributes: file.attributes,
            uniforms,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let yaml = std::fs::read_to_string(path)?;
        let descriptor = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), name = %descriptor.name, "loaded program descriptor");
        Ok(descriptor)
    }

    pub fn to_yaml(&self) -> Result<String, SceneError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// A fresh, not yet set up program for this descriptor's sources.
    pub fn build<B: GlBackend>(&self) -> ShadingProgram<B> {
        ShadingProgram::from_sources(self.vertex.clone(), self.fragment.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Make `program` current and upload every uniform constant.
    ///
    /// Returns how many names the program does not expose; those uploads
    /// are skipped.
    pub fn apply_uniforms<B: GlBackend>(
        &self,
        ctx: &mut GlContext<B>,
        program: &ShadingProgram<B>,
    ) -> Result<usize, SceneError> {
        let unresolved = program.execute_using(ctx, |ctx, p| {
            let mut unresolved = 0;
            for (name, value) in &self.uniforms {
                let binding = p.bind_uniform(ctx, name)?;
                if !binding.is_resolved() {
                    unresolved += 1;
                    continue;
                }
                value.upload(ctx, &binding)?;
            }
            Ok(unresolved)
        })?;
        tracing::debug!(program = %self.name, count = self.uniforms.len(), unresolved, "uniform constants applied");
        Ok(unresolved)
    }

    /// Make `program` current and set every constant attribute value.
    /// Returns the number of unresolved names, like [`apply_uniforms`](Self::apply_uniforms).
    pub fn apply_attribute_constants<B: GlBackend>(
        &self,
        ctx: &mut GlContext<B>,
        program: &ShadingProgram<B>,
    ) -> Result<usize, SceneError> {
        let unresolved = program.execute_using(ctx, |ctx, p| {
            let mut unresolved = 0;
            for attribute in &self.attributes {
                let Some([x, y, z, w]) = attribute.constant else {
                    continue;
                };
                let binding = p.bind_attribute(ctx, &attribute.name)?;
                if !binding.is_resolved() {
                    unresolved += 1;
                    continue;
                }
                binding.bind_constant(ctx, x, y, z, w)?;
            }
            Ok(unresolved)
        })?;
        Ok(unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glshade_gl::{HeadlessGl, UniformData};
    use std::io::Write;

    const TRIANGLE: &str = r#"
name: triangle
vertex: |
  attribute vec4 a_Position;
  void main() { gl_Position = a_Position; }
fragment: |
  precision mediump float;
  uniform vec4 u_Color;
  uniform float u_Unused;
  void main() { gl_FragColor = u_Color; }
attributes:
  - name: a_Position
    components: 3
uniforms:
  u_Color: [0.0, 0.0, 1.0, 1.0]
  u_Unused: 0.5
"#;

    #[test]
    fn parses_uniform_variants_by_length() {
        let d = ProgramDescriptor::from_yaml_str(TRIANGLE).unwrap();
        assert_eq!(d.name, "triangle");
        assert_eq!(d.uniforms["u_Color"], UniformValue::Vec4([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(d.uniforms["u_Unused"], UniformValue::Float(0.5));
        assert_eq!(d.attribute("a_Position").unwrap().components, 3);
        assert!(d.attribute("a_Color").is_none());
    }

    #[test]
    fn rejects_bad_uniform_length() {
        let yaml = "name: bad\nvertex: ''\nfragment: ''\nuniforms:\n  u_Pair: [1.0, 2.0]\n";
        let err = ProgramDescriptor::from_yaml_str(yaml).unwrap_err();
        match err {
            SceneError::InvalidUniform { program, name, len } => {
                assert_eq!(program, "bad");
                assert_eq!(name, "u_Pair");
                assert_eq!(len, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_bad_attribute_components() {
        let yaml = "name: bad\nvertex: ''\nfragment: ''\nattributes:\n  - name: a_Position\n    components: 5\n";
        let err = ProgramDescriptor::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, SceneError::InvalidAttribute { components: 5, .. }));
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "name: bad\nvertex: ''\nfragment: ''\ngeometry: ''\n";
        assert!(matches!(
            ProgramDescriptor::from_yaml_str(yaml),
            Err(SceneError::Yaml(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRIANGLE.as_bytes()).unwrap();
        let d = ProgramDescriptor::load(file.path()).unwrap();
        assert_eq!(d.uniforms.len(), 2);

        let missing = file.path().with_extension("missing");
        assert!(matches!(ProgramDescriptor::load(&missing), Err(SceneError::Io(_))));
    }

    #[test]
    fn yaml_output_parses_back() {
        let d = ProgramDescriptor::from_yaml_str(TRIANGLE).unwrap();
        let again = ProgramDescriptor::from_yaml_str(&d.to_yaml().unwrap()).unwrap();
        assert_eq!(again, d);
    }

    #[test]
    fn glam_conversions() {
        assert_eq!(
            UniformValue::from(Vec3::new(0.5, 0.2, 0.5)),
            UniformValue::Vec3([0.5, 0.2, 0.5])
        );
        let m = UniformValue::from(Mat4::IDENTITY);
        assert_eq!(m.components().len(), 16);
        assert_eq!(m.components()[0], 1.0);
        assert_eq!(m.components()[1], 0.0);
    }

    #[test]
    fn apply_uniforms_skips_inactive_names() {
        let d = ProgramDescriptor::from_yaml_str(TRIANGLE).unwrap();
        let mut ctx = GlContext::new(HeadlessGl::new());
        let mut program = d.build();
        program.setup(&mut ctx).unwrap();

        let unresolved = d.apply_uniforms(&mut ctx, &program).unwrap();
        assert_eq!(unresolved, 1);
        let handle = program.handle().unwrap();
        assert_eq!(ctx.current_program(), Some(handle));
        assert_eq!(
            ctx.backend().uniform_value(handle, "u_Color"),
            Some(UniformData::Vec4([0.0, 0.0, 1.0, 1.0]))
        );
        assert_eq!(ctx.backend().invalid_operations(), 0);
        program.release(&mut ctx);
    }

    #[test]
    fn apply_before_setup_is_illegal_state() {
        let d = ProgramDescriptor::from_yaml_str(TRIANGLE).unwrap();
        let mut ctx = GlContext::new(HeadlessGl::new());
        let program = d.build();
        match d.apply_uniforms(&mut ctx, &program).unwrap_err() {
            SceneError::Shading(e) => assert!(e.is_illegal_state()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
