use crate::SceneError;
use crate::descriptor::ProgramDescriptor;

const PRESETS: &[(&str, &str)] = &[
    ("lit-scene", include_str!("../presets/lit_scene.yaml")),
    ("colored-triangle", include_str!("../presets/colored_triangle.yaml")),
    ("points", include_str!("../presets/points.yaml")),
    ("rotating-triangles", include_str!("../presets/rotating_triangles.yaml")),
];

/// Names of the built-in descriptors.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}

/// Parse the built-in descriptor called `name`.
pub fn preset(name: &str) -> Result<ProgramDescriptor, SceneError> {
    let (_, yaml) = PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| SceneError::UnknownPreset(name.to_string()))?;
    ProgramDescriptor::from_yaml_str(yaml)
}
