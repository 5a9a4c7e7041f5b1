use std::fmt;

use glshade_gl::ShaderKind;

use crate::program::ProgramState;

/// Which side of the program interface a named parameter lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Attribute,
    Uniform,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => f.write_str("attribute"),
            Self::Uniform => f.write_str("uniform"),
        }
    }
}

/// A parameter name the linked program does not expose.
///
/// Not an error on its own: compilers drop parameters the shader never
/// reads, so bindings carry this as a warning and turn uploads into no-ops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} `{name}` is not active in the linked program")]
pub struct UnknownParameter {
    pub name: String,
    pub kind: ParamKind,
}

/// Errors from shader compilation, program lifecycle and binding uploads.
#[derive(Debug, thiserror::Error)]
pub enum ShadingError {
    #[error("{kind} shader failed to compile: {info_log}")]
    Compile { kind: ShaderKind, info_log: String },
    #[error("program failed to link: {info_log}")]
    Link { info_log: String },
    #[error("cannot {operation} a program that is {state}")]
    IllegalState {
        operation: &'static str,
        state: ProgramState,
    },
    #[error("{kind} `{name}` belongs to a program that is no longer in use")]
    StaleBinding { name: String, kind: ParamKind },
    #[error("expected a {expected} shader, got a {found} shader")]
    KindMismatch {
        expected: ShaderKind,
        found: ShaderKind,
    },
    #[error("could not create {object}: {reason}")]
    Allocation { object: &'static str, reason: String },
    #[error(transparent)]
    UnknownParameter(#[from] UnknownParameter),
    #[error("invalid vertex data for `{name}`: {reason}")]
    InvalidVertexData { name: String, reason: String },
}

impl ShadingError {
    /// True for caller protocol violations: lifecycle misuse and uploads
    /// through a binding whose program is no longer current.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. } | Self::StaleBinding { .. })
    }
}
