//! WGSL parsing and interface reflection through naga.
//!
//! wgpu addresses uniforms and attributes by binding and location only. Names are
//! recovered here from the parsed module so programs can be driven by name.

use naga::{AddressSpace, Binding, Module, ShaderStage, TypeInner};

use crate::error::ChartError;

use super::Stage;

/// One parsed stage.
#[derive(Debug)]
pub(super) struct StageModule {
    pub stage: Stage,
    pub source: String,
    pub entry_point: String,
    pub module: Module,
}

impl StageModule {
    /// Parses `source` and finds its entry point for `stage`.
    pub fn compile(stage: Stage, source: &str) -> Result<Self, ChartError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| {
            ChartError::ShaderCompile {
                stage,
                log: e.emit_to_string(source),
            }
        })?;

        let entry_point = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == stage.naga())
            .map(|ep| ep.name.clone())
            .ok_or_else(|| ChartError::ShaderCompile {
                stage,
                log: format!("no @{stage} entry point"),
            })?;

        Ok(Self {
            stage,
            source: source.to_owned(),
            entry_point,
            module,
        })
    }

    fn entry(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.name == self.entry_point)
    }

    /// Runs naga's validator over the module.
    pub fn validate(&self) -> Result<(), String> {
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&self.module)
            .map(|_| ())
            .map_err(|e| format!("{} stage: {}", self.stage, e.as_inner()))
    }

    /// `@location` inputs of the entry point, with their types.
    pub fn location_inputs(&self) -> Vec<Varying> {
        let mut out = Vec::new();
        if let Some(ep) = self.entry() {
            for arg in &ep.function.arguments {
                self.collect_locations(arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut out);
            }
        }
        out
    }

    /// `@location` outputs of the entry point, with their types.
    pub fn location_outputs(&self) -> Vec<Varying> {
        let mut out = Vec::new();
        if let Some(result) = self.entry().and_then(|ep| ep.function.result.as_ref()) {
            self.collect_locations(None, result.ty, result.binding.as_ref(), &mut out);
        }
        out
    }

    fn collect_locations(
        &self,
        name: Option<&str>,
        ty: naga::Handle<naga::Type>,
        binding: Option<&Binding>,
        out: &mut Vec<Varying>,
    ) {
        let inner = &self.module.types[ty].inner;
        match (binding, inner) {
            (Some(Binding::Location { location, .. }), _) => out.push(Varying {
                name: name.unwrap_or_default().to_owned(),
                location: *location,
                ty: inner.clone(),
            }),
            (None, TypeInner::Struct { members, .. }) => {
                for m in members {
                    if let Some(Binding::Location { location, .. }) = m.binding {
                        out.push(Varying {
                            name: m.name.clone().unwrap_or_default(),
                            location,
                            ty: self.module.types[m.ty].inner.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    /// Uniform blocks declared in bind group 0.
    pub fn uniform_blocks(&self) -> Result<Vec<BlockDecl>, String> {
        let mut out = Vec::new();
        for (_, var) in self.module.global_variables.iter() {
            if var.space != AddressSpace::Uniform {
                continue;
            }
            let Some(rb) = var.binding.as_ref() else { continue };
            let name = var.name.clone().unwrap_or_default();
            if rb.group != 0 {
                return Err(format!(
                    "uniform `{name}` in {} stage uses bind group {}; only group 0 is bound",
                    self.stage, rb.group
                ));
            }
            let size = self.module.types[var.ty].inner.size(self.module.to_ctx());
            out.push(BlockDecl {
                name,
                binding: rb.binding,
                size,
            });
        }
        Ok(out)
    }

    /// Resolves a uniform name to `(binding, byte offset, float components)`.
    ///
    /// Members of a struct-typed block are top-level names; nested struct members
    /// use dotted paths.
    pub fn find_uniform(&self, name: &str) -> Option<(u32, u32, u32)> {
        for (_, var) in self.module.global_variables.iter() {
            if var.space != AddressSpace::Uniform {
                continue;
            }
            let Some(rb) = var.binding.as_ref().filter(|rb| rb.group == 0) else {
                continue;
            };

            if var.name.as_deref() == Some(name) {
                let ty = &self.module.types[var.ty].inner;
                if !matches!(ty, TypeInner::Struct { .. }) {
                    return Some((rb.binding, 0, float_components(ty)));
                }
            }
            if let Some((offset, components)) = self.find_member(var.ty, name) {
                return Some((rb.binding, offset, components));
            }
        }
        None
    }

    fn find_member(&self, ty: naga::Handle<naga::Type>, path: &str) -> Option<(u32, u32)> {
        let TypeInner::Struct { members, .. } = &self.module.types[ty].inner else {
            return None;
        };
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let member = members.iter().find(|m| m.name.as_deref() == Some(head))?;
        match rest {
            None => Some((member.offset, float_components(&self.module.types[member.ty].inner))),
            Some(rest) => {
                let (offset, components) = self.find_member(member.ty, rest)?;
                Some((member.offset + offset, components))
            }
        }
    }
}

/// Location-bound stage input or output.
#[derive(Debug, Clone)]
pub(super) struct Varying {
    pub name: String,
    pub location: u32,
    pub ty: TypeInner,
}

/// Uniform block declaration of one stage.
#[derive(Debug, Clone)]
pub(super) struct BlockDecl {
    pub name: String,
    pub binding: u32,
    pub size: u32,
}

/// Float component count of a scalar or vector type; 0 for anything else.
pub(super) fn float_components(ty: &TypeInner) -> u32 {
    match ty {
        TypeInner::Scalar(s) if s.kind == naga::ScalarKind::Float => 1,
        TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
            *size as u32
        }
        _ => 0,
    }
}

/// Component count of a location-bound attribute (scalars and vectors).
pub(super) fn components(ty: &TypeInner) -> u32 {
    match ty {
        TypeInner::Scalar(_) => 1,
        TypeInner::Vector { size, .. } => *size as u32,
        _ => 0,
    }
}

impl Stage {
    pub(super) fn naga(self) -> ShaderStage {
        match self {
            Stage::Vertex => ShaderStage::Vertex,
            Stage::Fragment => ShaderStage::Fragment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct Inner { a: f32, b: vec2<f32> }
struct Block { color: vec4<f32>, inner: Inner, scale: f32 }
@group(0) @binding(0) var<uniform> u: Block;
@group(0) @binding(1) var<uniform> gain: f32;

struct In { @location(0) pos: vec2<f32>, @location(2) weight: f32 }

@vertex
fn vs_main(v: In, @location(1) extra: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(v.pos * u.scale * gain, extra.x * v.weight, 1.0);
}
"#;

    fn vs() -> StageModule {
        StageModule::compile(Stage::Vertex, VS).unwrap()
    }

    #[test]
    fn finds_entry_point() {
        assert_eq!(vs().entry_point, "vs_main");
    }

    #[test]
    fn wrong_stage_is_a_compile_error() {
        let err = StageModule::compile(Stage::Fragment, VS).unwrap_err();
        assert!(matches!(err, ChartError::ShaderCompile { stage: Stage::Fragment, .. }));
    }

    #[test]
    fn syntax_error_carries_log() {
        let Err(ChartError::ShaderCompile { log, .. }) =
            StageModule::compile(Stage::Vertex, "fn broken( {")
        else {
            panic!("expected a compile error");
        };
        assert!(!log.is_empty());
    }

    #[test]
    fn uniform_members_resolve_by_name_and_path() {
        let m = vs();
        assert_eq!(m.find_uniform("color"), Some((0, 0, 4)));
        assert_eq!(m.find_uniform("inner.a"), Some((0, 16, 1)));
        assert_eq!(m.find_uniform("inner.b"), Some((0, 24, 2)));
        assert_eq!(m.find_uniform("gain"), Some((1, 0, 1)));
        assert_eq!(m.find_uniform("inner.missing"), None);
        assert_eq!(m.find_uniform("nothing"), None);
    }

    #[test]
    fn struct_block_has_no_own_components() {
        assert_eq!(vs().find_uniform("inner"), Some((0, 16, 0)));
    }

    #[test]
    fn inputs_cover_struct_members_and_plain_arguments() {
        let mut inputs = vs().location_inputs();
        inputs.sort_by_key(|v| v.location);
        let names: Vec<(&str, u32, u32)> = inputs
            .iter()
            .map(|v| (v.name.as_str(), v.location, components(&v.ty)))
            .collect();
        assert_eq!(names, vec![("pos", 0, 2), ("extra", 1, 3), ("weight", 2, 1)]);
    }

    #[test]
    fn blocks_report_binding_and_size() {
        let blocks = vs().uniform_blocks().unwrap();
        let sizes: Vec<(u32, u32)> = blocks.iter().map(|b| (b.binding, b.size)).collect();
        assert!(sizes.contains(&(0, 48)));
        assert!(sizes.contains(&(1, 4)));
    }

    #[test]
    fn non_zero_group_is_rejected() {
        let src = r#"
@group(1) @binding(0) var<uniform> g: vec4<f32>;
@vertex fn vs_main() -> @builtin(position) vec4<f32> { return g; }
"#;
        assert!(StageModule::compile(Stage::Vertex, src).unwrap().uniform_blocks().is_err());
    }
}
