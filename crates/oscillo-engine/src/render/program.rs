//! Named-interface shading program over a WGSL vertex/fragment pair.

use std::collections::HashMap;
use std::fmt;

use crate::error::ChartError;

use super::reflect::{components, BlockDecl, StageModule};

/// Shader stage of a program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        })
    }
}

/// WGSL source for one stage.
#[derive(Debug, Copy, Clone)]
pub struct ShaderSource<'a> {
    pub stage: Stage,
    pub wgsl: &'a str,
}

impl<'a> ShaderSource<'a> {
    pub const fn vertex(wgsl: &'a str) -> Self {
        Self {
            stage: Stage::Vertex,
            wgsl,
        }
    }

    pub const fn fragment(wgsl: &'a str) -> Self {
        Self {
            stage: Stage::Fragment,
            wgsl,
        }
    }
}

/// Resolved uniform: staging block, byte offset, float component count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UniformLocation {
    pub binding: u32,
    pub offset: u32,
    pub components: u32,
}

/// Resolved vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttributeLocation {
    pub location: u32,
    pub components: u32,
}

/// Host-side copy of one uniform block, flushed to the device on activation.
struct UniformBlock {
    binding: u32,
    size: u32,
    visibility: wgpu::ShaderStages,
    words: Vec<f32>,
    dirty: bool,
}

struct ProgramGpu {
    format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffers: Vec<wgpu::Buffer>,
}

/// Compiled and linked vertex + fragment pair.
///
/// Uniform and attribute names are resolved through reflection once and cached.
/// GPU objects are created lazily for a surface format; host-side uniform
/// staging works without a device.
pub struct ShadingProgram {
    label: &'static str,
    vertex: StageModule,
    fragment: StageModule,
    blocks: Vec<UniformBlock>,
    uniforms: HashMap<String, UniformLocation>,
    attributes: HashMap<String, AttributeLocation>,
    gpu: Option<ProgramGpu>,
}

impl ShadingProgram {
    /// Compiles every stage, then links them.
    pub fn new(label: &'static str, sources: &[ShaderSource<'_>]) -> Result<Self, ChartError> {
        let mut vertex = None;
        let mut fragment = None;
        for src in sources {
            let module = StageModule::compile(src.stage, src.wgsl)?;
            match src.stage {
                Stage::Vertex => vertex = Some(module),
                Stage::Fragment => fragment = Some(module),
            }
        }

        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return Err(ChartError::ProgramLink {
                log: "a program needs one vertex and one fragment stage".into(),
            });
        };

        let blocks = link(&vertex, &fragment)?;
        log::debug!("linked program `{label}` ({} uniform blocks)", blocks.len());

        Ok(Self {
            label,
            vertex,
            fragment,
            blocks,
            uniforms: HashMap::new(),
            attributes: HashMap::new(),
            gpu: None,
        })
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn uniform_location(&mut self, name: &str) -> Result<UniformLocation, ChartError> {
        if let Some(loc) = self.uniforms.get(name) {
            return Ok(*loc);
        }
        let (binding, offset, components) = self
            .vertex
            .find_uniform(name)
            .or_else(|| self.fragment.find_uniform(name))
            .ok_or_else(|| ChartError::UniformNotFound { name: name.into() })?;

        let loc = UniformLocation {
            binding,
            offset,
            components,
        };
        self.uniforms.insert(name.to_owned(), loc);
        Ok(loc)
    }

    pub fn attribute_location(&mut self, name: &str) -> Result<AttributeLocation, ChartError> {
        if let Some(loc) = self.attributes.get(name) {
            return Ok(*loc);
        }
        let loc = self
            .vertex
            .location_inputs()
            .into_iter()
            .find(|v| v.name == name)
            .map(|v| AttributeLocation {
                location: v.location,
                components: components(&v.ty),
            })
            .ok_or_else(|| ChartError::AttributeNotFound { name: name.into() })?;

        self.attributes.insert(name.to_owned(), loc);
        Ok(loc)
    }

    pub fn set_uniform_1f(&mut self, name: &str, x: f32) -> Result<(), ChartError> {
        self.write_uniform(name, &[x])
    }

    pub fn set_uniform_4f(
        &mut self,
        name: &str,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) -> Result<(), ChartError> {
        self.write_uniform(name, &[x, y, z, w])
    }

    fn write_uniform(&mut self, name: &str, values: &[f32]) -> Result<(), ChartError> {
        let loc = self.uniform_location(name)?;
        if loc.components != values.len() as u32 {
            return Err(ChartError::UniformType {
                name: name.into(),
                expected: values.len() as u32,
                found: loc.components,
            });
        }
        let Some(block) = self.blocks.iter_mut().find(|b| b.binding == loc.binding) else {
            return Err(ChartError::UniformNotFound { name: name.into() });
        };
        let start = (loc.offset / 4) as usize;
        block.words[start..start + values.len()].copy_from_slice(values);
        block.dirty = true;
        Ok(())
    }

    /// Staged value of a float uniform.
    pub fn staged_uniform(&mut self, name: &str) -> Result<Vec<f32>, ChartError> {
        let loc = self.uniform_location(name)?;
        let block = self
            .blocks
            .iter()
            .find(|b| b.binding == loc.binding)
            .ok_or_else(|| ChartError::UniformNotFound { name: name.into() })?;
        let start = (loc.offset / 4) as usize;
        Ok(block.words[start..start + loc.components as usize].to_vec())
    }

    // ── GPU side ──────────────────────────────────────────────────────────

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.gpu.is_some()
    }

    /// Creates the pipeline for `format` if missing or built for another format.
    pub fn ensure_pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        buffers: &[wgpu::VertexBufferLayout<'_>],
    ) {
        if self.gpu.as_ref().is_some_and(|g| g.format == format) {
            return;
        }

        let vs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(self.vertex.source.as_str().into()),
        });
        let fs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(self.fragment.source.as_str().into()),
        });

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = self
            .blocks
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: b.visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(u64::from(b.size)),
                },
                count: None,
            })
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(self.label),
            entries: &layout_entries,
        });

        let uniform_buffers: Vec<wgpu::Buffer> = self
            .blocks
            .iter()
            .map(|b| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(self.label),
                    size: u64::from(b.size).next_multiple_of(16),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let bind_entries: Vec<wgpu::BindGroupEntry<'_>> = self
            .blocks
            .iter()
            .zip(&uniform_buffers)
            .map(|(b, buf)| wgpu::BindGroupEntry {
                binding: b.binding,
                resource: buf.as_entire_binding(),
            })
            .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &bind_group_layout,
            entries: &bind_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(self.label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some(self.vertex.entry_point.as_str()),
                compilation_options: Default::default(),
                buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: Some(self.fragment.entry_point.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::info!("created pipeline `{}` for {format:?}", self.label);

        // Fresh buffers hold zeros; restage everything.
        for block in &mut self.blocks {
            block.dirty = true;
        }
        self.gpu = Some(ProgramGpu {
            format,
            pipeline,
            bind_group,
            uniform_buffers,
        });
    }

    /// Uploads staged uniform blocks that changed since the last flush.
    pub fn flush_uniforms(&mut self, queue: &wgpu::Queue) {
        let Some(gpu) = self.gpu.as_ref() else { return };
        for (block, buffer) in self.blocks.iter_mut().zip(&gpu.uniform_buffers) {
            if block.dirty {
                queue.write_buffer(buffer, 0, bytemuck::cast_slice(&block.words));
                block.dirty = false;
            }
        }
    }

    /// Makes this program current for the following draws in `pass`.
    pub fn activate(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(gpu) = self.gpu.as_ref() else { return };
        pass.set_pipeline(&gpu.pipeline);
        pass.set_bind_group(0, &gpu.bind_group, &[]);
    }

    /// Drops GPU objects; the next `ensure_pipeline` recreates them.
    pub fn release(&mut self) {
        if self.gpu.take().is_some() {
            log::info!("released program `{}`", self.label);
        }
    }
}

fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── link ──────────────────────────────────────────────────────────────────

/// Checks the stage interface and returns the merged uniform blocks.
fn link(vertex: &StageModule, fragment: &StageModule) -> Result<Vec<UniformBlock>, ChartError> {
    let fail = |log: String| ChartError::ProgramLink { log };

    vertex.validate().map_err(fail)?;
    fragment.validate().map_err(fail)?;

    let produced = vertex.location_outputs();
    for input in fragment.location_inputs() {
        let Some(out) = produced.iter().find(|o| o.location == input.location) else {
            return Err(fail(format!(
                "fragment input `{}` @location({}) is not written by the vertex stage",
                input.name, input.location
            )));
        };
        if out.ty != input.ty {
            return Err(fail(format!(
                "@location({}) has type {:?} in the vertex stage but {:?} in the fragment stage",
                input.location, out.ty, input.ty
            )));
        }
    }

    if !fragment.location_outputs().iter().any(|o| o.location == 0) {
        return Err(fail("fragment stage does not write @location(0)".into()));
    }

    let mut blocks: Vec<UniformBlock> = Vec::new();
    let stages = [
        (vertex.uniform_blocks(), wgpu::ShaderStages::VERTEX),
        (fragment.uniform_blocks(), wgpu::ShaderStages::FRAGMENT),
    ];
    for (decls, visibility) in stages {
        for BlockDecl {
            name,
            binding,
            size,
        } in decls.map_err(fail)?
        {
            match blocks.iter_mut().find(|b| b.binding == binding) {
                Some(block) if block.size != size => {
                    return Err(fail(format!(
                        "uniform `{name}` @binding({binding}) is {size} bytes, \
                         another stage declares {} bytes",
                        block.size
                    )));
                }
                Some(block) => block.visibility |= visibility,
                None => blocks.push(UniformBlock {
                    binding,
                    size,
                    visibility,
                    words: vec![0.0; size.div_ceil(4) as usize],
                    dirty: true,
                }),
            }
        }
    }
    Ok(blocks)
}
