//! GPU device driven through WGPU.
//!
//! [`WgpuDevice`] opens an adapter, a device and its queue, and compiles the
//! two compute programs up front:
//!
//! - `matmul`: one invocation per output element, 16x16 workgroups
//! - `rowsum`: one invocation per row, 64-wide workgroups
//!
//! Every call uploads its canonical buffers, dispatches, and blocks until the
//! result has been copied back to host memory. Validation and out-of-memory
//! errors are captured with error scopes and reported as status codes, so a
//! broken GPU never panics the engine.

use super::primitive::{
    AcceleratorFailure, STATUS_INVALID_ARGUMENT, STATUS_OK, matmul_args_valid, rowsum_args_valid,
};
use crate::backend::{EngineConfig, PowerPreference};
use crate::context::ComputeDevice;
use briny::prelude::{Validate, ValidationError};
use std::sync::mpsc;
use thiserror::Error;
use wgpu::util::DeviceExt;

const MATMUL: &str = include_str!("shaders/matmul.wgsl");
const ROWSUM: &str = include_str!("shaders/rowsum.wgsl");

/// Side length of a matmul workgroup.
const MATMUL_TILE: u32 = 16;
/// Width of a rowsum workgroup.
const ROWSUM_GROUP: u32 = 64;

/// GPU initialization failures.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No adapter matched the request.
    #[error("adapter request failed: {0}")]
    Adapter(wgpu::RequestAdapterError),
    /// The adapter refused to open a device.
    #[error("device request failed: {0}")]
    Device(wgpu::RequestDeviceError),
    /// A bundled program failed source validation.
    #[error("program `{0}` failed validation")]
    InvalidProgram(&'static str),
    /// The driver rejected a program or pipeline.
    #[error("program build failed: {0}")]
    Program(String),
}

/// WGSL source checked before it is handed to the driver.
pub struct WgslSource<'a>(pub &'a str);

impl WgslSource<'_> {
    const MAX_LEN: usize = 1 << 16;
    const FORBIDDEN: [&'static str; 6] = ["asm", "unsafe", "ptr", "std::", "import", "#include"];
}

impl Validate for WgslSource<'_> {
    fn validate(&self) -> Result<(), ValidationError> {
        let src = self.0;
        if src.len() > Self::MAX_LEN || !src.contains("fn main") {
            return Err(ValidationError);
        }
        if Self::FORBIDDEN.iter().any(|bad| src.contains(bad)) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// A compiled compute pipeline and the layout of its bind group.
///
/// Binding 0 is a 16-byte uniform of dimensions, followed by the storage
/// buffers in declaration order.
struct Program {
    label: &'static str,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl Program {
    /// Validates and compiles `source`; `storage` lists each storage binding's
    /// read-only flag.
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        source: &str,
        storage: &[bool],
    ) -> Result<Self, GpuError> {
        WgslSource(source)
            .validate()
            .map_err(|_| GpuError::InvalidProgram(label))?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut entries = vec![layout_entry(0, wgpu::BufferBindingType::Uniform)];
        entries.extend(storage.iter().zip(1u32..).map(|(&read_only, binding)| {
            layout_entry(binding, wgpu::BufferBindingType::Storage { read_only })
        }));
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        Ok(Self {
            label,
            layout,
            pipeline,
        })
    }
}

/// A WGPU device with precompiled matmul and rowsum programs.
pub struct WgpuDevice {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    matmul: Program,
    rowsum: Program,
}

impl WgpuDevice {
    /// Opens an adapter matching `config` and compiles both programs.
    ///
    /// Blocks on the asynchronous WGPU requests with `pollster`.
    ///
    /// # Errors
    /// See [`GpuError`].
    pub fn new(config: &EngineConfig) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let power_preference = match config.power_preference() {
            PowerPreference::Default => wgpu::PowerPreference::None,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            force_fallback_adapter: config.force_fallback_adapter(),
            compatible_surface: None,
        }))
        .map_err(GpuError::Adapter)?;
        let name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("accel_engine"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(GpuError::Device)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let programs = Program::new(&device, "matmul", MATMUL, &[true, true, false]).and_then(|matmul| {
            Ok((matmul, Program::new(&device, "rowsum", ROWSUM, &[true, false])?))
        });
        let scope = pollster::block_on(device.pop_error_scope());
        let (matmul, rowsum) = programs?;
        if let Some(err) = scope {
            return Err(GpuError::Program(err.to_string()));
        }

        Ok(Self {
            name,
            device,
            queue,
            matmul,
            rowsum,
        })
    }

    /// Uploads `inputs`, runs `program` over `groups` workgroups and reads the
    /// single output buffer back into `out`.
    fn run(
        &self,
        program: &Program,
        dims: [u32; 4],
        inputs: &[&[f32]],
        out: &mut [f32],
        groups: [u32; 3],
    ) -> Result<(), AcceleratorFailure> {
        let limits = self.device.limits();
        let out_bytes = byte_len(out.len())?;
        for len in inputs.iter().map(|input| input.len()).chain([out.len()]) {
            let bytes = byte_len(len)?;
            if bytes > u64::from(limits.max_storage_buffer_binding_size) || bytes > limits.max_buffer_size {
                return Err(AcceleratorFailure::Allocation);
            }
        }
        if groups
            .iter()
            .any(|&g| g == 0 || g > limits.max_compute_workgroups_per_dimension)
        {
            return Err(AcceleratorFailure::InvalidArgument);
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let uniform = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dims"),
            contents: bytemuck::cast_slice(&dims),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let input_buffers: Vec<wgpu::Buffer> = inputs
            .iter()
            .map(|data| {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(program.label),
                    contents: bytemuck::cast_slice(data),
                    usage: wgpu::BufferUsages::STORAGE,
                })
            })
            .collect();
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output"),
            size: out_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: out_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if pollster::block_on(self.device.pop_error_scope()).is_some() {
            return Err(AcceleratorFailure::Allocation);
        }

        let mut entries = Vec::with_capacity(input_buffers.len() + 2);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        });
        for (buffer, binding) in input_buffers.iter().chain([&output]).zip(1u32..) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label),
            layout: &program.layout,
            entries: &entries,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(program.label),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(program.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        encoder.copy_buffer_to_buffer(&output, 0, &staging, 0, out_bytes);
        self.queue.submit(Some(encoder.finish()));
        if pollster::block_on(self.device.pop_error_scope()).is_some() {
            return Err(AcceleratorFailure::Submission);
        }

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|_| AcceleratorFailure::Submission)?;
        if !matches!(rx.recv(), Ok(Ok(()))) {
            return Err(AcceleratorFailure::Readback);
        }
        {
            let mapped = slice.get_mapped_range();
            let values: &[f32] =
                bytemuck::try_cast_slice(&mapped).map_err(|_| AcceleratorFailure::Readback)?;
            if values.len() != out.len() {
                return Err(AcceleratorFailure::Readback);
            }
            out.copy_from_slice(values);
        }
        staging.unmap();
        Ok(())
    }
}

impl WgpuDevice {
    fn try_matmul(
        &self,
        a: &[f32],
        b: &[f32],
        c: &mut [f32],
        m: usize,
        n: usize,
        k: usize,
    ) -> Result<(), AcceleratorFailure> {
        let (m, k, n) = (dim(m)?, dim(k)?, dim(n)?);
        let groups = [n.div_ceil(MATMUL_TILE), m.div_ceil(MATMUL_TILE), 1];
        self.run(&self.matmul, [m, k, n, 0], &[a, b], c, groups)
    }

    fn try_rowsum(&self, x: &[f32], y: &mut [f32], rows: usize, cols: usize) -> Result<(), AcceleratorFailure> {
        let (rows, cols) = (dim(rows)?, dim(cols)?);
        let groups = [rows.div_ceil(ROWSUM_GROUP), 1, 1];
        self.run(&self.rowsum, [rows, cols, 0, 0], &[x], y, groups)
    }
}

fn byte_len(len: usize) -> Result<u64, AcceleratorFailure> {
    len.checked_mul(size_of::<f32>())
        .and_then(|bytes| u64::try_from(bytes).ok())
        .ok_or(AcceleratorFailure::InvalidArgument)
}

fn dim(value: usize) -> Result<u32, AcceleratorFailure> {
    u32::try_from(value).map_err(|_| AcceleratorFailure::InvalidArgument)
}

fn status(result: Result<(), AcceleratorFailure>) -> i32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(failure) => {
            log::trace!("wgpu call failed: {failure}");
            failure.status()
        }
    }
}

impl ComputeDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn matmul_f32(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) -> i32 {
        if !matmul_args_valid(a.len(), b.len(), c.len(), m, n, k) {
            return STATUS_INVALID_ARGUMENT;
        }
        status(self.try_matmul(a, b, c, m, n, k))
    }

    fn rowsum_f32(&self, x: &[f32], y: &mut [f32], rows: usize, cols: usize) -> i32 {
        if !rowsum_args_valid(x.len(), y.len(), rows, cols) {
            return STATUS_INVALID_ARGUMENT;
        }
        status(self.try_rowsum(x, y, rows, cols))
    }
}
