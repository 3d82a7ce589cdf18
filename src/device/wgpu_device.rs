use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use wgpu::util::DeviceExt as _;

use crate::device::{ComputeDevice, DeviceBuffer, DeviceError, DeviceFactory, Kernel};

const WORKGROUP_SIZE: u32 = 256;
const MAX_GROUPS_PER_DIM: u32 = 65_535;

const KERNELS_WGSL: &str = r#"
struct Params {
    len: u32,
    groups_x: u32,
    width: u32,
    height: u32,
    a: f32,
    b: f32,
    c: f32,
    d: f32,
};

@group(0) @binding(0) var<storage, read_write> data: array<f32>;
@group(0) @binding(1) var<uniform> params: Params;

fn flat_index(gid: vec3<u32>) -> u32 {
    return gid.y * params.groups_x * 256u + gid.x;
}

fn axis_weight(v: f32, n: u32) -> f32 {
    let nf = f32(n);
    let sigma = nf * 0.5;
    let center = (nf - 1.0) * 0.5;
    let dmin = select(0.0, 0.5, n % 2u == 0u);
    let d = v - center;
    return exp(-(d * d - dmin * dmin) / (2.0 * sigma * sigma));
}

@compute @workgroup_size(256)
fn gain(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = flat_index(gid);
    if (i >= params.len) {
        return;
    }
    data[i] = data[i] * params.a;
}

@compute @workgroup_size(256)
fn tremolo(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = flat_index(gid);
    if (i >= params.len) {
        return;
    }
    let phase = params.a + f32(i) * params.b;
    data[i] = data[i] * (0.5 * (1.0 + sin(6.28318530718 * phase)));
}

@compute @workgroup_size(256)
fn vignette(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = flat_index(gid);
    if (i >= params.len || i % 4u == 3u) {
        return;
    }
    let p = i / 4u;
    let x = f32(p % params.width);
    let y = f32(p / params.width);
    let mask = (1.0 - params.a) + axis_weight(x, params.width) * axis_weight(y, params.height) * params.a;
    data[i] = data[i] * mask;
}
"#;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    len: u32,
    groups_x: u32,
    width: u32,
    height: u32,
    a: f32,
    b: f32,
    c: f32,
    d: f32,
}

/// Opens a [`WgpuDevice`] on the highest-performance adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct WgpuFactory;

impl DeviceFactory for WgpuFactory {
    fn open(&self) -> Result<Arc<dyn ComputeDevice>, DeviceError> {
        Ok(Arc::new(WgpuDevice::new()?))
    }
}

/// `wgpu` compute backend running the [`Kernel`] set as WGSL shaders.
pub struct WgpuDevice {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    gain: wgpu::ComputePipeline,
    tremolo: wgpu::ComputePipeline,
    vignette: wgpu::ComputePipeline,
    // Error scopes are per device; one operation at a time keeps them attributable.
    exclusive: Mutex<()>,
}

struct GpuStorage(Option<wgpu::Buffer>);

impl WgpuDevice {
    /// Open the default adapter and compile the kernels.
    pub fn new() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| DeviceError::Unavailable(format!("wgpu request_adapter failed: {e:?}")))?;
        let info = adapter.get_info();

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("fxpipe_compute"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DeviceError::Unavailable(format!("wgpu request_device failed: {e:?}")))?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fxpipe_kernels"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(KERNELS_WGSL)),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fxpipe_kernel_layout"),
            entries: &[
                layout_entry(0, wgpu::BufferBindingType::Storage { read_only: false }),
                layout_entry(1, wgpu::BufferBindingType::Uniform),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fxpipe_kernel_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let gain = pipeline("gain");
        let tremolo = pipeline("tremolo");
        let vignette = pipeline("vignette");

        tracing::info!(adapter = %info.name, backend = ?info.backend, "wgpu compute device opened");
        Ok(Self {
            name: info.name,
            device,
            queue,
            layout,
            gain,
            tremolo,
            vignette,
            exclusive: Mutex::new(()),
        })
    }

    fn scoped<T>(
        &self,
        map_err: impl FnOnce(String) -> DeviceError,
        op: impl FnOnce() -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let _guard = self
            .exclusive
            .lock()
            .map_err(|_| DeviceError::Unavailable("device lock poisoned".into()))?;
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = op();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if let Some(e) = validation.or(oom) {
            return Err(map_err(e.to_string()));
        }
        out
    }

    fn wait(&self) -> Result<(), DeviceError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| DeviceError::Readback(format!("device poll failed: {e:?}")))
    }
}

impl ComputeDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload(&self, data: &[f32]) -> Result<DeviceBuffer, DeviceError> {
        if data.is_empty() {
            return Ok(DeviceBuffer::new(0, GpuStorage(None)));
        }
        let buffer = self.scoped(DeviceError::Allocation, || {
            Ok(self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("fxpipe_unit"),
                    contents: bytemuck::cast_slice(data),
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                }))
        })?;
        Ok(DeviceBuffer::new(data.len(), GpuStorage(Some(buffer))))
    }

    fn dispatch(&self, buf: &mut DeviceBuffer, kernel: &Kernel) -> Result<(), DeviceError> {
        let len = u32::try_from(buf.len()).map_err(|_| DeviceError::Kernel {
            kernel: kernel.name(),
            reason: "buffer too large for a single dispatch".into(),
        })?;
        let Some(storage) = buf.storage::<GpuStorage>()?.0.as_ref() else {
            return Ok(());
        };

        let groups = len.div_ceil(WORKGROUP_SIZE);
        let groups_x = groups.min(MAX_GROUPS_PER_DIM);
        let groups_y = groups.div_ceil(groups_x);
        let mut params = Params {
            len,
            groups_x,
            width: 0,
            height: 0,
            a: 0.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
        };
        let pipeline = match *kernel {
            Kernel::Gain { factor } => {
                params.a = factor;
                &self.gain
            }
            Kernel::Tremolo { phase0, step } => {
                params.a = phase0;
                params.b = step;
                &self.tremolo
            }
            Kernel::Vignette {
                width,
                height,
                strength,
            } => {
                if width == 0 || height == 0 {
                    return Ok(());
                }
                params.width = width;
                params.height = height;
                params.a = strength;
                &self.vignette
            }
        };

        let name = kernel.name();
        self.scoped(
            |reason| DeviceError::Kernel { kernel: name, reason },
            || {
                let uniform = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("fxpipe_kernel_params"),
                        contents: bytemuck::bytes_of(&params),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("fxpipe_kernel_bind_group"),
                    layout: &self.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: storage.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: uniform.as_entire_binding(),
                        },
                    ],
                });
                let mut encoder =
                    self.device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("fxpipe_kernel"),
                        });
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(name),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.dispatch_workgroups(groups_x, groups_y, 1);
                }
                self.queue.submit(std::iter::once(encoder.finish()));
                Ok(())
            },
        )
    }

    fn download(&self, buf: &DeviceBuffer) -> Result<Vec<f32>, DeviceError> {
        let Some(storage) = buf.storage::<GpuStorage>()?.0.as_ref() else {
            return Ok(Vec::new());
        };
        let size = (buf.len() * std::mem::size_of::<f32>()) as u64;

        let staging = self.scoped(DeviceError::Readback, || {
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("fxpipe_readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("fxpipe_readback"),
                });
            encoder.copy_buffer_to_buffer(storage, 0, &staging, 0, size);
            self.queue.submit(std::iter::once(encoder.finish()));
            Ok(staging)
        })?;

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.wait()?;
        rx.recv()
            .map_err(|_| DeviceError::Readback("map callback dropped".into()))?
            .map_err(|e| DeviceError::Readback(format!("buffer map failed: {e:?}")))?;

        let out = {
            let mapped = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, f32>(&mapped).to_vec()
        };
        staging.unmap();
        Ok(out)
    }

    fn release(&self) {
        self.device.destroy();
    }
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
