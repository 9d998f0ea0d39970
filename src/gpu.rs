use pollster::block_on;
use tracing::{debug, info, info_span};
use wgpu::{
    Backends, BufferDescriptor, BufferUsages, CommandEncoderDescriptor, DeviceDescriptor,
    InstanceDescriptor, PowerPreference, RequestAdapterOptions,
};

use crate::Error;

/// Live compute context on the selected accelerator.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire the highest-performance adapter and open a device on it
    /// with the adapter's full limits, so storage buffers can hold
    /// hundreds of millions of elements.
    pub fn new() -> Result<Self, Error> {
        let _span = info_span!("gpu_init").entered();

        let instance = wgpu::Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let adapter = block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            ..Default::default()
        }))
        .ok_or_else(|| Error::GpuInit("no compatible adapter found".into()))?;
        info!(adapter = %adapter.get_info().name, backend = ?adapter.get_info().backend, "GPU adapter acquired");

        let (device, queue) = block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("sum-bench"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|e| Error::GpuInit(e.to_string()))?;
        info!("GPU device created");

        Ok(Self { device, queue })
    }
}

/// Device-resident buffers for one benchmarking session.
///
/// The input buffer is allocated and filled once, then shared
/// read-only across every strategy. Only the 4-byte total is touched
/// between iterations.
pub struct SumBuffers {
    pub values: wgpu::Buffer,
    pub total: wgpu::Buffer,
    pub params: wgpu::Buffer,
    staging: wgpu::Buffer,
    pub n: u32,
}

impl SumBuffers {
    pub fn upload(ctx: &GpuContext, values: &[u32]) -> Result<Self, Error> {
        let byte_len = values.len() as u64 * 4;
        let limits = ctx.device.limits();
        if byte_len > limits.max_storage_buffer_binding_size as u64
            || byte_len > limits.max_buffer_size
        {
            return Err(Error::Allocation(format!(
                "{} bytes exceeds device limit of {} bytes",
                byte_len,
                limits.max_buffer_size.min(limits.max_storage_buffer_binding_size as u64)
            )));
        }

        let values_buf = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("values"),
            size: byte_len.max(4),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let total = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("total"),
            size: 4,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let params = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("params"),
            size: 16,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("staging"),
            size: 4,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let n = values.len() as u32;
        if !values.is_empty() {
            ctx.queue.write_buffer(&values_buf, 0, &to_le_bytes(values));
        }
        let mut param_bytes = [0u8; 16];
        param_bytes[..4].copy_from_slice(&n.to_le_bytes());
        ctx.queue.write_buffer(&params, 0, &param_bytes);
        info!(n, bytes = byte_len, "input uploaded to device");

        Ok(Self {
            values: values_buf,
            total,
            params,
            staging,
            n,
        })
    }

    /// Zero the output scalar. Mandatory before every strategy
    /// invocation; a stale total is a caller error.
    pub fn reset_total(&self, ctx: &GpuContext) {
        ctx.queue.write_buffer(&self.total, 0, &0u32.to_le_bytes());
    }

    /// Copy the output scalar to the staging buffer and map it back to
    /// the host, blocking until the device has drained.
    pub fn read_total(&self, ctx: &GpuContext) -> u32 {
        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(&self.total, 0, &self.staging, 0, 4);
        ctx.queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        ctx.device.poll(wgpu::Maintain::Wait);

        let mapped = slice.get_mapped_range();
        let sum = u32::from_le_bytes([mapped[0], mapped[1], mapped[2], mapped[3]]);
        drop(mapped);
        self.staging.unmap();
        debug!(sum, "total read back");
        sum
    }
}

fn to_le_bytes(values: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
