use tracing::{debug, info};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, BufferBindingType, CommandEncoderDescriptor,
    ComputePassDescriptor, ComputePipelineDescriptor, PipelineCompilationOptions,
    PipelineLayoutDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

use crate::gpu::{GpuContext, SumBuffers};

/// Workers per workgroup; the barrier/scratch domain for the
/// local-buffer and tree kernels.
pub const WORKGROUP_SIZE: u32 = 128;

/// Consecutive elements folded into a private register by each worker
/// of the cycle kernels before its single atomic add.
pub const VALUES_PER_WORKER: u32 = 64;

/// Five numerically equivalent wrapping-sum kernels over the same
/// bindings. They differ only in memory-access pattern and
/// synchronization discipline. The 2-D workgroup grid is flattened
/// in-shader so element counts far beyond the per-dimension dispatch
/// limit still map to unique workers.
const SUM_SHADER: &str = r#"
const WORKGROUP_SIZE: u32 = 128u;
const VALUES_PER_WORKER: u32 = 64u;

struct Params {
    n: u32,
}

@group(0) @binding(0) var<storage, read> values: array<u32>;
@group(0) @binding(1) var<storage, read_write> total: atomic<u32>;
@group(0) @binding(2) var<uniform> params: Params;

var<workgroup> scratch: array<u32, 128>;

fn worker_id(wid: vec3<u32>, nwg: vec3<u32>, lid: u32) -> u32 {
    return (wid.y * nwg.x + wid.x) * WORKGROUP_SIZE + lid;
}

// One worker per element, one atomic add per element. The contention
// floor every other kernel is measured against.
@compute @workgroup_size(128)
fn sum_global_atomic(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>
) {
    let i = worker_id(wid, nwg, lid.x);
    if (i < params.n) {
        atomicAdd(&total, values[i]);
    }
}

// Each worker folds a consecutive run of VALUES_PER_WORKER elements
// into a private register, then contributes one atomic add.
@compute @workgroup_size(128)
fn sum_strided_cycle(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>
) {
    let w = worker_id(wid, nwg, lid.x);
    let workers = (params.n + VALUES_PER_WORKER - 1u) / VALUES_PER_WORKER;
    if (w >= workers) {
        return;
    }
    var acc = 0u;
    for (var k = 0u; k < VALUES_PER_WORKER; k = k + 1u) {
        let i = w * VALUES_PER_WORKER + k;
        if (i < params.n) {
            acc = acc + values[i];
        }
    }
    atomicAdd(&total, acc);
}

// Same work per worker as the strided kernel, but step k of every
// worker reads index k * workers + w, so concurrently executing
// workers touch contiguous addresses together.
@compute @workgroup_size(128)
fn sum_coalesced_cycle(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>
) {
    let w = worker_id(wid, nwg, lid.x);
    let workers = (params.n + VALUES_PER_WORKER - 1u) / VALUES_PER_WORKER;
    if (w >= workers) {
        return;
    }
    var acc = 0u;
    for (var k = 0u; k < VALUES_PER_WORKER; k = k + 1u) {
        let i = k * workers + w;
        if (i < params.n) {
            acc = acc + values[i];
        }
    }
    atomicAdd(&total, acc);
}

// Cooperative load into workgroup scratch, barrier, then the group
// leader folds the scratch linearly and contributes one atomic add
// per group.
@compute @workgroup_size(128)
fn sum_local_buffer(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>
) {
    let i = worker_id(wid, nwg, lid.x);
    var v = 0u;
    if (i < params.n) {
        v = values[i];
    }
    scratch[lid.x] = v;
    workgroupBarrier();

    if (lid.x == 0u) {
        var group_total = 0u;
        for (var k = 0u; k < WORKGROUP_SIZE; k = k + 1u) {
            group_total = group_total + scratch[k];
        }
        atomicAdd(&total, group_total);
    }
}

// Recursive halving in workgroup scratch. Each pass the surviving
// half adds its partner's value; a barrier separates producer and
// consumer passes. Exactly one atomic add per group survives.
@compute @workgroup_size(128)
fn sum_tree(
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>
) {
    let i = worker_id(wid, nwg, lid.x);
    var v = 0u;
    if (i < params.n) {
        v = values[i];
    }
    scratch[lid.x] = v;
    workgroupBarrier();

    for (var s = WORKGROUP_SIZE / 2u; s > 0u; s = s / 2u) {
        if (lid.x < s) {
            scratch[lid.x] = scratch[lid.x] + scratch[lid.x + s];
        }
        workgroupBarrier();
    }

    if (lid.x == 0u) {
        atomicAdd(&total, scratch[0]);
    }
}
"#;

/// The closed set of device reduction strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    GlobalAtomic,
    StridedCycle,
    CoalescedCycle,
    LocalBuffer,
    Tree,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::GlobalAtomic,
        Strategy::StridedCycle,
        Strategy::CoalescedCycle,
        Strategy::LocalBuffer,
        Strategy::Tree,
    ];

    pub fn entry_point(self) -> &'static str {
        match self {
            Strategy::GlobalAtomic => "sum_global_atomic",
            Strategy::StridedCycle => "sum_strided_cycle",
            Strategy::CoalescedCycle => "sum_coalesced_cycle",
            Strategy::LocalBuffer => "sum_local_buffer",
            Strategy::Tree => "sum_tree",
        }
    }

    /// Parallel workers launched for `n` elements. The cycle kernels
    /// fold VALUES_PER_WORKER elements per worker; the rest assign one
    /// worker per element.
    pub fn worker_count(self, n: u32) -> u32 {
        match self {
            Strategy::GlobalAtomic | Strategy::LocalBuffer | Strategy::Tree => n,
            Strategy::StridedCycle | Strategy::CoalescedCycle => n.div_ceil(VALUES_PER_WORKER),
        }
    }
}

/// Workgroup grid for one strategy invocation. Wide dispatches fold
/// into two dimensions to stay under the per-dimension device limit;
/// workers in the padded tail bounds-check out in the shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkSize {
    pub workers: u32,
    pub groups_x: u32,
    pub groups_y: u32,
}

impl WorkSize {
    pub fn new(workers: u32, max_groups_per_dim: u32) -> Self {
        let groups = workers.div_ceil(WORKGROUP_SIZE);
        if groups == 0 {
            return Self {
                workers,
                groups_x: 0,
                groups_y: 0,
            };
        }
        let groups_x = groups.min(max_groups_per_dim);
        let groups_y = groups.div_ceil(groups_x);
        Self {
            workers,
            groups_x,
            groups_y,
        }
    }
}

/// Compiled pipelines for the five strategies, bound to one session's
/// buffers.
pub struct SumKernels {
    pipelines: Vec<(Strategy, wgpu::ComputePipeline)>,
    bind_group: wgpu::BindGroup,
}

impl SumKernels {
    pub fn new(ctx: &GpuContext, buffers: &SumBuffers) -> Self {
        let shader = ctx.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("sum"),
            source: ShaderSource::Wgsl(SUM_SHADER.into()),
        });
        info!(shader_len = SUM_SHADER.len(), "sum kernels compiled");

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: Some("sum bind group layout"),
                    entries: &[
                        BindGroupLayoutEntry {
                            binding: 0,
                            visibility: ShaderStages::COMPUTE,
                            ty: BindingType::Buffer {
                                ty: BufferBindingType::Storage { read_only: true },
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        BindGroupLayoutEntry {
                            binding: 1,
                            visibility: ShaderStages::COMPUTE,
                            ty: BindingType::Buffer {
                                ty: BufferBindingType::Storage { read_only: false },
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        BindGroupLayoutEntry {
                            binding: 2,
                            visibility: ShaderStages::COMPUTE,
                            ty: BindingType::Buffer {
                                ty: BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("sum pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipelines = Strategy::ALL
            .iter()
            .map(|&strategy| {
                let pipeline =
                    ctx.device
                        .create_compute_pipeline(&ComputePipelineDescriptor {
                            label: Some(strategy.entry_point()),
                            layout: Some(&pipeline_layout),
                            module: &shader,
                            entry_point: strategy.entry_point(),
                            compilation_options: PipelineCompilationOptions::default(),
                        });
                (strategy, pipeline)
            })
            .collect();

        let bind_group = ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some("sum bind group"),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(buffers.values.as_entire_buffer_binding()),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Buffer(buffers.total.as_entire_buffer_binding()),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Buffer(buffers.params.as_entire_buffer_binding()),
                },
            ],
        });
        info!("sum pipelines created");

        Self {
            pipelines,
            bind_group,
        }
    }

    /// Launch one strategy over the session's input and read back the
    /// scalar result. The caller must have zeroed the total first.
    pub fn execute(&self, ctx: &GpuContext, buffers: &SumBuffers, strategy: Strategy) -> u32 {
        let max_dim = ctx.device.limits().max_compute_workgroups_per_dimension;
        let work = WorkSize::new(strategy.worker_count(buffers.n), max_dim);
        debug!(
            kernel = strategy.entry_point(),
            workers = work.workers,
            groups_x = work.groups_x,
            groups_y = work.groups_y,
            "dispatch"
        );

        let pipeline = &self
            .pipelines
            .iter()
            .find(|(s, _)| *s == strategy)
            .expect("pipeline exists for every strategy")
            .1;

        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some(strategy.entry_point()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(strategy.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(work.groups_x, work.groups_y, 1);
        }
        ctx.queue.submit(Some(encoder.finish()));

        buffers.read_total(ctx)
    }
}
