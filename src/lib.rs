use std::fmt;

pub mod gpu;
pub mod harness;
pub mod host;
pub mod input;
pub mod strategies;

pub use gpu::{GpuContext, SumBuffers};
pub use harness::BenchReport;
pub use strategies::{Strategy, SumKernels, WorkSize};

#[derive(Debug)]
pub enum Error {
    GpuInit(String),
    Allocation(String),
    Mismatch {
        label: String,
        expected: u32,
        actual: u32,
        at: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GpuInit(msg) => write!(f, "GPU initialization failed: {}", msg),
            Error::Allocation(msg) => write!(f, "device allocation failed: {}", msg),
            Error::Mismatch {
                label,
                expected,
                actual,
                at,
            } => write!(
                f,
                "{}: result should be consistent! But {} != {}, {}",
                label, expected, actual, at
            ),
        }
    }
}

impl std::error::Error for Error {}
