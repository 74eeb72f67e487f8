//! Backend Selector
//!
//! Selects the Burn backend from feature flags. Only one backend can be
//! active at a time; `--cuda` on the command line is validated against it.

use burn::backend::Autodiff;

use crate::error::{LmError, Result};

// ============ CUDA BACKEND ============
#[cfg(all(feature = "cuda", not(feature = "gpu")))]
mod backend_impl {
    pub use burn::backend::cuda_jit::{Cuda, CudaDevice};
    pub type MyBackend = Cuda;

    pub const ACCELERATED: bool = true;

    pub fn get_device() -> CudaDevice {
        CudaDevice::new(0)
    }
}

// ============ WGPU BACKEND ============
#[cfg(all(feature = "gpu", not(feature = "cuda")))]
mod backend_impl {
    pub use burn::backend::wgpu::{Wgpu, WgpuDevice};
    pub type MyBackend = Wgpu<f32, i32>;

    pub const ACCELERATED: bool = true;

    pub fn get_device() -> WgpuDevice {
        WgpuDevice::BestAvailable
    }
}

// ============ CPU (NDARRAY) BACKEND / FALLBACK ============
#[cfg(not(any(
    all(feature = "cuda", not(feature = "gpu")),
    all(feature = "gpu", not(feature = "cuda"))
)))]
mod backend_impl {
    pub use burn::backend::ndarray::{NdArray, NdArrayDevice};
    pub type MyBackend = NdArray;

    pub const ACCELERATED: bool = false;

    pub fn get_device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

// ============ PUBLIC EXPORTS ============
pub use backend_impl::{get_device, MyBackend};

/// Backend with autodiff for training
pub type TrainBackend = Autodiff<MyBackend>;

/// Device for this run. Asking for an accelerator the binary was not built
/// with is an error, never a silent CPU fallback.
pub fn select_device(use_accelerator: bool) -> Result<<MyBackend as burn::tensor::backend::Backend>::Device> {
    if use_accelerator && !backend_impl::ACCELERATED {
        return Err(LmError::CudaUnavailable);
    }
    Ok(get_device())
}

/// Name of the compiled backend
pub fn backend_name() -> &'static str {
    #[cfg(all(feature = "cuda", not(feature = "gpu")))]
    {
        return "CUDA";
    }

    #[cfg(all(feature = "gpu", not(feature = "cuda")))]
    {
        return "WGPU";
    }

    #[cfg(not(any(
        all(feature = "cuda", not(feature = "gpu")),
        all(feature = "gpu", not(feature = "cuda"))
    )))]
    {
        return "CPU (NdArray)";
    }
}
