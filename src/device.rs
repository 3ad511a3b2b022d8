use candle_core::Device;
use once_cell::sync::Lazy;

/// Device every estimator and batch tensor lives on. CUDA when the build and
/// the host support it, CPU otherwise.
pub static DEVICE: Lazy<Device> = Lazy::new(|| {
    if std::env::var_os("BUG_EXPLORER_CPU").is_some() {
        return Device::Cpu;
    }
    match Device::new_cuda(0) {
        Ok(device) => {
            tracing::info!("using CUDA device 0");
            device
        }
        Err(err) => {
            tracing::debug!("CUDA unavailable ({err}), falling back to CPU");
            Device::Cpu
        }
    }
});
