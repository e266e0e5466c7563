// One error type for the whole effect.
// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),   // Creating the window failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Pushing the frame to the window failed
    #[error("Asset load error: {path}: {reason}")]
    AssetLoad { path: String, reason: String }, // Picture / glow sprite could not be decoded
    #[error("GPU init error: {0}")]
    GpuInit(String),      // No adapter/device, or pipeline creation failed
    #[error("GPU readback error: {0}")]
    GpuReadback(String),  // Mapping the rendered frame back to the CPU failed
    #[error("Config error: {0}")]
    Config(String),       // A command-line value is out of range
}
