pub mod artifact;
pub mod axis;
pub mod backend;
pub mod error;
pub mod range;
pub mod spec;
pub mod tensor;

pub use artifact::*;
pub use axis::*;
pub use backend::*;
pub use error::*;
pub use range::*;
pub use spec::*;
pub use tensor::*;

/// Polled by long-running searches; set it from another thread to stop them.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
