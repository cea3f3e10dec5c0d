use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing block-height feed from the execution
/// substrate. The engine never manages time itself.
pub trait HeightSource: Send + Sync {
    fn current_height(&self) -> u64;
}

/// Manually advanced height for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualHeight {
    height: AtomicU64,
}

impl ManualHeight {
    pub fn new(start: u64) -> Self {
        Self {
            height: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, blocks: u64) {
        self.height.fetch_add(blocks, Ordering::SeqCst);
    }

    pub fn set(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }
}

impl HeightSource for ManualHeight {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_height_advances() {
        let height = ManualHeight::new(5);
        assert_eq!(height.current_height(), 5);
        height.advance(150);
        assert_eq!(height.current_height(), 155);
        height.set(7);
        assert_eq!(height.current_height(), 7);
    }
}
