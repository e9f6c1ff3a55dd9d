use std::sync::{Mutex, MutexGuard, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Serializes access to process environment and restores every touched
/// variable on drop.
pub(crate) struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn acquire() -> Self {
        let lock = env_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            saved: Vec::new(),
            _lock: lock,
        }
    }

    pub(crate) fn set(&mut self, key: &'static str, value: &str) -> &mut Self {
        self.saved.push((key, std::env::var(key).ok()));
        std::env::set_var(key, value);
        self
    }

    pub(crate) fn unset(&mut self, key: &'static str) -> &mut Self {
        self.saved.push((key, std::env::var(key).ok()));
        std::env::remove_var(key);
        self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain(..).rev() {
            match original {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}
