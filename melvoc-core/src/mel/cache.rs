//! Lazily built, write-once cache for mel bases, analysis windows and FFT plans.
//!
//! Entries are created on first use per key and never mutated afterwards.
//! Lookups take a shared read lock; a miss upgrades to the write lock and
//! re-checks before building, so concurrent first callers never build the
//! same entry twice.
//!
//! Extractors normally share [`MelCache::global`]. Tests and embedders that
//! need isolation construct their own `MelCache` and pass it in.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use ndarray::Array2;
use parking_lot::RwLock;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

use super::filters::{build_hann_window, build_mel_basis};
use super::MelConfig;

static GLOBAL: OnceLock<Arc<MelCache>> = OnceLock::new();

/// Every parameter the mel basis depends on. Float bounds are keyed by bit
/// pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BasisKey {
    sampling_rate: u32,
    n_fft: usize,
    num_mels: usize,
    fmin_bits: u32,
    fmax_bits: u32,
}

impl From<&MelConfig> for BasisKey {
    fn from(c: &MelConfig) -> Self {
        Self {
            sampling_rate: c.sampling_rate,
            n_fft: c.n_fft,
            num_mels: c.num_mels,
            fmin_bits: c.fmin.to_bits(),
            fmax_bits: c.fmax.to_bits(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WindowKey {
    win_size: usize,
    n_fft: usize,
}

#[derive(Default)]
pub struct MelCache {
    bases: RwLock<HashMap<BasisKey, Arc<Array2<f32>>>>,
    windows: RwLock<HashMap<WindowKey, Arc<Vec<f32>>>>,
    plans: RwLock<HashMap<usize, Arc<dyn Fft<f32>>>>,
}

impl MelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide shared instance.
    pub fn global() -> Arc<MelCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MelCache::new())))
    }

    pub fn mel_basis(&self, config: &MelConfig) -> Arc<Array2<f32>> {
        get_or_build(&self.bases, BasisKey::from(config), || {
            debug!(
                sampling_rate = config.sampling_rate,
                n_fft = config.n_fft,
                num_mels = config.num_mels,
                fmin = config.fmin,
                fmax = config.fmax,
                "building mel basis"
            );
            Arc::new(build_mel_basis(
                config.sampling_rate,
                config.n_fft,
                config.num_mels,
                config.fmin,
                config.fmax,
            ))
        })
    }

    pub fn window(&self, win_size: usize, n_fft: usize) -> Arc<Vec<f32>> {
        get_or_build(&self.windows, WindowKey { win_size, n_fft }, || {
            debug!(win_size, n_fft, "building hann window");
            Arc::new(build_hann_window(win_size, n_fft))
        })
    }

    pub fn fft_plan(&self, n_fft: usize) -> Arc<dyn Fft<f32>> {
        get_or_build(&self.plans, n_fft, || {
            debug!(n_fft, "planning forward fft");
            FftPlanner::<f32>::new().plan_fft_forward(n_fft)
        })
    }

    /// Number of distinct mel bases built so far.
    pub fn basis_count(&self) -> usize {
        self.bases.read().len()
    }

    /// Number of distinct windows built so far.
    pub fn window_count(&self) -> usize {
        self.windows.read().len()
    }
}

impl std::fmt::Debug for MelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MelCache")
            .field("bases", &self.basis_count())
            .field("windows", &self.window_count())
            .finish_non_exhaustive()
    }
}

fn get_or_build<K, V>(
    map: &RwLock<HashMap<K, Arc<V>>>,
    key: K,
    build: impl FnOnce() -> Arc<V>,
) -> Arc<V>
where
    K: Eq + Hash,
    V: ?Sized,
{
    if let Some(hit) = map.read().get(&key) {
        return Arc::clone(hit);
    }
    let mut guard = map.write();
    Arc::clone(guard.entry(key).or_insert_with(build))
}
