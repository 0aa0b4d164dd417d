//! One-call driver: simulate paths, then assemble the surface tensor.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;
use volsim_core::traits::OptionOracle;
use volsim_core::types::SurfaceError;
use volsim_models::models::HestonParams;

use crate::config::EngineConfig;
use crate::simulation::{simulate_paths_parallel, simulate_paths_seeded, PathTensor, SimulationConfig};
use crate::surface::{SimulationTensor, SurfaceAssembler};

/// Configured simulation plus surface assembly.
///
/// # Examples
///
/// ```
/// use volsim_engine::{EngineConfig, SurfaceEngine};
/// use volsim_models::analytical::BlackScholesOracle;
///
/// let mut config = EngineConfig::default();
/// config.simulation.n_paths = 2;
/// config.simulation.n_steps = 4;
/// config.simulation.seed = Some(42);
///
/// let engine = SurfaceEngine::from_config(&config, BlackScholesOracle::new()).unwrap();
/// let tensor = engine.run().unwrap();
/// assert_eq!(tensor.shape(), [2, 5, 4, 5]);
/// ```
pub struct SurfaceEngine<O> {
    heston: HestonParams,
    simulation: SimulationConfig,
    seed: u64,
    assembler: SurfaceAssembler<O>,
    maturities: Vec<f64>,
    deltas: Vec<f64>,
    parallel: bool,
    pool: Option<ThreadPool>,
}

impl<O: OptionOracle> SurfaceEngine<O> {
    /// Build from a validated config.
    ///
    /// Without a configured seed, one is drawn from entropy and logged so
    /// the run can be replayed.
    ///
    /// # Errors
    /// `InvalidParameter` for an invalid config or model settings; `Config`
    /// for a worker pool that cannot be created.
    pub fn from_config(config: &EngineConfig, oracle: O) -> Result<Self, SurfaceError> {
        config.validate()?;

        let simulation = config.simulation_config()?;
        let seed = simulation.seed().unwrap_or_else(rand::random);

        let pool = match config.runtime.worker_threads {
            Some(threads) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("volsim-worker-{i}"))
                    .build()
                    .map_err(|e| SurfaceError::Config(format!("failed to build worker pool: {e}")))?,
            ),
            None => None,
        };

        info!(
            seed,
            seeded = simulation.seed().is_some(),
            worker_threads = ?config.runtime.worker_threads,
            parallel = config.runtime.parallel,
            "surface engine configured"
        );

        Ok(Self {
            heston: config.heston_params()?,
            simulation,
            seed,
            assembler: config.assembler(oracle)?,
            maturities: config.surface.maturities.clone(),
            deltas: config.surface.deltas.clone(),
            parallel: config.runtime.parallel,
            pool,
        })
    }

    /// Base seed used for every run of this engine.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Heston dynamics.
    pub fn heston(&self) -> &HestonParams {
        &self.heston
    }

    /// Simulation grid.
    pub fn simulation(&self) -> &SimulationConfig {
        &self.simulation
    }

    /// Surface assembler.
    pub fn assembler(&self) -> &SurfaceAssembler<O> {
        &self.assembler
    }

    /// Price and variance paths only.
    pub fn simulate(&self) -> Result<PathTensor, SurfaceError> {
        self.install(|| {
            if self.parallel {
                simulate_paths_parallel(&self.heston, &self.simulation, self.seed)
            } else {
                simulate_paths_seeded(&self.heston, &self.simulation, self.seed)
            }
        })
    }

    /// Paths and the full surface tensor.
    pub fn run(&self) -> Result<SimulationTensor, SurfaceError> {
        let paths = self.simulate()?;
        self.install(|| {
            if self.parallel {
                self.assembler.build_tensor(&self.maturities, &self.deltas, &paths)
            } else {
                self.assembler
                    .build_tensor_sequential(&self.maturities, &self.deltas, &paths)
            }
        })
    }

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}
