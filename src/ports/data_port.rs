//! Bar data access port.

use crate::domain::error::TreefolioError;
use crate::domain::series::BarFrame;

/// A source of named bar frames. Loading data is an external collaborator:
/// the engine itself only ever sees already-merged frames.
pub trait BarSource {
    fn load(&self, symbol: &str) -> Result<BarFrame, TreefolioError>;

    fn symbols(&self) -> Result<Vec<String>, TreefolioError>;
}
