//! Market data sources.

mod csv_source;
mod replay;

pub use csv_source::CsvDataSource;
pub use replay::ReplayFeed;

use std::collections::BTreeMap;
use std::path::Path;
use trading_core::error::DataError;
use trading_core::types::Bar;

/// Load `<dir>/<SYMBOL>.csv` for every symbol.
pub fn load_symbols(
    dir: impl AsRef<Path>,
    symbols: &[String],
) -> Result<BTreeMap<String, Vec<Bar>>, DataError> {
    let dir = dir.as_ref();
    symbols
        .iter()
        .map(|symbol| {
            let path = dir.join(format!("{symbol}.csv"));
            if !path.exists() {
                return Err(DataError::SymbolNotFound(format!(
                    "{symbol} (expected {})",
                    path.display()
                )));
            }
            let bars = CsvDataSource::new(&path)?.load()?;
            Ok((symbol.clone(), bars))
        })
        .collect()
}
