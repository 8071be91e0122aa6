use std::path::Path;

use tracing::info;

use crate::core::processing::aggregate::AreaStatistics;
use crate::error::Result;

/// Write the area statistics as a one-row table with a header
pub fn write_statistics_csv(path: &Path, stats: &AreaStatistics) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.serialize(stats)?;
    writer.flush()?;
    info!("Saved statistics table {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_single_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let stats = AreaStatistics {
            forest_area_ha: 4321.5,
            nonforest_area_ha: 3532.25,
        };
        write_statistics_csv(&path, &stats).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["forest_area_ha,nonforest_area_ha", "4321.5,3532.25"]);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<AreaStatistics> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(back, vec![stats]);
    }
}
