use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::World;

/// One line of the citizen name snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CitizenNameRecord {
    name: String,
}

/// Write an iterator of serializable items to a JSONL file (one JSON object per line).
fn write_jsonl<T: Serialize>(path: &Path, items: impl Iterator<Item = T>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, &item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the names of all living citizens to `path`, one JSON object per line.
///
/// Creates the parent directory if it does not exist. Only names are kept;
/// loading them back re-adds fresh citizens.
pub fn flush_citizen_names(world: &World, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let records = world.living_citizens().map(|c| CitizenNameRecord {
        name: c.name.clone(),
    });
    write_jsonl(path, records)?;
    tracing::debug!(path = %path.display(), "citizen names flushed");
    Ok(())
}

/// Read names written by [`flush_citizen_names`]. Blank lines are skipped.
pub fn load_citizen_names(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CitizenNameRecord = serde_json::from_str(&line)?;
        names.push(record.name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::SimConfig;
    use crate::error::SimError;
    use crate::model::{DeathReason, World};
    use crate::sim::add_citizen;
    use crate::sim::mortality::kill;

    #[test]
    fn only_living_names_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot").join("citizens.jsonl");
        let mut world = World::new(SimConfig::default());
        let mut rng = SmallRng::seed_from_u64(1);
        add_citizen(&mut world, "Ada", &mut rng).unwrap();
        let bo = add_citizen(&mut world, "Bo", &mut rng).unwrap();
        add_citizen(&mut world, "Cy", &mut rng).unwrap();
        kill(&mut world, bo, DeathReason::Starved);

        flush_citizen_names(&world, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(load_citizen_names(&path).unwrap(), vec!["Ada", "Cy"]);
    }

    #[test]
    fn garbage_line_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citizens.jsonl");
        fs::write(&path, "{\"name\":\"Ada\"}\n\nnot json\n").unwrap();
        let err = load_citizen_names(&path).unwrap_err();
        assert!(matches!(err, SimError::Serialization(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_citizen_names(&dir.path().join("nope.jsonl")).unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }
}
