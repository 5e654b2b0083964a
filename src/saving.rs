use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::dataset::Dataset;
use crate::downloader::to_csv;
use crate::error::{TribesError, TribesResult};
use crate::record::{ConnectionRecord, PointsRecord, Record};

/// Write the whole dataset to `path` as CSV.
///
/// The content goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers see either the old file or the new one.
pub fn persist<R: Record>(dataset: &Dataset<R>, path: &Path) -> TribesResult<()> {
    stage(dataset, path)?.commit()?;
    log::info!("saved {} {} rows to {}", dataset.len(), R::KIND, path.display());
    Ok(())
}

/// New file content, written and synced next to its target but not yet in place.
#[derive(Debug)]
pub struct Staged {
    file: NamedTempFile,
    path: PathBuf,
}

impl Staged {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the staged file over its target.
    pub fn commit(self) -> TribesResult<()> {
        self.file
            .persist(&self.path)
            .map_err(|e| TribesError::Io(e.error))?;
        Ok(())
    }
}

/// Write `dataset` as CSV into a temporary file beside `path`.
pub fn stage<R: Record>(dataset: &Dataset<R>, path: &Path) -> TribesResult<Staged> {
    stage_bytes(to_csv(dataset).as_bytes(), path)
}

fn stage_bytes(content: &[u8], path: &Path) -> TribesResult<Staged> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    Ok(Staged {
        file,
        path: path.to_path_buf(),
    })
}

/// Put every staged file in place, or none of them.
///
/// The current content of each target is read before anything is renamed.
/// If a rename fails, the targets already replaced get their old content
/// back (or are removed if they did not exist) and the rename error is
/// returned.
pub fn commit_all(staged: Vec<Staged>) -> TribesResult<()> {
    let mut previous = Vec::with_capacity(staged.len());
    for item in &staged {
        previous.push(read_existing(item.path())?);
    }

    let mut done: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::new();
    for (item, before) in staged.into_iter().zip(previous) {
        let path = item.path.clone();
        if let Err(e) = item.commit() {
            for (path, before) in done.into_iter().rev() {
                if let Err(undo) = put_back(&path, before) {
                    log::error!("could not roll back {}: {}", path.display(), undo);
                }
            }
            return Err(e);
        }
        done.push((path, before));
    }
    Ok(())
}

fn read_existing(path: &Path) -> TribesResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn put_back(path: &Path, before: Option<Vec<u8>>) -> TribesResult<()> {
    match before {
        Some(bytes) => stage_bytes(&bytes, path)?.commit(),
        None => Ok(std::fs::remove_file(path)?),
    }
}

/// Both datasets at one moment, for backup and restore.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub points: Vec<PointsRecord>,
    pub connection: Vec<ConnectionRecord>,
}

impl Snapshot {
    pub fn new(points: &Dataset<PointsRecord>, connection: &Dataset<ConnectionRecord>) -> Self {
        Snapshot {
            points: points.rows().to_vec(),
            connection: connection.rows().to_vec(),
        }
    }
}

/// Gzip-compressed bincode encoding of a snapshot.
pub fn encode_snapshot<W: Write>(snapshot: &Snapshot, out: W) -> TribesResult<()> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut writer = BufWriter::new(encoder);
    serialize_into(&mut writer, snapshot)?;
    let encoder = writer
        .into_inner()
        .map_err(|e| TribesError::Snapshot(e.error().to_string()))?;
    encoder.finish()?;
    Ok(())
}

pub fn decode_snapshot<R: Read>(input: R) -> TribesResult<Snapshot> {
    let decoder = GzDecoder::new(input);
    let mut reader = BufReader::new(decoder);
    let snapshot: Snapshot = deserialize_from(&mut reader)?;
    Ok(snapshot)
}

pub fn save_snapshot(snapshot: &Snapshot, path: &Path) -> TribesResult<()> {
    let file = std::fs::File::create(path)?;
    encode_snapshot(snapshot, file)?;
    log::info!(
        "wrote snapshot with {} points and {} connection rows to {}",
        snapshot.points.len(),
        snapshot.connection.len(),
        path.display()
    );
    Ok(())
}

pub fn load_snapshot(path: &Path) -> TribesResult<Snapshot> {
    let file = std::fs::File::open(path)?;
    decode_snapshot(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;
    use crate::record::Tribe;
    use chrono::NaiveDate;

    fn visit(d: u32, youth_count: u32) -> ConnectionRecord {
        ConnectionRecord {
            date: NaiveDate::from_ymd_opt(2024, 2, d).unwrap(),
            tribe: Tribe::new("Tribo Judá").unwrap(),
            youth_count,
        }
    }

    #[test]
    fn persist_then_load_returns_the_same_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conexao_tribos.csv");
        let data = Dataset::new(vec![visit(1, 4), visit(2, 9)]);

        persist(&data, &path).unwrap();

        let loaded = load::<ConnectionRecord>(&path).unwrap();
        assert_eq!(loaded.dataset, data);
    }

    #[test]
    fn persist_overwrites_the_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conexao_tribos.csv");
        persist(&Dataset::new(vec![visit(1, 4), visit(2, 9)]), &path).unwrap();
        persist(&Dataset::new(vec![visit(3, 1)]), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Date,Tribe,Jovens\n2024-02-03,Tribo Judá,1\n");
    }

    #[test]
    fn persist_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("conexao_tribos.csv");
        persist(&Dataset::<ConnectionRecord>::default(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Date,Tribe,Jovens\n");
    }

    #[test]
    fn snapshot_survives_encoding() {
        let snapshot = Snapshot {
            points: Vec::new(),
            connection: vec![visit(1, 4), visit(2, 9)],
        };
        let mut buffer = Vec::new();
        encode_snapshot(&snapshot, &mut buffer).unwrap();
        assert_eq!(decode_snapshot(buffer.as_slice()).unwrap(), snapshot);
    }

    #[test]
    fn garbage_is_not_a_snapshot() {
        assert!(decode_snapshot(&b"not gzip at all"[..]).is_err());
    }

    #[test]
    fn commit_all_rolls_back_when_a_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        let points_path = dir.path().join("pontos_tribos.csv");
        std::fs::write(&points_path, "Date,Tribe,Game,Points\n").unwrap();
        let nested = dir.path().join("nested");
        let visits_path = nested.join("conexao_tribos.csv");

        let staged_points = stage(&Dataset::<PointsRecord>::default(), &points_path).unwrap();
        let staged_visits = stage(&Dataset::new(vec![visit(1, 4)]), &visits_path).unwrap();
        std::fs::remove_dir_all(&nested).unwrap();

        assert!(commit_all(vec![staged_points, staged_visits]).is_err());
        assert_eq!(
            std::fs::read_to_string(&points_path).unwrap(),
            "Date,Tribe,Game,Points\n"
        );
    }

    #[test]
    fn commit_all_replaces_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        std::fs::write(&first, "old").unwrap();

        let staged = vec![
            stage(&Dataset::new(vec![visit(1, 4)]), &first).unwrap(),
            stage(&Dataset::new(vec![visit(2, 5)]), &second).unwrap(),
        ];
        commit_all(staged).unwrap();

        assert_eq!(load::<ConnectionRecord>(&first).unwrap().dataset.len(), 1);
        assert_eq!(
            load::<ConnectionRecord>(&second).unwrap().dataset.get(0),
            Some(&visit(2, 5))
        );
    }
}
