use crate::oplog::{OperationLog, PlannedMove};
use crate::tagger::sidecar_path;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UndoResult {
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Moves `source` to `destination`, creating parent directories.
///
/// An occupied destination is refused. Across devices the file is copied and
/// the original removed; if removal fails the copy is deleted again so the
/// file only ever exists at one of the two paths.
pub fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if !source.exists() {
        bail!("source file does not exist: {}", source.display());
    }
    if destination.exists() {
        bail!("destination already exists: {}", destination.display());
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            log::debug!("cross-device move, copying {}", source.display());
            copy_then_remove(source, destination)
        }
        Err(err) => Err(err).with_context(|| {
            format!(
                "failed to move {} -> {}",
                source.display(),
                destination.display()
            )
        }),
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> Result<()> {
    if let Err(err) = fs::copy(source, destination) {
        let _ = fs::remove_file(destination);
        return Err(err).with_context(|| {
            format!(
                "failed to copy {} -> {}",
                source.display(),
                destination.display()
            )
        });
    }
    if let Err(err) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(err)
            .with_context(|| format!("failed to remove original: {}", source.display()));
    }
    Ok(())
}

/// Replays `log` back to front. Entries whose destination is gone are
/// skipped; a failing entry is logged and the rest still run.
pub fn undo_operations(log: &OperationLog) -> UndoResult {
    let mut result = UndoResult::default();
    for op in log.entries().iter().rev() {
        if !op.destination.exists() {
            log::debug!("nothing to undo at {}", op.destination.display());
            result.skipped += 1;
            continue;
        }
        match restore_operation(op) {
            Ok(()) => {
                log::info!(
                    "restored {} -> {}",
                    op.destination.display(),
                    op.source.display()
                );
                result.restored += 1;
            }
            Err(err) => {
                log::error!("failed to undo {}: {err:#}", op.destination.display());
                result.failed += 1;
            }
        }
    }
    result
}

fn restore_operation(op: &PlannedMove) -> Result<()> {
    move_file(&op.destination, &op.source)?;

    let sidecar = sidecar_path(&op.destination);
    if sidecar.exists() {
        if let Err(err) = fs::remove_file(&sidecar) {
            log::warn!("failed to remove tag sidecar {}: {err}", sidecar.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{move_file, undo_operations, UndoResult};
    use crate::oplog::{OperationLog, PlannedMove};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn op(source: &Path, destination: &Path) -> PlannedMove {
        PlannedMove {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            capture_time: None,
            location: None,
            tags: None,
        }
    }

    #[test]
    fn move_file_creates_parents() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("IMG.jpg");
        let destination = temp.path().join("a").join("b").join("IMG.jpg");
        fs::write(&source, b"x").expect("write");

        move_file(&source, &destination).expect("move");
        assert!(!source.exists());
        assert_eq!(fs::read(&destination).expect("read"), b"x");
    }

    #[test]
    fn move_file_refuses_occupied_destination() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("IMG.jpg");
        let destination = temp.path().join("taken.jpg");
        fs::write(&source, b"new").expect("write source");
        fs::write(&destination, b"old").expect("write destination");

        let err = move_file(&source, &destination).expect_err("occupied");
        assert!(err.to_string().contains("destination already exists"));
        assert!(source.exists());
        assert_eq!(fs::read(&destination).expect("read"), b"old");
    }

    #[test]
    fn move_file_reports_missing_source() {
        let temp = tempdir().expect("tempdir");
        let err = move_file(&temp.path().join("gone.jpg"), &temp.path().join("x.jpg"))
            .expect_err("missing");
        assert!(err.to_string().contains("source file does not exist"));
    }

    #[test]
    fn undo_restores_in_reverse_and_removes_sidecars() {
        let temp = tempdir().expect("tempdir");
        let original = temp.path().join("src").join("nested").join("IMG.jpg");
        let first = temp.path().join("dest").join("IMG.jpg");
        let second = temp.path().join("dest").join("moved-again").join("IMG.jpg");
        fs::create_dir_all(second.parent().expect("parent")).expect("mkdir");
        fs::write(&second, b"x").expect("write");
        fs::write(second.with_extension("json"), b"{}").expect("write sidecar");

        // the same file moved twice; reverse replay walks it all the way back
        let log = OperationLog::from(vec![op(&original, &first), op(&first, &second)]);
        let result = undo_operations(&log);

        assert_eq!(
            result,
            UndoResult {
                restored: 2,
                skipped: 0,
                failed: 0
            }
        );
        assert!(original.exists());
        assert!(!first.exists());
        assert!(!second.exists());
        assert!(!second.with_extension("json").exists());
    }

    #[test]
    fn undo_skips_missing_destinations_and_continues_after_failure() {
        let temp = tempdir().expect("tempdir");
        let from_a = temp.path().join("A.jpg");
        let to_a = temp.path().join("dest").join("A.jpg");
        let from_b = temp.path().join("B.jpg");
        let to_b = temp.path().join("dest").join("B.jpg");
        let from_c = temp.path().join("C.jpg");
        let to_c = temp.path().join("dest").join("C.jpg");
        fs::create_dir_all(temp.path().join("dest")).expect("mkdir");
        fs::write(&to_a, b"A").expect("write A");
        fs::write(&to_c, b"C").expect("write C");
        // C's original path is occupied by something else
        fs::write(&from_c, b"other").expect("write blocker");

        let log = OperationLog::from(vec![
            op(&from_a, &to_a),
            op(&from_b, &to_b),
            op(&from_c, &to_c),
        ]);
        let result = undo_operations(&log);

        assert_eq!(result.restored, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 1);
        assert!(from_a.exists());
        assert!(!from_b.exists());
        assert!(to_c.exists());
        assert_eq!(fs::read(&from_c).expect("read"), b"other");
    }

    #[test]
    fn undo_twice_is_a_no_op() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("IMG.jpg");
        let destination = temp.path().join("dest").join("IMG.jpg");
        fs::create_dir_all(temp.path().join("dest")).expect("mkdir");
        fs::write(&destination, b"x").expect("write");
        let log = OperationLog::from(vec![op(&source, &destination)]);

        assert_eq!(undo_operations(&log).restored, 1);
        let second = undo_operations(&log);
        assert_eq!(
            second,
            UndoResult {
                restored: 0,
                skipped: 1,
                failed: 0
            }
        );
        assert!(source.exists());
    }
}
