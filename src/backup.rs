use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SelectorError};
use crate::file_utils::{move_file, unique_destination};

/// One image moved aside into the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMove {
    pub original: PathBuf,
    pub backup: PathBuf,
}

/// Owns the backup directory of one working directory and remembers the
/// most recent move so it can be reversed.
#[derive(Debug)]
pub struct BackupManager {
    working_dir: PathBuf,
    backup_dir: PathBuf,
    last_move: Option<BackupMove>,
    dry_run: bool,
}

/// Mirrors `working_dir` beneath `backup_root`, so `/home/me/photos` backs
/// up into `<backup_root>/home/me/photos`.
pub fn backup_dir_for(backup_root: &Path, working_dir: &Path) -> PathBuf {
    let mut dir = backup_root.to_path_buf();
    for component in working_dir.components() {
        if let Component::Normal(part) = component {
            dir.push(part);
        }
    }
    dir
}

impl BackupManager {
    pub fn new(backup_root: &Path, working_dir: &Path) -> Self {
        let backup_dir = backup_dir_for(backup_root, working_dir);
        log::debug!("Backup directory for {:?} is {:?}", working_dir, backup_dir);
        Self {
            working_dir: working_dir.to_path_buf(),
            backup_dir,
            last_move: None,
            dry_run: false,
        }
    }

    /// In dry-run mode `restore_by_name` only logs. Moves come from a
    /// [`Session`](crate::session::Session), which skips them in a dry run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// True when a previous session already moved files out of this folder.
    pub fn has_history(&self) -> bool {
        fs::read_dir(&self.backup_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Moves `path` into the backup directory. A file of the same name that
    /// is already backed up gets a `_copy(N)` sibling instead of being replaced.
    pub fn move_to_backup(&mut self, path: &Path) -> Result<BackupMove> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SelectorError::NotInBackup(path.to_path_buf()))?;

        fs::create_dir_all(&self.backup_dir)?;
        let target = unique_destination(&self.backup_dir, &file_name);
        move_file(path, &target)?;
        log::info!("Moved {:?} -> {:?}", path, target);

        let moved = BackupMove { original: path.to_path_buf(), backup: target };
        self.last_move = Some(moved.clone());
        Ok(moved)
    }

    /// Reverses the most recent move. Only one level of history is kept.
    pub fn undo_last(&mut self) -> Result<BackupMove> {
        let moved = self.last_move.take().ok_or(SelectorError::NothingToUndo)?;
        if moved.original.exists() {
            let path = moved.original.clone();
            self.last_move = Some(moved);
            return Err(SelectorError::DestinationExists(path));
        }
        if let Err(e) = move_file(&moved.backup, &moved.original) {
            self.last_move = Some(moved);
            return Err(e.into());
        }
        log::info!("Restored {:?} from {:?}", moved.original, moved.backup);
        Ok(moved)
    }

    /// Brings a backed-up file back into the working directory by name.
    pub fn restore_by_name(&mut self, file_name: &str) -> Result<PathBuf> {
        let source = self.backup_dir.join(file_name);
        if !source.is_file() {
            return Err(SelectorError::NotInBackup(source));
        }
        let target = self.working_dir.join(file_name);
        if target.exists() {
            return Err(SelectorError::DestinationExists(target));
        }
        if self.dry_run {
            log::info!("[DRY RUN] Would restore {:?} -> {:?}", source, target);
            return Ok(target);
        }
        move_file(&source, &target)?;
        if self.last_move.as_ref().map_or(false, |m| m.backup == source) {
            self.last_move = None;
        }
        log::info!("Restored {:?} -> {:?}", source, target);
        Ok(target)
    }

    /// File names currently held in the backup directory, sorted.
    pub fn list_backed_up(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let work = dir.path().join("photos");
        let root = dir.path().join("backup");
        fs::create_dir_all(&work).unwrap();
        (dir, work, root)
    }

    #[test]
    fn test_backup_dir_mirrors_working_dir() {
        let dir = backup_dir_for(Path::new("/backup"), Path::new("/home/me/photos"));
        assert_eq!(dir, PathBuf::from("/backup/home/me/photos"));
    }

    #[test]
    fn test_move_and_undo() -> Result<()> {
        let (_dir, work, root) = setup();
        let photo = work.join("a.jpg");
        fs::write(&photo, b"pixels")?;

        let mut backup = BackupManager::new(&root, &work);
        let moved = backup.move_to_backup(&photo)?;
        assert!(!photo.exists());
        assert_eq!(moved.backup, backup.backup_dir().join("a.jpg"));
        assert_eq!(fs::read(&moved.backup)?, b"pixels");
        assert_eq!(backup.list_backed_up()?, vec!["a.jpg".to_string()]);

        let undone = backup.undo_last()?;
        assert_eq!(undone, moved);
        assert_eq!(fs::read(&photo)?, b"pixels");
        assert!(matches!(backup.undo_last(), Err(SelectorError::NothingToUndo)));
        Ok(())
    }

    #[test]
    fn test_only_latest_move_is_undoable() -> Result<()> {
        let (_dir, work, root) = setup();
        let a = work.join("a.jpg");
        let b = work.join("b.jpg");
        fs::write(&a, b"a")?;
        fs::write(&b, b"b")?;

        let mut backup = BackupManager::new(&root, &work);
        backup.move_to_backup(&a)?;
        backup.move_to_backup(&b)?;
        backup.undo_last()?;
        assert!(b.exists());
        assert!(!a.exists());
        assert!(matches!(backup.undo_last(), Err(SelectorError::NothingToUndo)));
        Ok(())
    }

    #[test]
    fn test_name_collision_keeps_both_copies() -> Result<()> {
        let (_dir, work, root) = setup();
        let photo = work.join("a.jpg");

        let mut backup = BackupManager::new(&root, &work);
        fs::write(&photo, b"first")?;
        backup.move_to_backup(&photo)?;
        fs::write(&photo, b"second")?;
        let second = backup.move_to_backup(&photo)?;

        assert_eq!(second.backup, backup.backup_dir().join("a_copy(1).jpg"));
        assert_eq!(fs::read(backup.backup_dir().join("a.jpg"))?, b"first");
        assert_eq!(fs::read(&second.backup)?, b"second");
        Ok(())
    }

    #[test]
    fn test_restore_by_name() -> Result<()> {
        let (_dir, work, root) = setup();
        let photo = work.join("a.jpg");
        fs::write(&photo, b"pixels")?;

        let mut backup = BackupManager::new(&root, &work);
        backup.move_to_backup(&photo)?;
        assert!(backup.has_history());

        let restored = backup.restore_by_name("a.jpg")?;
        assert_eq!(restored, photo);
        assert!(photo.exists());
        // The restored file is no longer an undo target
        assert!(matches!(backup.undo_last(), Err(SelectorError::NothingToUndo)));
        assert!(matches!(
            backup.restore_by_name("a.jpg"),
            Err(SelectorError::NotInBackup(_))
        ));
        Ok(())
    }

    #[test]
    fn test_undo_refuses_to_overwrite() -> Result<()> {
        let (_dir, work, root) = setup();
        let photo = work.join("a.jpg");
        fs::write(&photo, b"old")?;

        let mut backup = BackupManager::new(&root, &work);
        backup.move_to_backup(&photo)?;
        fs::write(&photo, b"new")?;

        assert!(matches!(backup.undo_last(), Err(SelectorError::DestinationExists(_))));
        // The move is still remembered
        fs::remove_file(&photo)?;
        backup.undo_last()?;
        assert_eq!(fs::read(&photo)?, b"old");
        Ok(())
    }

    #[test]
    fn test_dry_run_restore_leaves_files_alone() -> Result<()> {
        let (_dir, work, root) = setup();
        let photo = work.join("a.jpg");
        fs::write(&photo, b"pixels")?;
        BackupManager::new(&root, &work).move_to_backup(&photo)?;

        let mut backup = BackupManager::new(&root, &work).with_dry_run(true);
        let target = backup.restore_by_name("a.jpg")?;
        assert_eq!(target, photo);
        assert!(!photo.exists());
        assert_eq!(backup.list_backed_up()?, vec!["a.jpg".to_string()]);
        Ok(())
    }
}
