//! Review state for one working directory.
//!
//! A [`Session`] holds the images that still need a decision, the grid the
//! user sees, the focused cell, and the group being assembled. Completing a
//! group writes one record per member to the [`DuplicateStore`] and moves
//! every image labeled delete into the backup directory. Images that
//! already have a record from an earlier session are not reviewed again.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};

use crate::backup::{BackupManager, BackupMove};
use crate::config::{MAX_GRID_SIZE, MIN_GRID_SIZE};
use crate::error::{Result, SelectorError};
use crate::file_utils::ImageEntry;
use crate::labels::{GroupLabels, Label};
use crate::store::{DuplicateStore, NewRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// The single action that undo can reverse.
#[derive(Debug, Clone)]
enum UndoEntry {
    Relabel { path: PathBuf, previous: Label },
    /// A completion moved files to backup; the last one can be put back.
    Completion,
}

/// What [`Session::undo`] reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Relabeled { path: PathBuf, label: Label },
    Restored(BackupMove),
}

/// Summary of a saved group.
#[derive(Debug, Clone)]
pub struct CompletedGroup {
    pub group_id: i64,
    pub kept: Vec<PathBuf>,
    pub deleted: Vec<BackupMove>,
    /// Members labeled delete that could not be moved, with the reason.
    /// They keep their record and stay where they are.
    pub failed: Vec<(PathBuf, String)>,
    pub image_ids: Vec<i64>,
}

pub struct Session {
    directory: PathBuf,
    pending: Vec<ImageEntry>,
    loaded: usize,
    already_recorded: usize,
    dry_run_groups: i64,
    grid_size: usize,
    focus: Option<usize>,
    group: GroupLabels,
    undo: Option<UndoEntry>,
    store: DuplicateStore,
    backup: BackupManager,
    dry_run: bool,
}

impl Session {
    pub fn new(
        directory: &Path,
        images: Vec<ImageEntry>,
        store: DuplicateStore,
        backup: BackupManager,
        grid_size: usize,
    ) -> Result<Self> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid_size) {
            return Err(SelectorError::InvalidGridSize(grid_size));
        }

        let directory_name = directory.display().to_string();
        let total = images.len();
        let mut pending = Vec::with_capacity(total);
        for image in images {
            match store.latest_for_file(&directory_name, &image.filename)? {
                Some(record) => log::debug!(
                    "Skipping {:?}, already saved in group {}",
                    image.path,
                    record.group_id
                ),
                None => pending.push(image),
            }
        }
        let already_recorded = total - pending.len();
        if already_recorded > 0 {
            log::info!("{} image(s) in {:?} already have a decision", already_recorded, directory);
        }

        let focus = if pending.is_empty() { None } else { Some(0) };
        Ok(Self {
            directory: directory.to_path_buf(),
            loaded: pending.len(),
            pending,
            already_recorded,
            dry_run_groups: 0,
            grid_size,
            focus,
            group: GroupLabels::new(),
            undo: None,
            store,
            backup,
            dry_run: false,
        })
    }

    /// Dry-run sessions neither write records nor move files.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &DuplicateStore {
        &self.store
    }

    pub fn backup(&self) -> &BackupManager {
        &self.backup
    }

    pub fn pending(&self) -> &[ImageEntry] {
        &self.pending
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Images currently on screen, row-major.
    pub fn visible(&self) -> &[ImageEntry] {
        let shown = self.pending.len().min(self.grid_size * self.grid_size);
        &self.pending[..shown]
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn focused_image(&self) -> Option<&ImageEntry> {
        self.focus.and_then(|idx| self.visible().get(idx))
    }

    pub fn group(&self) -> &GroupLabels {
        &self.group
    }

    pub fn is_member(&self, image: &ImageEntry) -> bool {
        self.group.contains(&image.path)
    }

    pub fn label_of(&self, image: &ImageEntry) -> Option<Label> {
        self.group.label_of(&image.path)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn completed(&self) -> usize {
        self.loaded - self.pending.len()
    }

    /// Images found on disk that an earlier session already saved.
    pub fn already_recorded(&self) -> usize {
        self.already_recorded
    }

    /// Share of loaded images already saved in a group, in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.loaded == 0 {
            return 0.0;
        }
        self.completed() as f64 * 100.0 / self.loaded as f64
    }

    fn reset_focus(&mut self) {
        self.focus = if self.visible().is_empty() { None } else { Some(0) };
    }

    fn row_len(&self, row: usize) -> usize {
        let visible = self.visible().len();
        visible.saturating_sub(row * self.grid_size).min(self.grid_size)
    }

    fn col_len(&self, col: usize) -> usize {
        let visible = self.visible().len();
        (0..self.grid_size)
            .filter(|row| row * self.grid_size + col < visible)
            .count()
    }

    /// Moves focus one cell, wrapping within the occupied part of the row
    /// or column.
    pub fn move_focus(&mut self, direction: Direction) {
        let Some(idx) = self.focus else {
            self.reset_focus();
            return;
        };
        let n = self.grid_size;
        let (row, col) = (idx / n, idx % n);
        let next = match direction {
            Direction::Left => {
                let len = self.row_len(row);
                row * n + (col + len - 1) % len
            }
            Direction::Right => row * n + (col + 1) % self.row_len(row),
            Direction::Up => {
                let len = self.col_len(col);
                ((row + len - 1) % len) * n + col
            }
            Direction::Down => ((row + 1) % self.col_len(col)) * n + col,
        };
        self.focus = Some(next);
    }

    /// Points focus at a visible cell without changing the group.
    pub fn set_focus(&mut self, idx: usize) -> Result<()> {
        if idx >= self.visible().len() {
            return Err(SelectorError::NoFocusedImage);
        }
        self.focus = Some(idx);
        Ok(())
    }

    fn drop_relabel_undo_for(&mut self, path: &Path) {
        if matches!(&self.undo, Some(UndoEntry::Relabel { path: p, .. }) if p == path) {
            self.undo = None;
        }
    }

    /// Clicking a cell: a non-member joins the group and takes focus, an
    /// unfocused member takes focus, the focused member leaves the group.
    pub fn toggle_cell(&mut self, idx: usize) -> Result<()> {
        let path = self
            .visible()
            .get(idx)
            .map(|image| image.path.clone())
            .ok_or(SelectorError::NoFocusedImage)?;

        if !self.group.contains(&path) {
            self.group.join(&path);
            self.focus = Some(idx);
            log::debug!("Added {:?} to group", path);
        } else if self.focus != Some(idx) {
            self.focus = Some(idx);
        } else {
            self.group.leave(&path);
            self.drop_relabel_undo_for(&path);
            log::debug!("Removed {:?} from group", path);
        }
        Ok(())
    }

    pub fn toggle_focused(&mut self) -> Result<()> {
        let idx = self.focus.ok_or(SelectorError::NoFocusedImage)?;
        self.toggle_cell(idx)
    }

    /// Flips membership of every visible image in the first `rows` rows
    /// (all rows when `rows` is 0). Toggled images lose their labels.
    pub fn select_rows(&mut self, rows: usize) {
        let rows = if rows == 0 { self.grid_size } else { rows.min(self.grid_size) };
        let count = self.visible().len().min(rows * self.grid_size);
        let paths: Vec<PathBuf> = self.visible()[..count].iter().map(|i| i.path.clone()).collect();

        for path in paths {
            if self.group.leave(&path).is_some() {
                self.drop_relabel_undo_for(&path);
            } else {
                self.group.join(&path);
            }
        }
        if self.focus.is_none() {
            self.reset_focus();
        }
        log::debug!("Toggled first {} row(s); group now has {} member(s)", rows, self.group.len());
    }

    /// Labels the focused image, which must be a group member. Re-applying
    /// the current label changes nothing.
    pub fn label_focused(&mut self, label: Label) -> Result<()> {
        let path = self
            .focused_image()
            .map(|image| image.path.clone())
            .ok_or(SelectorError::NoFocusedImage)?;
        if let Some(previous) = self.group.apply(&path, label)? {
            log::debug!("Labeled {:?} {} (was {})", path, label, previous);
            self.undo = Some(UndoEntry::Relabel { path, previous });
        }
        Ok(())
    }

    pub fn set_grid_size(&mut self, size: usize) -> Result<()> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&size) {
            return Err(SelectorError::InvalidGridSize(size));
        }
        self.grid_size = size;
        self.group.clear();
        if matches!(self.undo, Some(UndoEntry::Relabel { .. })) {
            self.undo = None;
        }
        self.reset_focus();
        log::info!("Grid size set to {}x{}", size, size);
        Ok(())
    }

    fn next_group_id(&mut self) -> Result<i64> {
        let stored = self.store.next_group_id()?;
        if !self.dry_run {
            return Ok(stored);
        }
        // Nothing reaches the store in a dry run
        let id = stored + self.dry_run_groups;
        self.dry_run_groups += 1;
        Ok(id)
    }

    /// Saves the open group.
    ///
    /// With no members the focused image is saved alone as keep. Otherwise
    /// every member needs a label; records are written first, then deleted
    /// members are moved into the backup directory. The two steps are not
    /// atomic: a member whose move fails is reported in
    /// [`CompletedGroup::failed`] and the remaining members still move.
    pub fn complete_group(&mut self) -> Result<CompletedGroup> {
        let members: Vec<(ImageEntry, Label)> = if self.group.is_empty() {
            let image = self.focused_image().cloned().ok_or(SelectorError::NoFocusedImage)?;
            log::info!("Empty group, saving focused image {:?} on its own", image.path);
            vec![(image, Label::Keep)]
        } else {
            self.group.ensure_complete()?;
            self.pending
                .iter()
                .filter_map(|image| self.group.label_of(&image.path).map(|label| (image.clone(), label)))
                .collect()
        };

        let group_id = self.next_group_id()?;
        let now: DateTime<FixedOffset> = Local::now().into();
        let directory_name = self.directory.display().to_string();
        let records: Vec<NewRecord> = members
            .iter()
            .map(|(image, label)| NewRecord {
                filename: image.filename.clone(),
                directory_name: directory_name.clone(),
                keep: *label == Label::Keep,
                modified_time: now,
                picture_taken_time: image.taken,
            })
            .collect();

        let image_ids = if self.dry_run {
            log::info!("[DRY RUN] Would store group {} with {} image(s)", group_id, records.len());
            Vec::new()
        } else {
            self.store.insert_group(group_id, &records)?
        };

        // Completed images leave the review list before files move
        let member_paths: Vec<PathBuf> = members.iter().map(|(image, _)| image.path.clone()).collect();
        self.pending.retain(|image| !member_paths.contains(&image.path));
        self.group.clear();
        self.undo = None;

        let mut kept = Vec::new();
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (image, label) in members {
            if label == Label::Keep {
                kept.push(image.path);
                continue;
            }
            if self.dry_run {
                log::info!("[DRY RUN] Would move {:?} to backup", image.path);
                continue;
            }
            match self.backup.move_to_backup(&image.path) {
                Ok(moved) => {
                    deleted.push(moved);
                    self.undo = Some(UndoEntry::Completion);
                }
                Err(e) => {
                    log::error!("Failed to move {:?} to backup: {}", image.path, e);
                    failed.push((image.path, e.to_string()));
                }
            }
        }
        self.reset_focus();

        log::info!(
            "Saved group {}: {} kept, {} moved to backup, {} failed",
            group_id,
            kept.len(),
            deleted.len(),
            failed.len()
        );
        Ok(CompletedGroup { group_id, kept, deleted, failed, image_ids })
    }

    /// Reverts the most recent relabel, or the most recent move to backup.
    /// A restored file goes back to its old location only: its record stays
    /// in the store and the image is not reviewed again.
    pub fn undo(&mut self) -> Result<UndoOutcome> {
        let entry = self.undo.take().ok_or(SelectorError::NothingToUndo)?;
        match entry {
            UndoEntry::Relabel { path, previous } => {
                self.group.restore(&path, previous)?;
                log::info!("Undo: {:?} back to {}", path, previous);
                Ok(UndoOutcome::Relabeled { path, label: previous })
            }
            UndoEntry::Completion => {
                let restored = match self.backup.undo_last() {
                    Ok(restored) => restored,
                    Err(e) => {
                        self.undo = Some(UndoEntry::Completion);
                        return Err(e);
                    }
                };
                log::info!("Undo: restored {:?}", restored.original);
                Ok(UndoOutcome::Restored(restored))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        work: PathBuf,
        session: Session,
    }

    fn fixture(names: &[&str], grid: usize) -> Fixture {
        fixture_with(names, grid, false)
    }

    fn fixture_with(names: &[&str], grid: usize, dry_run: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let work = dir.path().join("photos");
        fs::create_dir_all(&work).unwrap();
        let images = names
            .iter()
            .map(|name| {
                let path = work.join(name);
                fs::write(&path, name.as_bytes()).unwrap();
                ImageEntry::from_path(&path).unwrap()
            })
            .collect();
        let backup = BackupManager::new(&dir.path().join("backup"), &work);
        let store = DuplicateStore::open_in_memory().unwrap();
        let session = Session::new(&work, images, store, backup, grid)
            .unwrap()
            .with_dry_run(dry_run);
        Fixture { _dir: dir, work, session }
    }

    fn names(images: &[ImageEntry]) -> Vec<&str> {
        images.iter().map(|i| i.filename.as_str()).collect()
    }

    #[test]
    fn test_grid_shows_first_images() {
        let f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"], 2);
        assert_eq!(names(f.session.visible()), vec!["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        assert_eq!(f.session.focus(), Some(0));
    }

    #[test]
    fn test_focus_wraps_within_occupied_cells() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"], 2);
        let s = &mut f.session;
        s.move_focus(Direction::Right);
        assert_eq!(s.focus(), Some(1));
        s.move_focus(Direction::Right);
        assert_eq!(s.focus(), Some(0));
        s.move_focus(Direction::Left);
        assert_eq!(s.focus(), Some(1));
        // Column 1 has one occupied row
        s.move_focus(Direction::Down);
        assert_eq!(s.focus(), Some(1));
        s.move_focus(Direction::Left);
        s.move_focus(Direction::Down);
        assert_eq!(s.focus(), Some(2));
        // Row 1 has one occupied cell
        s.move_focus(Direction::Right);
        assert_eq!(s.focus(), Some(2));
        s.move_focus(Direction::Up);
        assert_eq!(s.focus(), Some(0));
    }

    #[test]
    fn test_toggle_cell_cycle() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        let b = s.visible()[1].clone();

        s.toggle_cell(1).unwrap();
        assert!(s.is_member(&b));
        assert_eq!(s.focus(), Some(1));

        s.set_focus(0).unwrap();
        s.toggle_cell(1).unwrap();
        assert!(s.is_member(&b));
        assert_eq!(s.focus(), Some(1));

        s.toggle_cell(1).unwrap();
        assert!(!s.is_member(&b));
        assert_eq!(s.focus(), Some(1));
    }

    #[test]
    fn test_label_requires_membership() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        assert!(matches!(
            f.session.label_focused(Label::Keep),
            Err(SelectorError::NotInGroup(_))
        ));
    }

    #[test]
    fn test_incomplete_group_cannot_be_saved() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        s.select_rows(0);
        s.label_focused(Label::Keep).unwrap();
        assert!(matches!(
            s.complete_group(),
            Err(SelectorError::IncompleteGroup { undecided: 1 })
        ));
        assert_eq!(s.store().count().unwrap(), 0);
        assert_eq!(s.pending().len(), 2);
    }

    #[test]
    fn test_complete_group_writes_records_and_moves_deleted() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"], 2);
        let s = &mut f.session;
        s.select_rows(1);
        s.label_focused(Label::Keep).unwrap();
        s.move_focus(Direction::Right);
        s.label_focused(Label::Delete).unwrap();

        let done = s.complete_group().unwrap();
        assert_eq!(done.group_id, 1);
        assert_eq!(done.kept, vec![f.work.join("a.jpg")]);
        assert_eq!(done.deleted.len(), 1);
        assert_eq!(done.image_ids.len(), 2);

        assert!(f.work.join("a.jpg").exists());
        assert!(!f.work.join("b.jpg").exists());
        assert!(s.backup().backup_dir().join("b.jpg").exists());

        let records = s.store().records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "a.jpg");
        assert!(records[0].keep);
        assert_eq!(records[1].filename, "b.jpg");
        assert!(!records[1].keep);
        assert_eq!(records[0].directory_name, f.work.display().to_string());

        assert_eq!(names(s.pending()), vec!["c.jpg"]);
        assert_eq!(s.focus(), Some(0));
        assert!(s.group().is_empty());
    }

    #[test]
    fn test_empty_group_saves_focused_image_as_keep() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        s.set_focus(1).unwrap();

        let done = s.complete_group().unwrap();
        assert_eq!(done.kept, vec![f.work.join("b.jpg")]);
        let records = s.store().records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "b.jpg");
        assert!(records[0].keep);
        assert_eq!(names(s.pending()), vec!["a.jpg"]);
    }

    #[test]
    fn test_empty_group_without_images_fails() {
        let mut f = fixture(&[], 2);
        assert!(matches!(f.session.complete_group(), Err(SelectorError::NoFocusedImage)));
    }

    #[test]
    fn test_undo_restores_previous_label() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        let a = s.visible()[0].clone();
        s.toggle_cell(0).unwrap();
        s.label_focused(Label::Keep).unwrap();
        s.label_focused(Label::Delete).unwrap();

        let outcome = s.undo().unwrap();
        assert_eq!(outcome, UndoOutcome::Relabeled { path: a.path.clone(), label: Label::Keep });
        assert_eq!(s.label_of(&a), Some(Label::Keep));
        assert!(matches!(s.undo(), Err(SelectorError::NothingToUndo)));
    }

    #[test]
    fn test_relabel_to_same_label_keeps_undo_target() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        let a = s.visible()[0].clone();
        s.toggle_cell(0).unwrap();
        s.label_focused(Label::Keep).unwrap();
        s.label_focused(Label::Keep).unwrap();

        s.undo().unwrap();
        assert_eq!(s.label_of(&a), Some(Label::Undecided));
    }

    #[test]
    fn test_undo_after_completion_restores_file() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"], 2);
        let s = &mut f.session;
        s.toggle_cell(1).unwrap();
        s.label_focused(Label::Delete).unwrap();
        s.complete_group().unwrap();
        assert!(!f.work.join("b.jpg").exists());
        assert_eq!(s.completed(), 1);

        match s.undo().unwrap() {
            UndoOutcome::Restored(moved) => assert_eq!(moved.original, f.work.join("b.jpg")),
            other => panic!("unexpected undo outcome {:?}", other),
        }
        assert!(f.work.join("b.jpg").exists());
        // Only the file moves back; the decision stays recorded
        assert_eq!(names(s.pending()), vec!["a.jpg", "c.jpg"]);
        assert_eq!(s.store().count().unwrap(), 1);
        assert_eq!(s.completed(), 1);
    }

    #[test]
    fn test_undo_leaves_review_order_alone() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"], 2);
        let s = &mut f.session;
        s.select_rows(1);
        s.label_focused(Label::Delete).unwrap();
        s.move_focus(Direction::Right);
        s.label_focused(Label::Delete).unwrap();
        s.complete_group().unwrap();
        assert_eq!(names(s.pending()), vec!["c.jpg", "d.jpg"]);

        s.undo().unwrap();
        assert!(f.work.join("b.jpg").exists());
        assert!(!f.work.join("a.jpg").exists());
        assert_eq!(names(s.pending()), vec!["c.jpg", "d.jpg"]);
    }

    #[test]
    fn test_undone_image_is_not_saved_twice() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        s.toggle_cell(0).unwrap();
        s.label_focused(Label::Delete).unwrap();
        s.complete_group().unwrap();
        s.undo().unwrap();

        // The empty-group shortcut now picks b.jpg, never a.jpg again
        s.complete_group().unwrap();
        let records: Vec<(String, bool)> = s
            .store()
            .records()
            .unwrap()
            .into_iter()
            .map(|r| (r.filename, r.keep))
            .collect();
        assert_eq!(records, vec![("a.jpg".to_string(), false), ("b.jpg".to_string(), true)]);
        assert!(f.work.join("a.jpg").exists());
        assert!(s.pending().is_empty());
    }

    #[test]
    fn test_failed_move_does_not_stop_other_moves() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg"], 2);
        let s = &mut f.session;
        s.select_rows(0);
        for idx in 0..3 {
            s.set_focus(idx).unwrap();
            s.label_focused(Label::Delete).unwrap();
        }
        fs::remove_file(f.work.join("b.jpg")).unwrap();

        let done = s.complete_group().unwrap();
        assert_eq!(done.deleted.len(), 2);
        assert_eq!(done.failed.len(), 1);
        assert_eq!(done.failed[0].0, f.work.join("b.jpg"));
        assert!(s.backup().backup_dir().join("a.jpg").exists());
        assert!(s.backup().backup_dir().join("c.jpg").exists());
        assert_eq!(s.store().count().unwrap(), 3);
        assert!(s.pending().is_empty());

        // Undo targets the last move that actually happened
        match s.undo().unwrap() {
            UndoOutcome::Restored(moved) => assert_eq!(moved.original, f.work.join("c.jpg")),
            other => panic!("unexpected undo outcome {:?}", other),
        }
    }

    #[test]
    fn test_already_recorded_images_are_skipped() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("photos");
        fs::create_dir_all(&work).unwrap();
        let images: Vec<ImageEntry> = ["a.jpg", "b.jpg"]
            .iter()
            .map(|name| {
                let path = work.join(name);
                fs::write(&path, name.as_bytes()).unwrap();
                ImageEntry::from_path(&path).unwrap()
            })
            .collect();

        let mut store = DuplicateStore::open_in_memory().unwrap();
        store
            .insert_group(
                1,
                &[NewRecord {
                    filename: "a.jpg".to_string(),
                    directory_name: work.display().to_string(),
                    keep: true,
                    modified_time: Local::now().into(),
                    picture_taken_time: None,
                }],
            )
            .unwrap();

        let backup = BackupManager::new(&dir.path().join("backup"), &work);
        let s = Session::new(&work, images, store, backup, 2).unwrap();
        assert_eq!(names(s.pending()), vec!["b.jpg"]);
        assert_eq!(s.loaded(), 1);
        assert_eq!(s.already_recorded(), 1);
    }

    #[test]
    fn test_leaving_group_drops_label_undo() {
        let mut f = fixture(&["a.jpg", "b.jpg"], 2);
        let s = &mut f.session;
        s.toggle_cell(0).unwrap();
        s.label_focused(Label::Keep).unwrap();
        s.toggle_cell(0).unwrap();
        assert!(!s.can_undo());
    }

    #[test]
    fn test_select_rows_toggles_and_clears_labels() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"], 2);
        let s = &mut f.session;
        s.select_rows(1);
        assert_eq!(s.group().len(), 2);
        s.label_focused(Label::Keep).unwrap();

        s.select_rows(0);
        // Row 0 left the group, row 1 joined
        assert_eq!(s.group().len(), 2);
        assert!(!s.is_member(&s.visible()[0].clone()));
        assert!(s.is_member(&s.visible()[3].clone()));

        s.select_rows(1);
        let a = s.visible()[0].clone();
        assert_eq!(s.label_of(&a), Some(Label::Undecided));
    }

    #[test]
    fn test_resize_resets_group_and_focus() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"], 2);
        let s = &mut f.session;
        s.select_rows(0);
        s.set_focus(3).unwrap();
        s.set_grid_size(3).unwrap();
        assert!(s.group().is_empty());
        assert_eq!(s.focus(), Some(0));
        assert_eq!(s.visible().len(), 5);
        assert!(matches!(s.set_grid_size(8), Err(SelectorError::InvalidGridSize(8))));
    }

    #[test]
    fn test_progress_percent() {
        let mut f = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"], 2);
        let s = &mut f.session;
        assert_eq!(s.progress_percent(), 0.0);
        s.complete_group().unwrap();
        assert_eq!(s.progress_percent(), 25.0);
    }

    #[test]
    fn test_dry_run_changes_nothing_on_disk() {
        let mut f = fixture_with(&["a.jpg", "b.jpg"], 2, true);
        let s = &mut f.session;
        s.select_rows(0);
        s.label_focused(Label::Delete).unwrap();
        s.move_focus(Direction::Right);
        s.label_focused(Label::Keep).unwrap();

        let done = s.complete_group().unwrap();
        assert!(done.image_ids.is_empty());
        assert!(done.deleted.is_empty());
        assert!(f.work.join("a.jpg").exists());
        assert_eq!(s.store().count().unwrap(), 0);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn test_dry_run_group_ids_keep_counting() {
        let mut f = fixture_with(&["a.jpg", "b.jpg", "c.jpg"], 2, true);
        let s = &mut f.session;
        assert_eq!(s.complete_group().unwrap().group_id, 1);
        assert_eq!(s.complete_group().unwrap().group_id, 2);
        assert_eq!(s.complete_group().unwrap().group_id, 3);
        assert_eq!(s.store().count().unwrap(), 0);
    }
}
