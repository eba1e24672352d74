//! Directory walking and dispatch by file kind.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::database::{GameDatabase, ParseWarning};
use crate::error::{MinerError, Result};
use crate::files::{AffFile, FileKind, PowFile, SklFile, StlFile};

/// Loads a data dump directory into a [`GameDatabase`].
///
/// Individual files that fail to parse are recorded as warnings on the
/// database rather than failing the whole load; dumps routinely contain a
/// handful of files in older layouts.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    follow_links: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links while walking. Off by default.
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.follow_links = yes;
        self
    }

    /// Parse every recognised file under `root`, recursively.
    ///
    /// Fails only when `root` itself cannot be read.
    pub fn parse_dir(&self, root: impl AsRef<Path>) -> Result<GameDatabase> {
        let root = root.as_ref();
        if let Err(source) = std::fs::read_dir(root) {
            return Err(MinerError::OpenFile {
                path: root.to_path_buf(),
                source,
            });
        }

        let mut db = GameDatabase::new();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    db.push_warning(ParseWarning {
                        path,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(kind) = FileKind::from_path(entry.path()) else {
                continue;
            };

            if let Err(e) = self.parse_file(&mut db, kind, entry.path()) {
                tracing::warn!(path = %entry.path().display(), error = %e, "Skipping data file");
                db.push_warning(ParseWarning {
                    path: PathBuf::from(entry.path()),
                    message: e.to_string(),
                });
            }
        }

        let counts = db.counts();
        tracing::info!(
            root = %root.display(),
            string_lists = counts.string_lists,
            affixes = counts.affixes,
            skill_kits = counts.skill_kits,
            powers = counts.powers,
            warnings = counts.warnings,
            "Loaded game data",
        );
        Ok(db)
    }

    /// Parse one file of a known kind into `db`.
    pub fn parse_file(&self, db: &mut GameDatabase, kind: FileKind, path: &Path) -> Result<()> {
        match kind {
            FileKind::StringList => db.insert_string_list(StlFile::from_path(path)?),
            FileKind::Affix => db.insert_affix(AffFile::from_path(path)?),
            FileKind::SkillKit => db.insert_skill_kit(SklFile::from_path(path)?),
            FileKind::Power => db.insert_power(PowFile::from_path(path)?),
        }
        Ok(())
    }
}
