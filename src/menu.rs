//! # Menu Module
//!
//! The fixed informational sections and their directories of pre-written
//! answers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::MenuError;

/// One of the fixed menu sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MenuSection {
    UtilityServiceQuality,
    ApartmentBuildingManagement,
    ContractsAndDocuments,
    ResourceSupply,
    WasteManagement,
    PrivateHouseholds,
}

impl MenuSection {
    /// All sections in menu order
    pub const ALL: [MenuSection; 6] = [
        MenuSection::UtilityServiceQuality,
        MenuSection::ApartmentBuildingManagement,
        MenuSection::ContractsAndDocuments,
        MenuSection::ResourceSupply,
        MenuSection::WasteManagement,
        MenuSection::PrivateHouseholds,
    ];

    /// Button label, matched exactly against user input
    pub fn label(self) -> &'static str {
        match self {
            MenuSection::UtilityServiceQuality => "Качество коммунальных услуг",
            MenuSection::ApartmentBuildingManagement => "Управление многоквартирными домами",
            MenuSection::ContractsAndDocuments => "Договоры и документы",
            MenuSection::ResourceSupply => "Ресурсоснабжение",
            MenuSection::WasteManagement => "Обращения с ТКО",
            MenuSection::PrivateHouseholds => "Частные домовладения",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.label() == label)
    }

    /// Directory name under the sections root: the label with `_` for spaces
    pub fn dir_name(self) -> String {
        self.label().replace(' ', "_")
    }

    /// The section that opens the document filler instead of showing answers
    pub fn opens_documents(self) -> bool {
        self == MenuSection::ContractsAndDocuments
    }
}

/// Pre-written answers stored on disk, one file per answer
#[derive(Debug, Clone)]
pub struct MenuLibrary {
    root: PathBuf,
}

impl MenuLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn section_dir(&self, section: MenuSection) -> PathBuf {
        self.root.join(section.dir_name())
    }

    /// Answer files of a section, sorted; a missing directory has none
    pub fn answer_files(&self, section: MenuSection) -> Result<Vec<PathBuf>, MenuError> {
        let dir = self.section_dir(section);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&dir, source)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&dir, source))?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Full text of one uniformly chosen answer, or `None` if the section is empty
    pub fn random_answer(&self, section: MenuSection) -> Result<Option<String>, MenuError> {
        let files = self.answer_files(section)?;
        let Some(chosen) = files.choose(&mut rand::thread_rng()) else {
            return Ok(None);
        };

        debug!(section = section.label(), file = %chosen.display(), "Serving section answer");
        let content = std::fs::read_to_string(chosen).map_err(|source| io_error(chosen, source))?;
        Ok(Some(content))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> MenuError {
    MenuError::Io {
        path: path.display().to_string(),
        source,
    }
}
